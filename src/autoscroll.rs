/// Set after the message log changes or the panel opens; the renderer takes
/// it only once the frame's message list has been laid out.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoscrollCoordinator {
    pending: bool,
}

impl AutoscrollCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn take_request(&mut self) -> bool {
        if !self.pending {
            return false;
        }

        self.pending = false;
        true
    }
}
