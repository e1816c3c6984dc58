#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum PanelState {
    #[default]
    Closed,
    Open,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PanelVisibility {
    state: PanelState,
}

impl PanelVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.state == PanelState::Open
    }

    /// Flips the state. Returns `true` when the panel just opened.
    pub fn toggle(&mut self) -> bool {
        self.state = match self.state {
            PanelState::Closed => PanelState::Open,
            PanelState::Open => PanelState::Closed,
        };
        self.is_open()
    }

    pub fn close(&mut self) -> bool {
        let was_open = self.is_open();
        self.state = PanelState::Closed;
        was_open
    }
}
