use crate::autoscroll::AutoscrollCoordinator;
use crate::conversation::{
    ConversationController, ConversationState, ReplyGateway, SendOutcome, Settled,
};
use crate::message_store::ChatMessage;
use crate::panel::PanelVisibility;
use std::sync::Arc;
use std::time::Duration;

pub struct AssistantWidget<G> {
    conversation: ConversationController<G>,
    panel: PanelVisibility,
    autoscroll: AutoscrollCoordinator,
}

impl<G: ReplyGateway> AssistantWidget<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self::from_controller(ConversationController::new(gateway))
    }

    pub fn from_controller(conversation: ConversationController<G>) -> Self {
        Self {
            conversation,
            panel: PanelVisibility::new(),
            autoscroll: AutoscrollCoordinator::new(),
        }
    }

    pub fn state(&self) -> ConversationState {
        ConversationState {
            is_open: self.panel.is_open(),
            is_awaiting_reply: self.conversation.is_awaiting_reply(),
            draft_input: self.conversation.draft_input().to_string(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.conversation.messages()
    }

    pub fn is_open(&self) -> bool {
        self.panel.is_open()
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.conversation.is_awaiting_reply()
    }

    pub fn draft_input_mut(&mut self) -> &mut String {
        self.conversation.draft_input_mut()
    }

    pub fn can_submit(&self) -> bool {
        self.conversation.can_submit()
    }

    pub fn input_enabled(&self) -> bool {
        !self.conversation.is_awaiting_reply()
    }

    pub fn toggle(&mut self) {
        if self.panel.toggle() {
            self.autoscroll.request();
        }
    }

    pub fn close(&mut self) {
        self.panel.close();
    }

    pub fn send(&mut self, utterance: &str) -> SendOutcome {
        let outcome = self.conversation.send(utterance);
        self.after_send(outcome)
    }

    pub fn submit_draft(&mut self) -> SendOutcome {
        let outcome = self.conversation.submit_draft();
        self.after_send(outcome)
    }

    // Call once per frame.
    pub fn pump(&mut self) -> Option<Settled> {
        let settled = self.conversation.drain_worker_events();
        self.after_settle(settled)
    }

    pub fn wait_for_reply(&mut self, timeout: Duration) -> Option<Settled> {
        let settled = self.conversation.wait_for_reply(timeout);
        self.after_settle(settled)
    }

    /// Consumed by the renderer after the message list is laid out.
    pub fn take_scroll_request(&mut self) -> bool {
        self.autoscroll.take_request()
    }

    pub fn scroll_pending(&self) -> bool {
        self.autoscroll.is_pending()
    }

    fn after_send(&mut self, outcome: SendOutcome) -> SendOutcome {
        if outcome == SendOutcome::Dispatched {
            self.autoscroll.request();
        }
        outcome
    }

    fn after_settle(&mut self, settled: Option<Settled>) -> Option<Settled> {
        if settled == Some(Settled::Replied) {
            self.autoscroll.request();
        }
        settled
    }
}
