use crate::chat_api::GatewayError;
use crate::message_store::{ChatMessage, HistoryTurn, MessageStore};
use std::future::Future;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const DEFAULT_GREETING: &str =
    "Welcome to Aura. I am here to help you curate your sanctuary. How may I assist you today?";

pub trait ReplyGateway: Send + Sync + 'static {
    fn get_reply(
        &self,
        history: &[HistoryTurn],
        utterance: &str,
    ) -> impl Future<Output = Result<String, GatewayError>> + Send;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendRejection {
    EmptyInput,
    AwaitingReply,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Dispatched,
    Rejected(SendRejection),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settled {
    Replied,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationState {
    pub is_open: bool,
    pub is_awaiting_reply: bool,
    pub draft_input: String,
}

enum WorkerEvent {
    Replied(String),
    Failed(GatewayError),
}

pub struct ConversationController<G> {
    gateway: Arc<G>,
    store: MessageStore,
    draft_input: String,
    awaiting_reply: bool,
    worker_rx: Option<Receiver<WorkerEvent>>,
}

impl<G: ReplyGateway> ConversationController<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self::with_greeting(gateway, DEFAULT_GREETING)
    }

    pub fn with_greeting(gateway: Arc<G>, greeting: &str) -> Self {
        Self {
            gateway,
            store: MessageStore::seeded(ChatMessage::assistant(greeting)),
            draft_input: String::new(),
            awaiting_reply: false,
            worker_rx: None,
        }
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.store.all()
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    pub fn draft_input(&self) -> &str {
        &self.draft_input
    }

    pub fn draft_input_mut(&mut self) -> &mut String {
        &mut self.draft_input
    }

    pub fn set_draft_input(&mut self, text: impl Into<String>) {
        self.draft_input = text.into();
    }

    pub fn can_submit(&self) -> bool {
        !self.awaiting_reply && !self.draft_input.trim().is_empty()
    }

    pub fn submit_draft(&mut self) -> SendOutcome {
        let draft = self.draft_input.clone();
        self.send(&draft)
    }

    pub fn send(&mut self, utterance: &str) -> SendOutcome {
        if utterance.trim().is_empty() {
            tracing::trace!("send ignored: blank utterance");
            return SendOutcome::Rejected(SendRejection::EmptyInput);
        }
        if self.awaiting_reply {
            tracing::trace!("send ignored: exchange already in flight");
            return SendOutcome::Rejected(SendRejection::AwaitingReply);
        }

        // History is everything before this turn; the utterance travels separately.
        let history = self.store.history();
        let utterance = utterance.to_string();

        self.store.append(ChatMessage::user(utterance.clone()));
        self.draft_input.clear();
        self.awaiting_reply = true;

        tracing::debug!(history_len = history.len(), "dispatching exchange");

        let (tx, rx) = mpsc::channel::<WorkerEvent>();
        self.worker_rx = Some(rx);
        let gateway = Arc::clone(&self.gateway);

        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build();

            let result = match runtime {
                Ok(rt) => rt.block_on(gateway.get_reply(&history, &utterance)),
                Err(err) => Err(GatewayError::Worker(format!(
                    "unable to start async runtime: {err}"
                ))),
            };

            let event = match result {
                Ok(reply) => WorkerEvent::Replied(reply),
                Err(err) => WorkerEvent::Failed(err),
            };
            let _ = tx.send(event);
        });

        SendOutcome::Dispatched
    }

    pub fn drain_worker_events(&mut self) -> Option<Settled> {
        let event = match self.worker_rx.as_ref()?.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => None,
        };

        Some(self.settle(event))
    }

    /// Blocks until the in-flight exchange resolves or `timeout` elapses.
    pub fn wait_for_reply(&mut self, timeout: Duration) -> Option<Settled> {
        let event = match self.worker_rx.as_ref()?.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => None,
        };

        Some(self.settle(event))
    }

    fn settle(&mut self, event: Option<WorkerEvent>) -> Settled {
        self.worker_rx = None;
        self.awaiting_reply = false;

        match event {
            Some(WorkerEvent::Replied(reply)) if !reply.trim().is_empty() => {
                self.store.append(ChatMessage::assistant(reply));
                tracing::debug!(messages = self.store.len(), "exchange settled with a reply");
                Settled::Replied
            }
            Some(WorkerEvent::Replied(_)) => {
                tracing::debug!("exchange settled with a blank reply; nothing appended");
                Settled::Failed
            }
            Some(WorkerEvent::Failed(err)) => {
                tracing::debug!(error = %err, "exchange failed; conversation left unchanged");
                Settled::Failed
            }
            None => {
                tracing::debug!("exchange worker vanished before reporting");
                Settled::Failed
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::message_store::Role;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const WAIT: Duration = Duration::from_secs(5);

    /// Gateway double with scripted outcomes and an optional release gate.
    #[derive(Default)]
    pub(crate) struct StubGateway {
        outcomes: Mutex<VecDeque<Result<String, GatewayError>>>,
        gate: Mutex<Option<mpsc::Receiver<()>>>,
        calls: Mutex<Vec<(Vec<HistoryTurn>, String)>>,
    }

    impl StubGateway {
        pub(crate) fn replying(replies: &[&str]) -> Arc<Self> {
            let stub = Self::default();
            stub.outcomes
                .lock()
                .unwrap()
                .extend(replies.iter().map(|reply| Ok(reply.to_string())));
            Arc::new(stub)
        }

        pub(crate) fn failing() -> Arc<Self> {
            let stub = Self::default();
            stub.outcomes
                .lock()
                .unwrap()
                .push_back(Err(GatewayError::Malformed("boom".to_string())));
            Arc::new(stub)
        }

        pub(crate) fn gated(replies: &[&str]) -> (Arc<Self>, mpsc::Sender<()>) {
            let (tx, rx) = mpsc::channel();
            let stub = Self::replying(replies);
            *stub.gate.lock().unwrap() = Some(rx);
            (stub, tx)
        }

        pub(crate) fn calls(&self) -> Vec<(Vec<HistoryTurn>, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ReplyGateway for StubGateway {
        fn get_reply(
            &self,
            history: &[HistoryTurn],
            utterance: &str,
        ) -> impl Future<Output = Result<String, GatewayError>> + Send {
            self.calls
                .lock()
                .unwrap()
                .push((history.to_vec(), utterance.to_string()));
            if let Some(gate) = self.gate.lock().unwrap().as_ref() {
                let _ = gate.recv();
            }
            let outcome = self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("default reply".to_string()));
            std::future::ready(outcome)
        }
    }

    fn texts<G: ReplyGateway>(controller: &ConversationController<G>) -> Vec<(Role, String)> {
        controller
            .messages()
            .iter()
            .map(|m| (m.role(), m.text().to_string()))
            .collect()
    }

    #[test]
    fn starts_with_single_greeting() {
        let controller = ConversationController::new(StubGateway::replying(&[]));

        assert_eq!(
            texts(&controller),
            vec![(Role::Assistant, DEFAULT_GREETING.to_string())]
        );
        assert!(!controller.is_awaiting_reply());
        assert_eq!(controller.draft_input(), "");
    }

    #[test]
    fn hello_scenario_appends_user_then_reply() {
        let (gateway, release) = StubGateway::gated(&["Hi there"]);
        let mut controller = ConversationController::new(gateway);

        assert_eq!(controller.send("Hello"), SendOutcome::Dispatched);
        assert_eq!(
            texts(&controller),
            vec![
                (Role::Assistant, DEFAULT_GREETING.to_string()),
                (Role::User, "Hello".to_string()),
            ]
        );
        assert!(controller.is_awaiting_reply());

        release.send(()).unwrap();
        assert_eq!(controller.wait_for_reply(WAIT), Some(Settled::Replied));
        assert_eq!(
            texts(&controller),
            vec![
                (Role::Assistant, DEFAULT_GREETING.to_string()),
                (Role::User, "Hello".to_string()),
                (Role::Assistant, "Hi there".to_string()),
            ]
        );
        assert!(!controller.is_awaiting_reply());
    }

    #[test]
    fn n_sends_alternate_user_and_assistant() {
        let gateway = StubGateway::replying(&["r1", "r2", "r3"]);
        let mut controller = ConversationController::new(gateway);

        for question in ["q1", "q2", "q3"] {
            assert_eq!(controller.send(question), SendOutcome::Dispatched);
            assert_eq!(controller.wait_for_reply(WAIT), Some(Settled::Replied));
        }

        let messages = texts(&controller);
        assert_eq!(messages.len(), 1 + 2 * 3);
        assert_eq!(
            &messages[1..],
            &[
                (Role::User, "q1".to_string()),
                (Role::Assistant, "r1".to_string()),
                (Role::User, "q2".to_string()),
                (Role::Assistant, "r2".to_string()),
                (Role::User, "q3".to_string()),
                (Role::Assistant, "r3".to_string()),
            ]
        );
    }

    #[test]
    fn blank_utterances_are_silent_no_ops() {
        let gateway = StubGateway::replying(&[]);
        let mut controller = ConversationController::new(Arc::clone(&gateway));
        controller.set_draft_input("   ");

        assert_eq!(
            controller.send(""),
            SendOutcome::Rejected(SendRejection::EmptyInput)
        );
        assert_eq!(
            controller.submit_draft(),
            SendOutcome::Rejected(SendRejection::EmptyInput)
        );

        assert_eq!(controller.messages().len(), 1);
        assert_eq!(controller.store().revision(), 1);
        assert_eq!(controller.draft_input(), "   ");
        assert!(!controller.is_awaiting_reply());
        assert!(controller.drain_worker_events().is_none());
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn second_send_while_in_flight_is_rejected() {
        let (gateway, release) = StubGateway::gated(&["reply a"]);
        let mut controller = ConversationController::new(Arc::clone(&gateway));

        assert_eq!(controller.send("a"), SendOutcome::Dispatched);
        assert_eq!(
            controller.send("b"),
            SendOutcome::Rejected(SendRejection::AwaitingReply)
        );
        assert!(!controller.can_submit());

        let users: Vec<_> = texts(&controller)
            .into_iter()
            .filter(|(role, _)| *role == Role::User)
            .collect();
        assert_eq!(users, vec![(Role::User, "a".to_string())]);

        release.send(()).unwrap();
        assert_eq!(controller.wait_for_reply(WAIT), Some(Settled::Replied));
        assert_eq!(gateway.calls().len(), 1);
    }

    #[test]
    fn failed_exchange_resets_flag_and_appends_nothing() {
        let mut controller = ConversationController::new(StubGateway::failing());

        controller.send("Help");
        assert_eq!(controller.wait_for_reply(WAIT), Some(Settled::Failed));

        assert_eq!(
            texts(&controller),
            vec![
                (Role::Assistant, DEFAULT_GREETING.to_string()),
                (Role::User, "Help".to_string()),
            ]
        );
        assert!(!controller.is_awaiting_reply());
        assert_eq!(controller.send("again"), SendOutcome::Dispatched);
    }

    #[test]
    fn history_excludes_the_new_utterance() {
        let gateway = StubGateway::replying(&["first reply", "second reply"]);
        let mut controller = ConversationController::new(Arc::clone(&gateway));

        controller.send("one");
        controller.wait_for_reply(WAIT);
        controller.send("two");
        controller.wait_for_reply(WAIT);

        let calls = gateway.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0.len(), 1);
        assert_eq!(calls[0].1, "one");

        let second_history: Vec<&str> = calls[1].0.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(second_history, vec![DEFAULT_GREETING, "one", "first reply"]);
        assert_eq!(calls[1].1, "two");
    }

    #[test]
    fn submit_draft_clears_input_and_keeps_raw_text() {
        let mut controller = ConversationController::new(StubGateway::replying(&["ok"]));
        controller.set_draft_input("  padded question ");

        assert!(controller.can_submit());
        assert_eq!(controller.submit_draft(), SendOutcome::Dispatched);
        assert_eq!(controller.draft_input(), "");
        assert_eq!(controller.messages()[1].text(), "  padded question ");
        controller.wait_for_reply(WAIT);
    }

    #[test]
    fn blank_reply_is_not_appended() {
        let mut controller = ConversationController::new(StubGateway::replying(&["   "]));

        controller.send("hi");

        assert_eq!(controller.wait_for_reply(WAIT), Some(Settled::Failed));
        assert_eq!(controller.messages().len(), 2);
        assert!(!controller.is_awaiting_reply());
    }

    #[test]
    fn drain_picks_up_finished_exchange() {
        let mut controller = ConversationController::new(StubGateway::replying(&["later"]));
        controller.send("ping");

        let mut settled = None;
        for _ in 0..500 {
            settled = controller.drain_worker_events();
            if settled.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(settled, Some(Settled::Replied));
        assert_eq!(controller.messages().len(), 3);
    }
}
