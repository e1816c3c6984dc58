use chrono::{DateTime, Utc};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_api_value(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    role: Role,
    text: String,
    timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text, Utc::now())
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text, Utc::now())
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: Role,
    pub text: String,
}

#[derive(Clone, Debug, Default)]
pub struct MessageStore {
    messages: Vec<ChatMessage>,
    revision: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(greeting: ChatMessage) -> Self {
        let mut store = Self::new();
        store.append(greeting);
        store
    }

    pub fn append(&mut self, mut message: ChatMessage) {
        debug_assert!(
            !message.text.trim().is_empty(),
            "chat messages must carry non-blank text"
        );

        // Wall clocks can step backwards; insertion order stays authoritative.
        if let Some(last) = self.messages.last() {
            if message.timestamp < last.timestamp {
                message.timestamp = last.timestamp;
            }
        }

        self.messages.push(message);
        self.revision += 1;
    }

    pub fn all(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn history(&self) -> Vec<HistoryTurn> {
        self.messages
            .iter()
            .map(|message| HistoryTurn {
                role: message.role,
                text: message.text.clone(),
            })
            .collect()
    }
}
