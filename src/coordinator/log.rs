use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    FromUser,
    FromAgent,
}

/// One entry in the conversation log. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    pub direction: Direction,
}

impl ChatMessage {
    pub fn from_user(text: impl Into<String>) -> Self {
        Self::new(text, Direction::FromUser)
    }

    pub fn from_agent(text: impl Into<String>) -> Self {
        Self::new(text, Direction::FromAgent)
    }

    fn new(text: impl Into<String>, direction: Direction) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            sent_at: Utc::now(),
            direction,
        }
    }
}

/// Append-only ordered conversation log; entries preserve causal display
/// order and are never removed during a session.
#[derive(Debug, Default)]
pub struct ConversationLog {
    entries: Vec<ChatMessage>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.entries.push(message);
    }

    pub fn entries(&self) -> &[ChatMessage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
