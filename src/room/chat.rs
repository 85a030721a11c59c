use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const MAX_MESSAGE_LENGTH: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub sender_id: String,
    pub username: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// Bounded per-room chat history. Ids increase monotonically so clients can
/// page with "everything after the last id I saw".
#[derive(Debug, Clone)]
pub struct ChatLog {
    next_id: u64,
    capacity: usize,
    messages: VecDeque<ChatMessage>,
}

impl ChatLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            next_id: 1,
            capacity: capacity.max(1),
            messages: VecDeque::new(),
        }
    }

    pub fn push(
        &mut self,
        sender_id: &str,
        username: &str,
        message: String,
        now: DateTime<Utc>,
    ) -> ChatMessage {
        let entry = ChatMessage {
            id: self.next_id,
            sender_id: sender_id.to_string(),
            username: username.to_string(),
            message,
            sent_at: now,
        };
        self.next_id += 1;

        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(entry.clone());
        entry
    }

    pub fn after(&self, after_id: Option<u64>) -> Vec<ChatMessage> {
        let after_id = after_id.unwrap_or(0);
        self.messages
            .iter()
            .filter(|message| message.id > after_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Trims the message and enforces the length bounds
pub fn validate_message(message: &str) -> Result<String, String> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err("Message cannot be empty".to_string());
    }
    if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(format!(
            "Message exceeds {} characters",
            MAX_MESSAGE_LENGTH
        ));
    }
    Ok(trimmed.to_string())
}
