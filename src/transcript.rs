//! Transcript store
//!
//! The ordered, append-only record of everything said in one conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Message identifier, strictly increasing in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id source. Two messages created in the same instant still get
/// distinct ids.
#[derive(Debug)]
pub struct MessageIdGenerator {
    next: u64,
}

impl MessageIdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> MessageId {
        let id = MessageId(self.next);
        self.next += 1;
        id
    }
}

impl Default for MessageIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    User,
    Assistant,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::User => "user",
            Origin::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single transcript entry. Fields are private so an appended message
/// cannot be edited through a shared reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    origin: Origin,
    content: String,
    /// Set on assistant messages that report a failed reply
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_error: bool,
    created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(id: MessageId, origin: Origin, content: impl Into<String>) -> Self {
        Self {
            id,
            origin,
            content: content.into(),
            is_error: false,
            created_at: Utc::now(),
        }
    }

    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(id, Origin::User, content)
    }

    pub fn assistant(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(id, Origin::Assistant, content)
    }

    /// Assistant message carrying an error marker
    pub fn assistant_error(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::assistant(id, content)
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("Message {0} has empty content")]
    EmptyContent(MessageId),
    #[error("Message {id} is not newer than the last message {last}")]
    OutOfOrder { id: MessageId, last: MessageId },
}

/// Append-only message sequence
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fully formed message.
    ///
    /// Content is stored as given (callers trim). Origins are not checked for
    /// alternation.
    pub fn append(&mut self, message: Message) -> Result<&Message, TranscriptError> {
        if message.content.is_empty() {
            return Err(TranscriptError::EmptyContent(message.id));
        }
        if let Some(last) = self.messages.last() {
            if message.id <= last.id {
                return Err(TranscriptError::OutOfOrder {
                    id: message.id,
                    last: last.id,
                });
            }
        }
        self.messages.push(message);
        Ok(&self.messages[self.messages.len() - 1])
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Most recent user message in a run of messages
pub fn last_user_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().rev().find(|m| m.origin == Origin::User)
}
