//! Conversation state types

use crate::transcript::MessageId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reference delay between a user message and its reply
pub const DEFAULT_REPLY_DELAY: Duration = Duration::from_millis(1500);

/// Attempts per pending cycle before a failure is reported in the transcript
pub const DEFAULT_MAX_REPLY_ATTEMPTS: u32 = 3;

/// Reply scheduler state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// No reply outstanding
    #[default]
    Idle,

    /// A reply to `reply_to` is scheduled, in flight, or waiting on a retry
    Pending { reply_to: MessageId, attempt: u32 },

    /// Conversation torn down; nothing is appended anymore
    Closed,
}

impl ConvState {
    /// Pending-reply status as seen by the view
    pub fn is_pending(&self) -> bool {
        matches!(self, ConvState::Pending { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConvState::Idle => "idle",
            ConvState::Pending { .. } => "pending",
            ConvState::Closed => "closed",
        }
    }
}

/// Context for a conversation (immutable configuration)
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub conversation_id: String,
    pub reply_delay: Duration,
    pub max_reply_attempts: u32,
}

impl ConvContext {
    pub fn new(conversation_id: impl Into<String>, reply_delay: Duration) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            reply_delay,
            max_reply_attempts: DEFAULT_MAX_REPLY_ATTEMPTS,
        }
    }

    pub fn with_max_reply_attempts(mut self, attempts: u32) -> Self {
        self.max_reply_attempts = attempts.max(1);
        self
    }
}
