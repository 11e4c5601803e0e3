//! Effects produced by state transitions

use crate::transcript::MessageId;
use std::time::Duration;

/// Effects to be executed after state transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append the committed user message to the transcript
    AppendUserMessage { message_id: MessageId, content: String },

    /// Append an assistant message; the runtime allocates its id
    AppendReply { content: String, is_error: bool },

    /// Start the delayed reply task for `reply_to`
    ScheduleReply { reply_to: MessageId, delay: Duration },

    /// Cancel the outstanding reply or retry task, if any
    CancelReply,

    /// Schedule a retry of a failed reply
    ScheduleRetry {
        reply_to: MessageId,
        attempt: u32,
        delay: Duration,
    },

    /// Pending-reply status flipped
    NotifyPending { pending: bool },
}

impl Effect {
    pub fn append_user_message(message_id: MessageId, content: impl Into<String>) -> Self {
        Effect::AppendUserMessage {
            message_id,
            content: content.into(),
        }
    }

    pub fn reply(content: impl Into<String>) -> Self {
        Effect::AppendReply {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error_reply(content: impl Into<String>) -> Self {
        Effect::AppendReply {
            content: content.into(),
            is_error: true,
        }
    }

    pub fn schedule_reply(reply_to: MessageId, delay: Duration) -> Self {
        Effect::ScheduleReply { reply_to, delay }
    }
}
