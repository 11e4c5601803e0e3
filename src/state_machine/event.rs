//! Events that can occur in a conversation

use crate::reply::ReplyErrorKind;
use crate::transcript::MessageId;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // User events
    /// A committed draft. `text` is already trimmed and the id freshly
    /// allocated by the commit protocol.
    UserMessage { message_id: MessageId, text: String },

    // Reply events
    ReplyReady {
        reply_to: MessageId,
        body: String,
    },
    ReplyFailed {
        reply_to: MessageId,
        message: String,
        error_kind: ReplyErrorKind,
    },
    RetryTimeout {
        reply_to: MessageId,
        attempt: u32,
    },

    /// The owning view went away
    Teardown,
}

impl Event {
    /// The user message a reply-side event belongs to, if any
    pub fn reply_to(&self) -> Option<MessageId> {
        match self {
            Event::ReplyReady { reply_to, .. }
            | Event::ReplyFailed { reply_to, .. }
            | Event::RetryTimeout { reply_to, .. } => Some(*reply_to),
            Event::UserMessage { .. } | Event::Teardown => None,
        }
    }
}
