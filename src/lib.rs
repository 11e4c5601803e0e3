//! Chat conversation core
//!
//! A single conversation between a user and a simulated assistant: an
//! append-only transcript, a draft with a commit protocol, a reply scheduler
//! and the refresh triggers a presentation layer needs to keep its view in
//! sync.

pub mod composer;
pub mod config;
pub mod reply;
pub mod runtime;
pub mod state_machine;
pub mod transcript;
pub mod view;

pub use composer::{Draft, KeyInput, KeyOutcome};
pub use config::{ChatConfig, ConfigError, ReplyMode};
pub use reply::{EchoReply, LoggingReply, PlaceholderReply, ReplyError, ReplyGenerator};
pub use runtime::{spawn_conversation, CommitOutcome, ConversationHandle, RuntimeError};
pub use transcript::{Message, MessageId, Origin, Transcript};
pub use view::{ConversationSnapshot, InputSizing, ViewCommand, ViewEvent, ViewSync};
