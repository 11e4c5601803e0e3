//! Reply generation failures

use thiserror::Error;

/// Why a reply could not be produced
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ReplyError {
    pub kind: ReplyErrorKind,
    pub message: String,
}

impl ReplyError {
    pub fn new(kind: ReplyErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The generator could not answer right now; asking again may work
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ReplyErrorKind::Transient, message)
    }

    /// The generator will never answer this transcript
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ReplyErrorKind::Rejected, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyErrorKind {
    Transient,
    Rejected,
}

impl ReplyErrorKind {
    /// Whether the scheduler should try again within the same pending cycle
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }
}
