//! Reply generation collaborator
//!
//! The state machine only decides *when* a reply lands. What the reply says
//! comes from a [`ReplyGenerator`], which sees the full prior transcript.

mod error;

pub use error::{ReplyError, ReplyErrorKind};

use crate::transcript::{last_user_message, Message};
use async_trait::async_trait;
use std::sync::Arc;

/// Body used when no real generator is plugged in
pub const PLACEHOLDER_REPLY: &str = "This is a simulated AI response. Thank you for your message!";

/// Produces the body of an assistant reply
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Generate a reply for the transcript as it stands when the delay elapses
    async fn generate(&self, transcript: &[Message]) -> Result<String, ReplyError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: ReplyGenerator + ?Sized> ReplyGenerator for Arc<T> {
    async fn generate(&self, transcript: &[Message]) -> Result<String, ReplyError> {
        (**self).generate(transcript).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Constant reply, independent of the transcript
#[derive(Debug, Clone)]
pub struct PlaceholderReply {
    body: String,
}

impl PlaceholderReply {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

impl Default for PlaceholderReply {
    fn default() -> Self {
        Self::new(PLACEHOLDER_REPLY)
    }
}

#[async_trait]
impl ReplyGenerator for PlaceholderReply {
    async fn generate(&self, _transcript: &[Message]) -> Result<String, ReplyError> {
        Ok(self.body.clone())
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}

/// Quotes the most recent user message back
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoReply;

#[async_trait]
impl ReplyGenerator for EchoReply {
    async fn generate(&self, transcript: &[Message]) -> Result<String, ReplyError> {
        let last_user = last_user_message(transcript)
            .ok_or_else(|| ReplyError::rejected("No user message to respond to"))?;
        Ok(format!("Bot: I'm a bot response to \"{}\"", last_user.content()))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// Logging wrapper for reply generators
pub struct LoggingReply {
    inner: Arc<dyn ReplyGenerator>,
}

impl LoggingReply {
    pub fn new(inner: Arc<dyn ReplyGenerator>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ReplyGenerator for LoggingReply {
    async fn generate(&self, transcript: &[Message]) -> Result<String, ReplyError> {
        let start = std::time::Instant::now();
        let result = self.inner.generate(transcript).await;
        let duration = start.elapsed();

        match &result {
            Ok(body) => {
                tracing::info!(
                    generator = %self.inner.name(),
                    duration_ms = %duration.as_millis(),
                    transcript_len = transcript.len(),
                    reply_len = body.len(),
                    "Reply generated"
                );
            }
            Err(e) => {
                tracing::error!(
                    generator = %self.inner.name(),
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "Reply generation failed"
                );
            }
        }

        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
