//! Pure state transition function

use super::{ConvContext, ConvState, Effect, Event};
use crate::transcript::MessageId;
use std::time::Duration;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug, PartialEq)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    /// Event accepted, nothing changes
    pub fn unchanged(state: &ConvState) -> Self {
        Self::new(*state)
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Conversation is closed")]
    Closed,
    #[error("Message {0} is blank")]
    EmptyMessage(MessageId),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
/// Reply-side events for anything other than the current pending message are
/// stale and accepted as no-ops.
pub fn transition(
    state: &ConvState,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User messages
        // ============================================================
        (ConvState::Closed, Event::UserMessage { .. }) => Err(TransitionError::Closed),

        (ConvState::Idle, Event::UserMessage { message_id, text }) => {
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyMessage(message_id));
            }
            Ok(TransitionResult::new(ConvState::Pending {
                reply_to: message_id,
                attempt: 1,
            })
            .with_effect(Effect::append_user_message(message_id, text))
            .with_effect(Effect::schedule_reply(message_id, context.reply_delay))
            .with_effect(Effect::NotifyPending { pending: true }))
        }

        // Re-arm: the newest user message owns the reply window
        (ConvState::Pending { .. }, Event::UserMessage { message_id, text }) => {
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyMessage(message_id));
            }
            Ok(TransitionResult::new(ConvState::Pending {
                reply_to: message_id,
                attempt: 1,
            })
            .with_effect(Effect::append_user_message(message_id, text))
            .with_effect(Effect::CancelReply)
            .with_effect(Effect::schedule_reply(message_id, context.reply_delay)))
        }

        // ============================================================
        // Reply delivery
        // ============================================================
        (ConvState::Pending { reply_to, attempt }, Event::ReplyReady { reply_to: r, body })
            if *reply_to == r =>
        {
            if body.trim().is_empty() {
                return Ok(fail_cycle(*attempt, "Reply was empty", false));
            }
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::reply(body))
                .with_effect(Effect::NotifyPending { pending: false }))
        }

        // ============================================================
        // Failure and retry
        // ============================================================
        (
            ConvState::Pending { reply_to, attempt },
            Event::ReplyFailed {
                reply_to: r,
                message,
                error_kind,
            },
        ) if *reply_to == r => {
            if error_kind.is_retryable() && *attempt < context.max_reply_attempts {
                let new_attempt = attempt + 1;
                Ok(TransitionResult::new(ConvState::Pending {
                    reply_to: *reply_to,
                    attempt: new_attempt,
                })
                .with_effect(Effect::ScheduleRetry {
                    reply_to: *reply_to,
                    attempt: new_attempt,
                    delay: retry_delay(new_attempt),
                }))
            } else {
                Ok(fail_cycle(*attempt, &message, error_kind.is_retryable()))
            }
        }

        (
            ConvState::Pending { reply_to, attempt },
            Event::RetryTimeout {
                reply_to: r,
                attempt: retry_attempt,
            },
        ) if *reply_to == r && *attempt == retry_attempt => {
            // The backoff already elapsed, generate right away
            Ok(TransitionResult::unchanged(state)
                .with_effect(Effect::schedule_reply(*reply_to, Duration::ZERO)))
        }

        // Stale reply-side events: superseded window, already idle, or closed
        (
            _,
            Event::ReplyReady { .. } | Event::ReplyFailed { .. } | Event::RetryTimeout { .. },
        ) => Ok(TransitionResult::unchanged(state)),

        // ============================================================
        // Teardown
        // ============================================================
        (ConvState::Closed, Event::Teardown) => Ok(TransitionResult::unchanged(state)),

        (ConvState::Pending { .. }, Event::Teardown) => {
            Ok(TransitionResult::new(ConvState::Closed).with_effect(Effect::CancelReply))
        }

        (ConvState::Idle, Event::Teardown) => Ok(TransitionResult::new(ConvState::Closed)),
    }
}

/// End the pending cycle with an error-marked assistant message
fn fail_cycle(attempt: u32, message: &str, retryable: bool) -> TransitionResult {
    let content = if retryable {
        format!("Reply failed after {attempt} attempts: {message}")
    } else {
        format!("Reply failed: {message}")
    };
    TransitionResult::new(ConvState::Idle)
        .with_effect(Effect::error_reply(content))
        .with_effect(Effect::NotifyPending { pending: false })
}

fn retry_delay(attempt: u32) -> Duration {
    // Exponential backoff: 1s, 2s, 4s, capped
    Duration::from_secs(1 << attempt.saturating_sub(2).min(5))
}
