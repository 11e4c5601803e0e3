//! Property-based tests for the state machine
//!
//! These tests drive the transition function with a simulated scheduler and
//! check the invariants the runtime relies on.

use super::*;
use crate::reply::ReplyErrorKind;
use crate::transcript::{MessageId, Origin};
use proptest::prelude::*;
use std::time::Duration;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> ConvContext {
    ConvContext::new("test-conv", Duration::from_millis(1500))
}

/// Things that can happen to a conversation from the outside
#[derive(Debug, Clone)]
enum Op {
    Commit(String),
    /// The outstanding reply task finishes
    Deliver(String),
    /// The outstanding reply task fails
    Fail(ReplyErrorKind),
    /// The outstanding retry backoff elapses
    FireRetry,
    /// A reply for a message that no longer owns the window shows up
    Stale(u64),
    Teardown,
}

/// Minimal stand-in for the runtime: executes effects against a log
#[derive(Debug, Default)]
struct Sim {
    state: ConvState,
    next_id: u64,
    appended: Vec<(Origin, String)>,
    /// Reply task currently armed (`reply_to`)
    armed_reply: Option<MessageId>,
    /// Retry timer currently armed
    armed_retry: Option<(MessageId, u32)>,
    pending_flag: bool,
}

impl Sim {
    fn apply(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = transition(&self.state, &test_context(), event)?;
        self.state = result.new_state;
        for effect in result.effects {
            match effect {
                Effect::AppendUserMessage { content, .. } => {
                    self.appended.push((Origin::User, content));
                }
                Effect::AppendReply { content, .. } => {
                    self.appended.push((Origin::Assistant, content));
                }
                Effect::ScheduleReply { reply_to, .. } => {
                    assert!(
                        self.armed_reply.is_none(),
                        "second reply task armed without cancelling the first"
                    );
                    self.armed_retry = None;
                    self.armed_reply = Some(reply_to);
                }
                Effect::CancelReply => {
                    self.armed_reply = None;
                    self.armed_retry = None;
                }
                Effect::ScheduleRetry {
                    reply_to, attempt, ..
                } => {
                    self.armed_reply = None;
                    self.armed_retry = Some((reply_to, attempt));
                }
                Effect::NotifyPending { pending } => self.pending_flag = pending,
            }
        }
        Ok(())
    }

    fn run(&mut self, op: Op) {
        let event = match op {
            Op::Commit(text) => {
                self.next_id += 1;
                Event::UserMessage {
                    message_id: MessageId::new(self.next_id),
                    text,
                }
            }
            Op::Deliver(body) => match self.armed_reply.take() {
                Some(reply_to) => Event::ReplyReady { reply_to, body },
                None => return,
            },
            Op::Fail(error_kind) => match self.armed_reply.take() {
                Some(reply_to) => Event::ReplyFailed {
                    reply_to,
                    message: "failed".to_string(),
                    error_kind,
                },
                None => return,
            },
            Op::FireRetry => match self.armed_retry.take() {
                Some((reply_to, attempt)) => Event::RetryTimeout { reply_to, attempt },
                None => return,
            },
            // Id 0 is never allocated and ids past `next_id` don't exist yet
            Op::Stale(offset) => Event::ReplyReady {
                reply_to: MessageId::new(if offset == 0 { 0 } else { self.next_id + offset }),
                body: "stale".to_string(),
            },
            Op::Teardown => Event::Teardown,
        };
        // Rejections (blank text, closed) are fine; state must be untouched
        let before = self.state;
        if self.apply(event).is_err() {
            assert_eq!(self.state, before);
        }
    }

    /// Let every outstanding timer fire successfully
    fn drain(&mut self) {
        for _ in 0..10 {
            if self.armed_reply.is_some() {
                self.run(Op::Deliver("done".to_string()));
            } else if self.armed_retry.is_some() {
                self.run(Op::FireRetry);
            } else {
                break;
            }
        }
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_error_kind() -> impl Strategy<Value = ReplyErrorKind> {
    prop_oneof![
        Just(ReplyErrorKind::Transient),
        Just(ReplyErrorKind::Rejected),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => "[a-zA-Z ]{0,12}".prop_map(Op::Commit),
        3 => "[a-zA-Z]{1,12}".prop_map(Op::Deliver),
        2 => arb_error_kind().prop_map(Op::Fail),
        2 => Just(Op::FireRetry),
        1 => (0u64..3).prop_map(Op::Stale),
        1 => Just(Op::Teardown),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Pending flag always mirrors the state, and at most one task is armed
    #[test]
    fn prop_pending_flag_tracks_state(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut sim = Sim::default();
        for op in ops {
            sim.run(op);
            prop_assert_eq!(sim.pending_flag, sim.state.is_pending());
            prop_assert!(!(sim.armed_reply.is_some() && sim.armed_retry.is_some()));
            if sim.state.is_pending() {
                prop_assert!(sim.armed_reply.is_some() || sim.armed_retry.is_some());
            }
        }
    }

    // Every pending cycle ends; nothing leaves the flag stuck
    #[test]
    fn prop_never_stuck_pending(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut sim = Sim::default();
        for op in ops {
            sim.run(op);
        }
        sim.drain();
        prop_assert!(!sim.state.is_pending(), "stuck in {:?}", sim.state);
        prop_assert!(!sim.pending_flag);
    }

    // Each burst of user messages gets at most one assistant message
    #[test]
    fn prop_one_reply_per_window(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut sim = Sim::default();
        for op in ops {
            sim.run(op);
        }
        sim.drain();

        let mut consecutive_assistant = 0;
        for (origin, _) in &sim.appended {
            match origin {
                Origin::Assistant => {
                    consecutive_assistant += 1;
                    prop_assert!(consecutive_assistant <= 1, "double reply: {:?}", sim.appended);
                }
                Origin::User => consecutive_assistant = 0,
            }
        }
        // A reply never precedes the first user message
        if let Some((first, _)) = sim.appended.first() {
            prop_assert_eq!(*first, Origin::User);
        }
    }

    // Nothing is appended after teardown
    #[test]
    fn prop_closed_absorbs_everything(
        before in proptest::collection::vec(arb_op(), 0..20),
        after in proptest::collection::vec(arb_op(), 0..20)
    ) {
        let mut sim = Sim::default();
        for op in before {
            sim.run(op);
        }
        sim.run(Op::Teardown);
        prop_assert_eq!(sim.state, ConvState::Closed);
        prop_assert!(sim.armed_reply.is_none() && sim.armed_retry.is_none());

        let appended = sim.appended.len();
        for op in after {
            sim.run(op);
        }
        sim.drain();
        prop_assert_eq!(sim.appended.len(), appended);
        prop_assert_eq!(sim.state, ConvState::Closed);
    }

    // Blank commits never change anything
    #[test]
    fn prop_blank_user_message_rejected(state_pick in 0u8..2, blank in "[ \t\n]{0,6}") {
        let state = if state_pick == 0 {
            ConvState::Idle
        } else {
            ConvState::Pending { reply_to: MessageId::new(1), attempt: 1 }
        };
        let event = Event::UserMessage { message_id: MessageId::new(2), text: blank };
        let result = transition(&state, &test_context(), event);
        prop_assert_eq!(result, Err(TransitionError::EmptyMessage(MessageId::new(2))));
    }

    // Reply-side events never append a user message or arm a second task
    #[test]
    fn prop_stale_events_are_noops(reply_to in 0u64..100, current in 100u64..200, attempt in 1u32..4) {
        let state = ConvState::Pending { reply_to: MessageId::new(current), attempt };
        let events = vec![
            Event::ReplyReady { reply_to: MessageId::new(reply_to), body: "x".to_string() },
            Event::ReplyFailed {
                reply_to: MessageId::new(reply_to),
                message: "x".to_string(),
                error_kind: ReplyErrorKind::Transient,
            },
            Event::RetryTimeout { reply_to: MessageId::new(reply_to), attempt },
        ];
        for event in events {
            let result = transition(&state, &test_context(), event).unwrap();
            prop_assert_eq!(result.new_state, state);
            prop_assert!(result.effects.is_empty());
        }
    }
}
