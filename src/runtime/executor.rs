//! Conversation runtime executor

use super::{CommitOutcome, Intent};
use crate::composer::{Draft, KeyInput, KeyOutcome};
use crate::reply::ReplyGenerator;
use crate::state_machine::{transition, ConvContext, ConvState, Effect, Event, TransitionError};
use crate::transcript::{Message, MessageIdGenerator, Transcript};
use crate::view::{ConversationSnapshot, InputSizing, ViewEvent, ViewSyncTracker};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Owns one conversation: transcript, draft, scheduler state and the single
/// outstanding reply task. All mutations happen on this task, in order.
pub struct ConversationRuntime {
    context: ConvContext,
    state: ConvState,
    transcript: Transcript,
    draft: Draft,
    ids: MessageIdGenerator,
    generator: Arc<dyn ReplyGenerator>,
    view_sync: ViewSyncTracker,
    intent_rx: mpsc::Receiver<Intent>,
    /// Reply tasks report back on this channel
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<ViewEvent>,
    snapshot_tx: watch::Sender<ConversationSnapshot>,
    shutdown: CancellationToken,
    /// Token for the outstanding reply or retry task
    reply_cancel_token: Option<CancellationToken>,
}

impl ConversationRuntime {
    pub(crate) fn new(
        context: ConvContext,
        generator: Arc<dyn ReplyGenerator>,
        sizing: InputSizing,
        intent_rx: mpsc::Receiver<Intent>,
        broadcast_tx: broadcast::Sender<ViewEvent>,
        snapshot_tx: watch::Sender<ConversationSnapshot>,
        shutdown: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(32);
        Self {
            context,
            state: ConvState::Idle,
            transcript: Transcript::new(),
            draft: Draft::new(),
            ids: MessageIdGenerator::new(),
            generator,
            view_sync: ViewSyncTracker::new(sizing),
            intent_rx,
            event_rx,
            event_tx,
            broadcast_tx,
            snapshot_tx,
            shutdown,
            reply_cancel_token: None,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            conv_id = %self.context.conversation_id,
            generator = %self.generator.name(),
            reply_delay_ms = %self.context.reply_delay.as_millis(),
            "Starting conversation runtime"
        );

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                intent = self.intent_rx.recv() => match intent {
                    Some(intent) => self.handle_intent(intent),
                    // Every handle is gone, the view no longer exists
                    None => break,
                },

                Some(event) = self.event_rx.recv() => {
                    if let Err(e) = self.process_event(event) {
                        tracing::warn!(conv_id = %self.context.conversation_id, error = %e, "Event rejected");
                    }
                    self.publish();
                }
            }
        }

        self.teardown();
        tracing::info!(conv_id = %self.context.conversation_id, "Conversation runtime stopped");
    }

    fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::SetDraft { text, ack } => {
                self.set_draft(text);
                self.publish();
                let _ = ack.send(());
            }
            Intent::Commit { ack } => {
                let outcome = self.commit();
                self.publish();
                let _ = ack.send(outcome);
            }
            Intent::Key { key, ack } => {
                let outcome = self.key(key);
                self.publish();
                let _ = ack.send(outcome);
            }
        }
    }

    fn set_draft(&mut self, text: String) {
        if self.draft.set(text) {
            let _ = self.broadcast_tx.send(ViewEvent::DraftChanged {
                draft: self.draft.text().to_string(),
            });
        }
    }

    /// The commit protocol: trim, guard emptiness, append, clear
    fn commit(&mut self) -> Result<CommitOutcome, TransitionError> {
        let original = self.draft.text().to_string();
        let Some(text) = self.draft.commit() else {
            tracing::debug!(conv_id = %self.context.conversation_id, "Ignoring blank commit");
            return Ok(CommitOutcome::Empty);
        };

        let message_id = self.ids.next_id();
        if let Err(e) = self.process_event(Event::UserMessage { message_id, text }) {
            self.draft.set(original);
            return Err(e);
        }

        let _ = self.broadcast_tx.send(ViewEvent::DraftChanged {
            draft: String::new(),
        });
        Ok(CommitOutcome::Committed(message_id))
    }

    fn key(&mut self, key: KeyInput) -> Result<Option<CommitOutcome>, TransitionError> {
        match self.draft.on_key(key) {
            KeyOutcome::Submit => self.commit().map(Some),
            KeyOutcome::NewlineInserted => {
                let _ = self.broadcast_tx.send(ViewEvent::DraftChanged {
                    draft: self.draft.text().to_string(),
                });
                Ok(None)
            }
        }
    }

    fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let reply_to = event.reply_to();
        let result = transition(&self.state, &self.context, event)?;

        if result.new_state == self.state && result.effects.is_empty() {
            if let Some(reply_to) = reply_to {
                tracing::debug!(
                    conv_id = %self.context.conversation_id,
                    %reply_to,
                    state = %self.state.name(),
                    "Dropping stale reply event"
                );
            }
            return Ok(());
        }

        let old_state = std::mem::replace(&mut self.state, result.new_state);
        if old_state.name() != self.state.name() {
            tracing::info!(
                conv_id = %self.context.conversation_id,
                from = %old_state.name(),
                to = %self.state.name(),
                "State transition"
            );
        }

        for effect in result.effects {
            self.execute_effect(effect);
        }
        Ok(())
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendUserMessage {
                message_id,
                content,
            } => {
                self.append(Message::user(message_id, content));
            }

            Effect::AppendReply { content, is_error } => {
                let id = self.ids.next_id();
                let message = if is_error {
                    Message::assistant_error(id, content)
                } else {
                    Message::assistant(id, content)
                };
                self.append(message);
            }

            Effect::ScheduleReply { reply_to, delay } => {
                let cancel_token = self.arm_cancel_token();

                let generator = Arc::clone(&self.generator);
                let event_tx = self.event_tx.clone();
                // Only this window's user messages can land while it stays
                // armed, so the transcript is final at this point
                let transcript = self.transcript.messages().to_vec();

                tokio::spawn(async move {
                    tokio::select! {
                        biased;

                        () = cancel_token.cancelled() => {
                            tracing::debug!(%reply_to, "Reply task cancelled");
                        }

                        result = delayed_reply(generator.as_ref(), &transcript, delay) => {
                            let event = match result {
                                Ok(body) => Event::ReplyReady { reply_to, body },
                                Err(e) => Event::ReplyFailed {
                                    reply_to,
                                    message: e.message,
                                    error_kind: e.kind,
                                },
                            };
                            // Runtime may already be gone
                            let _ = event_tx.send(event).await;
                        }
                    }
                });
            }

            Effect::CancelReply => {
                if let Some(token) = self.reply_cancel_token.take() {
                    tracing::debug!(conv_id = %self.context.conversation_id, "Cancelling outstanding reply");
                    token.cancel();
                }
            }

            Effect::ScheduleRetry {
                reply_to,
                attempt,
                delay,
            } => {
                tracing::info!(
                    conv_id = %self.context.conversation_id,
                    %reply_to,
                    attempt,
                    delay_ms = %delay.as_millis(),
                    "Scheduling reply retry"
                );
                let cancel_token = self.arm_cancel_token();
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        () = cancel_token.cancelled() => {}
                        () = tokio::time::sleep(delay) => {
                            let _ = event_tx.send(Event::RetryTimeout { reply_to, attempt }).await;
                        }
                    }
                });
            }

            Effect::NotifyPending { pending } => {
                let state = serde_json::to_value(self.state).unwrap_or(Value::Null);
                let _ = self
                    .broadcast_tx
                    .send(ViewEvent::PendingChanged { pending, state });
            }
        }
    }

    /// Replace the outstanding task's token with a fresh child of the
    /// shutdown token, cancelling the old one
    fn arm_cancel_token(&mut self) -> CancellationToken {
        if let Some(previous) = self.reply_cancel_token.take() {
            previous.cancel();
        }
        let token = self.shutdown.child_token();
        self.reply_cancel_token = Some(token.clone());
        token
    }

    fn append(&mut self, message: Message) {
        match self.transcript.append(message) {
            Ok(message) => {
                tracing::debug!(
                    conv_id = %self.context.conversation_id,
                    id = %message.id(),
                    origin = %message.origin(),
                    "Message appended"
                );
                let _ = self.broadcast_tx.send(ViewEvent::MessageAppended {
                    message: message.clone(),
                });
            }
            Err(e) => {
                tracing::error!(conv_id = %self.context.conversation_id, error = %e, "Failed to append message");
            }
        }
    }

    /// Publish the snapshot and, if the transcript or draft moved, the view
    /// refresh triggers. Watchers are only woken when something differs.
    fn publish(&mut self) {
        let snapshot = ConversationSnapshot {
            conversation_id: self.context.conversation_id.clone(),
            messages: self.transcript.messages().to_vec(),
            pending: self.state.is_pending(),
            draft: self.draft.text().to_string(),
            state: self.state,
        };
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });

        if let Some(sync) = self.view_sync.observe(&self.transcript, self.draft.text()) {
            let _ = self.broadcast_tx.send(ViewEvent::Sync(sync));
        }
    }

    fn teardown(&mut self) {
        if let Err(e) = self.process_event(Event::Teardown) {
            tracing::warn!(conv_id = %self.context.conversation_id, error = %e, "Teardown rejected");
        }
        if let Some(token) = self.reply_cancel_token.take() {
            token.cancel();
        }
        self.publish();
        let _ = self.broadcast_tx.send(ViewEvent::Closed);
    }
}

async fn delayed_reply(
    generator: &dyn ReplyGenerator,
    transcript: &[Message],
    delay: Duration,
) -> Result<String, crate::reply::ReplyError> {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    generator.generate(transcript).await
}
