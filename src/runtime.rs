//! Runtime for executing conversations
//!
//! Each conversation is an explicit object owned by one tokio task. The
//! presentation layer talks to it through a [`ConversationHandle`]; nothing is
//! shared between conversations.

mod executor;


pub use executor::ConversationRuntime;

use crate::composer::KeyInput;
use crate::config::ChatConfig;
use crate::reply::ReplyGenerator;
use crate::state_machine::{ConvContext, TransitionError};
use crate::transcript::MessageId;
use crate::view::{ConversationSnapshot, ViewEvent};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Conversation runtime has stopped")]
    Closed,
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Result of a commit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A user message with this id was appended
    Committed(MessageId),
    /// The draft was blank; nothing happened
    Empty,
}

/// User intents, each acknowledged once the runtime has applied it
#[derive(Debug)]
pub(crate) enum Intent {
    SetDraft {
        text: String,
        ack: oneshot::Sender<()>,
    },
    Commit {
        ack: oneshot::Sender<Result<CommitOutcome, TransitionError>>,
    },
    Key {
        key: KeyInput,
        ack: oneshot::Sender<Result<Option<CommitOutcome>, TransitionError>>,
    },
}

/// Handle to interact with a running conversation
#[derive(Clone)]
pub struct ConversationHandle {
    conversation_id: String,
    intent_tx: mpsc::Sender<Intent>,
    broadcast_tx: broadcast::Sender<ViewEvent>,
    snapshot_rx: watch::Receiver<ConversationSnapshot>,
    shutdown: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ConversationHandle {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Replace the draft
    pub async fn set_draft(&self, text: impl Into<String>) -> Result<(), RuntimeError> {
        let (ack, rx) = oneshot::channel();
        self.send(Intent::SetDraft {
            text: text.into(),
            ack,
        })
        .await?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    /// Commit the draft (explicit submit action)
    pub async fn commit(&self) -> Result<CommitOutcome, RuntimeError> {
        let (ack, rx) = oneshot::channel();
        self.send(Intent::Commit { ack }).await?;
        Ok(rx.await.map_err(|_| RuntimeError::Closed)??)
    }

    /// Feed a keystroke; Enter commits through the same path as [`Self::commit`]
    pub async fn key(&self, key: KeyInput) -> Result<Option<CommitOutcome>, RuntimeError> {
        let (ack, rx) = oneshot::channel();
        self.send(Intent::Key { key, ack }).await?;
        Ok(rx.await.map_err(|_| RuntimeError::Closed)??)
    }

    /// Current messages, pending status and draft
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch channel that always holds the latest snapshot
    pub fn watch(&self) -> watch::Receiver<ConversationSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Subscribe to view events. Starts with an `Init` event for the current
    /// snapshot.
    pub fn subscribe(&self) -> (ViewEvent, broadcast::Receiver<ViewEvent>) {
        // Subscribe first so nothing published after the snapshot is missed
        let rx = self.broadcast_tx.subscribe();
        (self.snapshot().init_event(), rx)
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.intent_tx.is_closed()
    }

    /// Tear the conversation down. Any outstanding reply is cancelled and
    /// never appended. Idempotent.
    pub async fn discard(&self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                tracing::error!(conv_id = %self.conversation_id, error = %e, "Conversation runtime panicked");
            }
        }
    }

    async fn send(&self, intent: Intent) -> Result<(), RuntimeError> {
        if self.shutdown.is_cancelled() {
            return Err(RuntimeError::Closed);
        }
        self.intent_tx
            .send(intent)
            .await
            .map_err(|_| RuntimeError::Closed)
    }
}

/// Start a conversation runtime in the background. Must be called inside a
/// tokio runtime.
pub fn spawn_conversation(
    config: &ChatConfig,
    generator: Arc<dyn ReplyGenerator>,
) -> ConversationHandle {
    let conversation_id = uuid::Uuid::new_v4().to_string();
    let context = ConvContext::new(&conversation_id, config.reply_delay)
        .with_max_reply_attempts(config.max_reply_attempts);

    let (intent_tx, intent_rx) = mpsc::channel(32);
    let (broadcast_tx, _) = broadcast::channel(config.event_capacity.max(1));
    let (snapshot_tx, snapshot_rx) = watch::channel(ConversationSnapshot {
        conversation_id: conversation_id.clone(),
        ..ConversationSnapshot::default()
    });
    let shutdown = CancellationToken::new();

    let runtime = ConversationRuntime::new(
        context,
        generator,
        config.input_sizing,
        intent_rx,
        broadcast_tx.clone(),
        snapshot_tx,
        shutdown.clone(),
    );

    let conv_id = conversation_id.clone();
    let task = tokio::spawn(async move {
        runtime.run().await;
        tracing::info!(conv_id = %conv_id, "Conversation runtime finished");
    });

    ConversationHandle {
        conversation_id,
        intent_tx,
        broadcast_tx,
        snapshot_rx,
        shutdown,
        task: Arc::new(Mutex::new(Some(task))),
    }
}
