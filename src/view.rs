//! View-synchronization contract
//!
//! The presentation layer owns scrolling and sizing. The core only tells it
//! when to do either: every time the transcript grows or the draft changes,
//! it emits one [`ViewSync`] carrying both commands in order.

use crate::state_machine::ConvState;
use crate::transcript::{Message, MessageId, Transcript};
use serde::Serialize;

pub const DEFAULT_INPUT_MIN_HEIGHT: u32 = 48;
pub const DEFAULT_INPUT_MAX_HEIGHT: u32 = 200;
const DEFAULT_LINE_HEIGHT: u32 = 24;
const DEFAULT_VERTICAL_PADDING: u32 = 24;

/// Input control sizing rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSizing {
    pub min_height: u32,
    pub max_height: u32,
    pub line_height: u32,
    pub vertical_padding: u32,
}

impl InputSizing {
    pub fn new(min_height: u32, max_height: u32) -> Self {
        Self {
            min_height,
            max_height: max_height.max(min_height),
            ..Self::default()
        }
    }

    /// Visible height for a measured content height
    pub fn height_for(&self, content_height: u32) -> u32 {
        content_height.clamp(self.min_height, self.max_height)
    }

    /// Visible height estimated from the draft's line count, for surfaces that
    /// cannot measure rendered content
    pub fn height_for_text(&self, text: &str) -> u32 {
        let lines = u32::try_from(text.split('\n').count()).unwrap_or(u32::MAX);
        let content = lines
            .saturating_mul(self.line_height)
            .saturating_add(self.vertical_padding);
        self.height_for(content)
    }
}

impl Default for InputSizing {
    fn default() -> Self {
        Self {
            min_height: DEFAULT_INPUT_MIN_HEIGHT,
            max_height: DEFAULT_INPUT_MAX_HEIGHT,
            line_height: DEFAULT_LINE_HEIGHT,
            vertical_padding: DEFAULT_VERTICAL_PADDING,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncReason {
    TranscriptGrew,
    DraftChanged,
}

/// A single presentation command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewCommand {
    /// Scroll so the newest message is visible (`None` for an empty transcript)
    ScrollToNewest(Option<MessageId>),
    ResizeInput { height: u32 },
}

/// Both refresh triggers for one change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewSync {
    pub reason: SyncReason,
    pub scroll_to: Option<MessageId>,
    pub input_height: u32,
}

impl ViewSync {
    /// Commands in the order they must be applied: scroll, then resize
    pub fn commands(&self) -> [ViewCommand; 2] {
        [
            ViewCommand::ScrollToNewest(self.scroll_to),
            ViewCommand::ResizeInput {
                height: self.input_height,
            },
        ]
    }
}

/// Remembers what the view last saw and reports when it must refresh
#[derive(Debug)]
pub struct ViewSyncTracker {
    sizing: InputSizing,
    seen_len: usize,
    seen_draft: String,
}

impl ViewSyncTracker {
    pub fn new(sizing: InputSizing) -> Self {
        Self {
            sizing,
            seen_len: 0,
            seen_draft: String::new(),
        }
    }

    /// Compare against the last observation; `Some` when the transcript length
    /// or the draft changed.
    pub fn observe(&mut self, transcript: &Transcript, draft: &str) -> Option<ViewSync> {
        let grew = transcript.len() != self.seen_len;
        let draft_changed = draft != self.seen_draft;
        if !grew && !draft_changed {
            return None;
        }

        self.seen_len = transcript.len();
        if draft_changed {
            draft.clone_into(&mut self.seen_draft);
        }

        Some(ViewSync {
            reason: if grew {
                SyncReason::TranscriptGrew
            } else {
                SyncReason::DraftChanged
            },
            scroll_to: transcript.last().map(Message::id),
            input_height: self.sizing.height_for_text(draft),
        })
    }
}

/// Events pushed to presentation subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewEvent {
    Init {
        conversation_id: String,
        messages: Vec<Message>,
        pending: bool,
        draft: String,
    },
    MessageAppended {
        message: Message,
    },
    PendingChanged {
        pending: bool,
        /// Full scheduler state as JSON
        state: serde_json::Value,
    },
    DraftChanged {
        draft: String,
    },
    Sync(ViewSync),
    Closed,
}

/// Point-in-time view of a conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationSnapshot {
    pub conversation_id: String,
    pub messages: Vec<Message>,
    pub pending: bool,
    pub draft: String,
    pub state: ConvState,
}

impl ConversationSnapshot {
    pub fn init_event(&self) -> ViewEvent {
        ViewEvent::Init {
            conversation_id: self.conversation_id.clone(),
            messages: self.messages.clone(),
            pending: self.pending,
            draft: self.draft.clone(),
        }
    }
}
