//! Draft input and the commit protocol

/// Keystrokes the composer cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    /// Line-submit: commits without inserting a newline
    Enter,
    /// Inserts a line break into the draft
    ShiftEnter,
}

/// What a keystroke did to the draft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The caller must run the commit path
    Submit,
    NewlineInserted,
}

/// The user's in-progress, uncommitted text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    text: String,
}

impl Draft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the draft unconditionally. Returns whether the value changed.
    pub fn set(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.text == text {
            return false;
        }
        self.text = text;
        true
    }

    /// Take the trimmed draft for a new user message.
    ///
    /// Blank drafts are left untouched and yield `None`.
    pub fn commit(&mut self) -> Option<String> {
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let content = trimmed.to_string();
        self.text.clear();
        Some(content)
    }

    /// Apply a keystroke. Enter never touches the draft text itself so the
    /// keystroke path and the explicit submit path commit the same content.
    pub fn on_key(&mut self, key: KeyInput) -> KeyOutcome {
        match key {
            KeyInput::Enter => KeyOutcome::Submit,
            KeyInput::ShiftEnter => {
                self.text.push('\n');
                KeyOutcome::NewlineInserted
            }
        }
    }
}
