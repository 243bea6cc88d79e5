//! Chat buffers and the input line editor.
//!
//! A buffer is one conversation target: the server itself, a channel,
//! or a direct-message peer. Buffers own their message history, an
//! activity level for the rooms overlay, and the line being edited.
//! Handles are plain `u64` ids so the window tree can refer to buffers
//! without borrowing them.

use super::message::Message;

pub type BufferId = u64;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BufferKind {
    Server,
    Channel,
    User,
}

/// Unseen-content level, in increasing order of urgency.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub enum Activity {
    #[default]
    None,
    Normal,
    Important,
}

pub struct Buffer {
    pub id: BufferId,
    pub kind: BufferKind,
    pub name: String,
    pub activity: Activity,
    pub messages: Vec<Message>,
    pub input: InputLine,
}

impl Buffer {
    pub fn new(id: BufferId, kind: BufferKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            activity: Activity::None,
            messages: Vec::new(),
            input: InputLine::default(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Raise the activity level; it never goes down except through
    /// [`Buffer::clear_activity`].
    pub fn mark(&mut self, activity: Activity) {
        self.activity = self.activity.max(activity);
    }

    pub fn clear_activity(&mut self) {
        self.activity = Activity::None;
    }
}

/// Single-line editor with a byte-offset cursor kept on character
/// boundaries.
#[derive(Default, Clone, Debug)]
pub struct InputLine {
    text: String,
    cursor: usize,
}

impl InputLine {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Cursor position as a byte offset into [`InputLine::text`].
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn insert(&mut self, ch: char) {
        self.text.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    /// Delete the character before the cursor, if any.
    pub fn backspace(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.text.drain(prev..self.cursor);
            self.cursor = prev;
        }
    }

    pub fn left(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.cursor = prev;
        }
    }

    pub fn right(&mut self) {
        if let Some(ch) = self.text[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.len();
    }

    pub fn kill_to_end(&mut self) {
        self.text.truncate(self.cursor);
    }

    /// Take the line out of the editor, leaving it empty.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.text[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
    }
}
