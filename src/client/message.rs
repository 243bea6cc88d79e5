//! Buffer messages and inline style markup.
//!
//! Messages carry their styling inline as mIRC-style control bytes so
//! that the renderer can wrap and paint them without a separate span
//! structure. The helpers here build those byte sequences; the frame
//! composer interprets them.

use chrono::{DateTime, Local};

use crate::ui::term::Color;

/// Toggle bytes understood by the renderer's text interpreter.
pub const BOLD_OFF: u8 = 0x01;
pub const BOLD_ON: u8 = 0x02;
pub const RESET: u8 = 0x0f;
pub const REVERSE: u8 = 0x12;
pub const ITALIC_OFF: u8 = 0x1c;
pub const ITALIC_ON: u8 = 0x1d;
pub const UNDERLINE_OFF: u8 = 0x1e;
pub const UNDERLINE_ON: u8 = 0x1f;

/// One line of history in a buffer: a left-column title (usually a
/// nick) and a body, both possibly carrying inline style escapes.
#[derive(Clone, Debug)]
pub struct Message {
    pub important: bool,
    pub time: DateTime<Local>,
    pub title: String,
    pub body: String,
}

impl Message {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            important: false,
            time: Local::now(),
            title: title.into(),
            body: body.into(),
        }
    }

}

/// The `0x03#rrggbb,#rrggbb` escape selecting both colors at once.
pub fn color(fg: Color, bg: Color) -> String {
    format!(
        "\x03#{:02x}{:02x}{:02x},#{:02x}{:02x}{:02x}",
        fg.r, fg.g, fg.b, bg.r, bg.g, bg.b
    )
}

/// Wrap `text` in a foreground color, restoring defaults after.
pub fn painted(text: &str, fg: Color) -> String {
    format!(
        "{}{}{}",
        color(fg, Color::DEFAULT),
        text,
        color(Color::DEFAULT, Color::DEFAULT)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_escape_shape() {
        let s = color(Color::new(255, 0, 16), Color::DEFAULT);
        assert_eq!(s, "\x03#ff0010,#010101");
        assert_eq!(s.len(), 16);
    }

    #[test]
    fn painted_restores_defaults() {
        let s = painted("hi", Color::new(1, 2, 3));
        assert!(s.starts_with("\x03#010203,#010101"));
        assert!(s.ends_with("\x03#010101,#010101"));
        assert_eq!(crate::ui::text::width(s.as_bytes()), 2);
    }
}
