//! Terminal cell grid.
//!
//! A double-buffered rows×cols array of display cells with a logical
//! cursor. Each tick the frame composer clears the active buffer,
//! rewrites it, and calls [`Term::flush`], which diffs against the
//! previous frame and emits the minimal escape/byte stream to bring the
//! terminal up to date. The output stream is owned exclusively by this
//! type; nothing else in the program writes to the terminal.

use std::fmt::Write as _;
use std::io::{self, ErrorKind, Write};

use bitflags::bitflags;

use super::text;

/// 24-bit color. `Color::DEFAULT` is a reserved sentinel meaning
/// "inherit the terminal default", distinct from real black.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const DEFAULT: Color = Color::new(1, 1, 1);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

bitflags! {
    /// Independent style attributes of a cell.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct VideoFlags: u8 {
        const BOLD      = 1 << 0;
        const ITALIC    = 1 << 1;
        const UNDERLINE = 1 << 2;
        const REVERSE   = 1 << 3;
    }
}

/// Foreground/background colors plus style flags.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Video {
    pub fg: Color,
    pub bg: Color,
    pub flags: VideoFlags,
}

impl Video {
    /// Default-on-default, no styling.
    pub const NORMAL: Video = Video {
        fg: Color::DEFAULT,
        bg: Color::DEFAULT,
        flags: VideoFlags::empty(),
    };
}

/// One terminal column: the bytes of a single display unit plus its
/// video attributes. Empty text marks an unused cell or the right half
/// of a wide glyph.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Cell {
    pub text: String,
    pub video: Video,
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Two empty cells are interchangeable regardless of attributes.
    fn same_as(&self, other: &Cell) -> bool {
        if self.is_empty() && other.is_empty() {
            return true;
        }
        self.video == other.video && self.text == other.text
    }
}

// Substituted for the default sentinel when encoding SGR.
const DEFAULT_FG: Color = Color::new(220, 220, 220);
const DEFAULT_BG: Color = Color::new(20, 20, 20);

/// Double-buffered terminal grid with a byte accumulator.
pub struct Term {
    rows: usize,
    cols: usize,
    y: usize,
    x: usize,
    /// Parity bit selecting the buffer being composed.
    front: usize,
    buffers: [Vec<Cell>; 2],
    /// Pending output bytes for the current flush.
    out: Vec<u8>,
    /// Last SGR actually emitted, for escape coalescing.
    video: Option<Video>,
    /// Full clear + redraw on the next flush (first frame, resizes).
    force: bool,
}

impl Term {
    pub fn new(rows: usize, cols: usize) -> Self {
        let mut term = Self {
            rows: 0,
            cols: 0,
            y: 0,
            x: 0,
            front: 0,
            buffers: [Vec::new(), Vec::new()],
            out: Vec::new(),
            video: None,
            force: true,
        };
        term.resize(rows, cols);
        term
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Reallocate both buffers to the new geometry and blank them.
    /// Callers must reposition the cursor afterwards.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        let size = rows * cols;
        for buffer in &mut self.buffers {
            buffer.clear();
            buffer.resize(size, Cell::default());
        }
        self.rows = rows;
        self.cols = cols;
        self.y = 0;
        self.x = 0;
        self.force = true;
    }

    /// Set the logical cursor without writing.
    pub fn move_to(&mut self, y: usize, x: usize) {
        self.y = y;
        self.x = x;
    }

    fn index(&self, y: usize, x: usize) -> usize {
        self.cols * y + x
    }

    pub(crate) fn cell(&self, y: usize, x: usize) -> &Cell {
        &self.buffers[self.front][self.index(y, x)]
    }

    fn back_cell(&self, y: usize, x: usize) -> &Cell {
        &self.buffers[self.front ^ 1][self.index(y, x)]
    }

    /// Write `text` at the cursor with the given attributes, one display
    /// unit per cell. A width-2 unit occupies a single cell and leaves
    /// the next cell empty as a continuation marker. Writes falling
    /// outside the grid are clipped; the cursor still advances.
    pub fn write(&mut self, video: Video, text: &str) {
        let bytes = text.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            let (len, w) = text::next(&bytes[i..]);
            if len == 0 {
                // control or malformed byte; drop it
                i += 1;
                continue;
            }

            if self.y < self.rows && self.x + w.max(1) <= self.cols {
                let idx = self.index(self.y, self.x);
                let front = &mut self.buffers[self.front];
                front[idx] = Cell {
                    text: text[i..i + len].to_string(),
                    video,
                };
                if w == 2 {
                    front[idx + 1] = Cell::default();
                }
            }

            self.x += w;
            i += len;
        }
    }

    /// Blank the active buffer's logical contents.
    pub fn clear(&mut self) {
        for cell in &mut self.buffers[self.front] {
            *cell = Cell::default();
        }
    }

    fn push_move(&mut self, y: usize, x: usize) {
        let mut s = String::with_capacity(16);
        let _ = write!(s, "\x1b[{};{}H", y + 1, x + 1);
        self.out.extend_from_slice(s.as_bytes());
    }

    /// Emit one combined SGR for `video`, unless it is already active.
    fn push_video(&mut self, video: Video) {
        if self.video == Some(video) {
            return;
        }
        self.video = Some(video);

        let fg = if video.fg == Color::DEFAULT { DEFAULT_FG } else { video.fg };
        let bg = if video.bg == Color::DEFAULT { DEFAULT_BG } else { video.bg };

        let mut s = String::with_capacity(48);
        s.push_str("\x1b[0;");
        if video.flags.contains(VideoFlags::BOLD) {
            s.push_str("1;");
        }
        if video.flags.contains(VideoFlags::ITALIC) {
            s.push_str("3;");
        }
        if video.flags.contains(VideoFlags::UNDERLINE) {
            s.push_str("4;");
        }
        if video.flags.contains(VideoFlags::REVERSE) {
            s.push_str("7;");
        }
        let _ = write!(s, "38;2;{};{};{};", fg.r, fg.g, fg.b);
        let _ = write!(s, "48;2;{};{};{};", bg.r, bg.g, bg.b);
        s.pop();
        s.push('m');
        self.out.extend_from_slice(s.as_bytes());
    }

    fn skip_empty(&self, y: usize, x: usize) -> usize {
        let mut n = 0;
        while x + n < self.cols && self.cell(y, x + n).is_empty() {
            n += 1;
        }
        n
    }

    /// Render a full row: skip empty runs without moving except at row
    /// start or when resuming after a skip, then emit one SGR per
    /// same-video run followed by the run's raw bytes.
    fn render_line(&mut self, y: usize) {
        let mut x = 0;

        loop {
            let skip = self.skip_empty(y, x);
            if x + skip == self.cols {
                break;
            }
            if x == 0 || skip > 0 {
                self.push_move(y, x + skip);
            }
            x += skip;

            let video = self.cell(y, x).video;
            self.push_video(video);
            while x < self.cols && !self.cell(y, x).is_empty() && self.cell(y, x).video == video {
                let bytes = self.cell(y, x).text.clone();
                self.out.extend_from_slice(bytes.as_bytes());
                x += 1;
            }
        }
    }

    /// Re-emit only the cells that differ from the previous frame.
    /// Cells that became empty are erased with a default-video space.
    fn render_line_diff(&mut self, y: usize) {
        let mut x = 0;

        while x < self.cols {
            if self.cell(y, x).same_as(self.back_cell(y, x)) {
                x += 1;
                continue;
            }

            let start = x;
            while x < self.cols && !self.cell(y, x).same_as(self.back_cell(y, x)) {
                x += 1;
            }

            self.push_move(y, start);
            let mut cx = start;
            while cx < x {
                let cell = self.cell(y, cx);
                if cell.is_empty() {
                    self.push_video(Video::NORMAL);
                    self.out.push(b' ');
                    cx += 1;
                } else {
                    let video = cell.video;
                    let bytes = cell.text.clone();
                    let w = text::width(bytes.as_bytes()).max(1);
                    self.push_video(video);
                    self.out.extend_from_slice(bytes.as_bytes());
                    // a wide glyph covers its continuation cell
                    cx += w;
                }
            }
        }
    }

    /// Compose the accumulated frame onto the terminal.
    ///
    /// Forced frames (first frame, after a resize) clear the screen and
    /// render everything; ordinary frames diff against the previous
    /// buffer. The hardware cursor ends at the logical cursor, the
    /// accumulator is written with a retry loop tolerant of short and
    /// interrupted writes, and the buffer parity flips. A persistent
    /// write error is fatal to rendering and is returned to the caller.
    pub fn flush<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if self.force {
            self.out.extend_from_slice(b"\x1b[2J\x1b[H");
            self.video = None;
            for y in 0..self.rows {
                self.render_line(y);
            }
        } else {
            for y in 0..self.rows {
                self.render_line_diff(y);
            }
        }

        let (y, x) = (self.y, self.x);
        self.push_move(y, x);

        let mut pending = &self.out[..];
        while !pending.is_empty() {
            match out.write(pending) {
                Ok(0) => {
                    return Err(io::Error::new(
                        ErrorKind::WriteZero,
                        "terminal write returned zero",
                    ))
                }
                Ok(n) => pending = &pending[n..],
                Err(e)
                    if e.kind() == ErrorKind::Interrupted || e.kind() == ErrorKind::WouldBlock =>
                {
                    continue
                }
                Err(e) => return Err(e),
            }
        }
        out.flush()?;

        self.out.clear();
        self.front ^= 1;
        self.force = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flushed(term: &mut Term) -> String {
        let mut out = Vec::new();
        term.flush(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn write_advances_and_stores() {
        let mut term = Term::new(2, 10);
        term.move_to(1, 3);
        term.write(Video::NORMAL, "ab");
        assert_eq!(term.cell(1, 3).text, "a");
        assert_eq!(term.cell(1, 4).text, "b");
        assert_eq!(term.cell(1, 5).text, "");
    }

    #[test]
    fn wide_glyph_occupies_one_cell_with_continuation() {
        let mut term = Term::new(1, 4);
        term.move_to(0, 0);
        term.write(Video::NORMAL, "あx");
        assert_eq!(term.cell(0, 0).text, "あ");
        assert!(term.cell(0, 1).is_empty());
        assert_eq!(term.cell(0, 2).text, "x");
    }

    #[test]
    fn wide_glyph_clipped_at_last_column() {
        let mut term = Term::new(1, 3);
        term.move_to(0, 2);
        term.write(Video::NORMAL, "あ");
        assert!(term.cell(0, 2).is_empty());
    }

    #[test]
    fn first_flush_clears_and_homes() {
        let mut term = Term::new(1, 4);
        term.write(Video::NORMAL, "hi");
        let out = flushed(&mut term);
        assert!(out.starts_with("\x1b[2J\x1b[H"));
        assert!(out.contains("hi"));
        // one SGR with substituted defaults
        assert!(out.contains("\x1b[0;38;2;220;220;220;48;2;20;20;20m"));
    }

    #[test]
    fn identical_frame_emits_no_cell_updates() {
        let mut term = Term::new(2, 8);
        term.write(Video::NORMAL, "hello");
        let _ = flushed(&mut term);

        term.clear();
        term.move_to(0, 0);
        term.write(Video::NORMAL, "hello");
        let out = flushed(&mut term);
        // only the final cursor reposition
        assert_eq!(out, "\x1b[1;6H");
    }

    #[test]
    fn diff_rewrites_changed_cells_and_erases_stale_ones() {
        let mut term = Term::new(1, 8);
        term.write(Video::NORMAL, "abcd");
        let _ = flushed(&mut term);

        term.clear();
        term.move_to(0, 0);
        term.write(Video::NORMAL, "abX");
        let out = flushed(&mut term);
        assert!(!out.contains("\x1b[2J"));
        // cells 2 and 3 changed: X then an erasing space
        assert!(out.contains("\x1b[1;3H"));
        assert!(out.contains("X "));
        assert!(!out.contains("ab"));
    }

    #[test]
    fn same_video_run_emits_single_sgr() {
        let mut term = Term::new(1, 16);
        let mut red = Video::NORMAL;
        red.fg = Color::new(255, 0, 0);
        term.write(red, "abc");
        let out = flushed(&mut term);
        assert_eq!(out.matches("38;2;255;0;0").count(), 1);
    }

    #[test]
    fn resize_reallocates_and_forces_redraw() {
        let mut term = Term::new(2, 4);
        term.write(Video::NORMAL, "hi");
        let _ = flushed(&mut term);

        term.resize(3, 5);
        assert_eq!((term.rows(), term.cols()), (3, 5));
        for y in 0..3 {
            for x in 0..5 {
                assert!(term.cell(y, x).is_empty());
            }
        }
        term.write(Video::NORMAL, "yo");
        let out = flushed(&mut term);
        assert!(out.starts_with("\x1b[2J\x1b[H"));
    }

    #[test]
    fn empty_runs_are_skipped_with_single_moves() {
        let mut term = Term::new(1, 10);
        term.move_to(0, 2);
        term.write(Video::NORMAL, "a");
        term.move_to(0, 7);
        term.write(Video::NORMAL, "b");
        let out = flushed(&mut term);
        assert!(out.contains("\x1b[1;3H"));
        assert!(out.contains("\x1b[1;8H"));
    }
}
