//! Frame composer.
//!
//! Walks the window tree once per tick and paints every leaf into the
//! cell grid: bottom-anchored message history word-wrapped past a fixed
//! timestamp/nick margin, a status line, and a horizontally scrolled
//! input line. Inline mIRC style escapes in message text are
//! interpreted here. The grid is flushed exactly once per frame and the
//! hardware cursor lands on the focused leaf's input position.

use std::io;

use crate::client::buffer::{Activity, BufferId, BufferKind};
use crate::client::message::{self, Message};
use crate::client::Client;

use super::term::{Color, Term, Video, VideoFlags};
use super::text::{self, ColorParam};
use super::window::{WindowId, WindowTree};

const MAX_NICK: usize = 15;
const TIME_LEN: usize = 8;
const LEFT_MARGIN: usize = MAX_NICK + TIME_LEN + 1 + 3;

/// The classic 16-color mIRC palette plus a leading default entry;
/// palette indices are looked up at `(i + 1) % 17`.
const PALETTE: [Color; 17] = [
    Color::new(1, 1, 1),
    Color::new(255, 255, 255),
    Color::new(0, 0, 0),
    Color::new(0, 0, 127),
    Color::new(0, 147, 0),
    Color::new(255, 0, 0),
    Color::new(127, 0, 0),
    Color::new(156, 0, 156),
    Color::new(252, 127, 0),
    Color::new(255, 255, 0),
    Color::new(0, 252, 0),
    Color::new(0, 147, 147),
    Color::new(0, 255, 255),
    Color::new(0, 0, 252),
    Color::new(255, 0, 255),
    Color::new(127, 127, 127),
    Color::new(210, 210, 210),
];

fn resolve(param: Option<ColorParam>) -> Color {
    match param {
        Some(ColorParam::Rgb(r, g, b)) => Color::new(r, g, b),
        Some(ColorParam::Palette(i)) => PALETTE[(i as usize + 1) % PALETTE.len()],
        None => Color::DEFAULT,
    }
}

fn is_style_byte(b: u8) -> bool {
    matches!(b, 0x01 | 0x02 | 0x03 | 0x0f | 0x12 | 0x1c..=0x1f)
}

/// Write `s` at the cursor, interpreting inline style escapes relative
/// to the base video `base`. A color escape with no background (or the
/// default sentinel as background) keeps the base background; `0x0f`
/// restores `base` entirely.
fn draw_text(term: &mut Term, s: &str, base: Video) {
    let bytes = s.as_bytes();
    let mut v = base;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            message::BOLD_OFF => v.flags.remove(VideoFlags::BOLD),
            message::BOLD_ON => v.flags.insert(VideoFlags::BOLD),
            message::RESET => v = base,
            message::REVERSE => v.flags.insert(VideoFlags::REVERSE),
            message::ITALIC_OFF => v.flags.remove(VideoFlags::ITALIC),
            message::ITALIC_ON => v.flags.insert(VideoFlags::ITALIC),
            message::UNDERLINE_OFF => v.flags.remove(VideoFlags::UNDERLINE),
            message::UNDERLINE_ON => v.flags.insert(VideoFlags::UNDERLINE),
            text::COLOR_ESCAPE => {
                let (fg, n) = text::color_param(&bytes[i + 1..]);
                i += n;
                let mut bg = base.bg;
                if bytes.get(i + 1) == Some(&b',') {
                    let (param, m) = text::color_param(&bytes[i + 2..]);
                    if param.is_some() {
                        i += 1 + m;
                        bg = resolve(param);
                    }
                }
                if bg == Color::DEFAULT {
                    bg = base.bg;
                }
                v.fg = resolve(fg);
                v.bg = bg;
            }
            _ => {
                let start = i;
                while i < bytes.len() && !is_style_byte(bytes[i]) {
                    i += 1;
                }
                term.write(v, &s[start..i]);
                continue;
            }
        }
        i += 1;
    }
}

/// Split `body` into wrapped line segments of at most `budget` columns,
/// breaking at the last space where possible and dropping the space at
/// each break. Every segment makes progress even when a single unit
/// exceeds the budget. An empty body yields one empty segment.
fn wrap_blocks(body: &[u8], budget: usize) -> Vec<(usize, usize)> {
    let budget = budget.max(1);
    let mut blocks = Vec::new();
    let mut pos = 0;

    while pos < body.len() {
        let n = text::fit(&body[pos..], budget);
        let mut i = n;
        if pos + n != body.len() {
            while i != 0 && body[pos + i] != b' ' {
                i -= 1;
            }
            if i == 0 {
                i = n;
            }
        }
        if i == 0 {
            i = text::next(&body[pos..]).0.max(1);
        }
        blocks.push((pos, i));
        pos += i;
        if pos < body.len() && body[pos] == b' ' {
            pos += 1;
        }
    }

    if blocks.is_empty() {
        blocks.push((0, 0));
    }
    blocks
}

/// Deterministic per-nick color: a djb2 hash of the nick seeds a small
/// linear congruential generator whose draws pick a fully saturated,
/// light HSL color.
pub fn nick_color(nick: &str) -> Color {
    let mut hash: u32 = 5381;
    for &b in nick.as_bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as u32);
    }

    // minstd
    let mut state = (hash % 0x7fff_ffff).max(1) as u64;
    let mut draw = || {
        state = state * 48271 % 0x7fff_ffff;
        state as f64 / 0x7fff_ffff as f64
    };

    let h = draw();
    let s = draw() * 0.25 + 0.75;
    let l = draw() * 0.15 + 0.65;
    hsl_to_rgb(h, s, l)
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> Color {
    let (r, g, b) = if s == 0.0 {
        (l, l, l)
    } else {
        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        (
            hue_to_rgb(p, q, h + 1.0 / 3.0),
            hue_to_rgb(p, q, h),
            hue_to_rgb(p, q, h - 1.0 / 3.0),
        )
    };

    Color::new(
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    )
}

pub struct Ui {
    term: Term,
    pub show_rooms: bool,
}

impl Ui {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            term: Term::new(rows as usize, cols as usize),
            show_rooms: false,
        }
    }

    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.term.resize(rows as usize, cols as usize);
    }

    /// Compose and flush one complete frame.
    pub fn draw(&mut self, client: &Client, tree: &WindowTree, focus: WindowId) -> io::Result<()> {
        self.term.clear();

        let mut cursor = (0, 0);
        for id in tree.leaves() {
            if let Some(pos) = self.draw_leaf(client, tree, id) {
                if id == focus {
                    cursor = pos;
                }
            }
        }

        if self.show_rooms {
            let current = tree.leaf(focus).buffer;
            self.draw_rooms(client, current);
        }

        self.term.move_to(cursor.0, cursor.1);
        let stdout = io::stdout();
        self.term.flush(&mut stdout.lock())
    }

    /// Render one leaf and return its input cursor position.
    fn draw_leaf(
        &mut self,
        client: &Client,
        tree: &WindowTree,
        id: WindowId,
    ) -> Option<(usize, usize)> {
        let node = tree.get(id);
        let state = tree.leaf(id);
        let (network, buffer) = client.locate(state.buffer)?;
        let (wy, wx) = (node.y as usize, node.x as usize);
        let (height, width) = (node.height as usize, node.width as usize);
        if height < 3 {
            return None;
        }

        let filter = state.search_mode.then(|| buffer.input.text());

        // history, bottom-anchored
        let mut row = height as i64 - 3;
        let mut i = buffer.messages.len() as i64 - 1 - state.scroll as i64;
        while i >= 0 && row >= 0 {
            let message = &buffer.messages[i as usize];
            let show = filter.map_or(true, |needle| {
                message.body.contains(needle) || message.title.contains(needle)
            });
            if show {
                row -= self.draw_message(wy, wx, width, message, row);
            }
            i -= 1;
        }

        // status line
        let mut status = match buffer.kind {
            BufferKind::Server => network.server.clone(),
            BufferKind::Channel | BufferKind::User => {
                format!("{}@{}", buffer.name, network.name)
            }
        };
        if state.scroll > 0 {
            status.push_str(" (scroll)");
        }
        if state.resize_mode {
            status.push_str(" (resize)");
        }
        if state.search_mode {
            status.push_str(" (search)");
        }
        let mut cols = text::width(status.as_bytes());
        while cols < width {
            status.push(' ');
            cols += 1;
        }

        let mut v = Video::NORMAL;
        v.fg = Color::new(235, 235, 235);
        v.bg = Color::new(45, 45, 45);
        self.term.move_to(wy + height - 2, wx);
        self.term.write(v, &status);

        // input line
        let nick = &network.nick;
        let prompt_width = text::width(nick.as_bytes()) + 3;
        self.term.move_to(wy + height - 1, wx);
        self.term.write(Video::NORMAL, &format!("({nick}) "));

        let input = &buffer.input;
        if input.is_empty() || width <= prompt_width {
            return Some((wy + height - 1, wx + prompt_width));
        }

        let bytes = input.text().as_bytes();
        let cx = text::width(&bytes[..input.cursor()]);
        let space = width - prompt_width;
        let step = (space / 2).max(1);

        let mut offset = 0;
        while cx - offset >= space {
            offset += step;
        }

        let start = text::fit(bytes, offset);
        let visible = &bytes[start..];
        let end = text::fit(visible, space);
        if let Ok(shown) = std::str::from_utf8(&visible[..end]) {
            self.term.write(Video::NORMAL, shown);
        }

        Some((wy + height - 1, wx + prompt_width + cx - offset))
    }

    /// Render one message ending on relative `row`; rows above the leaf
    /// top are clipped. Returns the number of wrapped rows it spans.
    fn draw_message(
        &mut self,
        wy: usize,
        wx: usize,
        width: usize,
        message: &Message,
        row: i64,
    ) -> i64 {
        let body = message.body.as_bytes();
        let blocks = wrap_blocks(body, width.saturating_sub(LEFT_MARGIN));

        let first_row = row - blocks.len() as i64 + 1;

        if first_row >= 0 {
            let mut v = Video::NORMAL;
            v.fg = Color::new(60, 60, 60);
            self.term.move_to(wy + first_row as usize, wx);
            self.term
                .write(v, &format!("{} ", message.time.format("%H:%M:%S")));

            let mut v = Video::NORMAL;
            if message.important {
                v.flags.insert(VideoFlags::BOLD);
                v.bg = Color::new(60, 60, 60);
            }
            let pad = MAX_NICK.saturating_sub(text::width(message.title.as_bytes()));
            for _ in 0..pad {
                self.term.write(v, " ");
            }
            draw_text(&mut self.term, &message.title, v);
            self.term.write(v, " ");
        }

        for (i, &(pos, n)) in blocks.iter().enumerate() {
            let y = first_row + i as i64;
            if y < 0 {
                continue;
            }
            self.term
                .move_to(wy + y as usize, wx + TIME_LEN + 1 + MAX_NICK + 1);
            self.term.write(Video::NORMAL, "| ");
            if let Ok(block) = std::str::from_utf8(&body[pos..pos + n]) {
                draw_text(&mut self.term, block, Video::NORMAL);
            }
        }

        blocks.len() as i64
    }

    /// Buffer-list overlay in the top-left corner, colored by activity,
    /// with the currently focused buffer highlighted.
    fn draw_rooms(&mut self, client: &Client, current: BufferId) {
        let bg = Color::new(40, 40, 40);
        let current_bg = Color::new(80, 80, 80);

        let mut row = 1;
        for network in &client.networks {
            for buffer in &network.buffers {
                let mut v = Video::NORMAL;
                v.fg = activity_color(buffer.activity);
                v.bg = if buffer.id == current { current_bg } else { bg };

                let line = match buffer.kind {
                    BufferKind::Server => format!(" {:<24}", network.name),
                    _ => format!("     {:<20}", buffer.name),
                };
                self.term.move_to(row, 2);
                self.term.write(v, &line);
                row += 1;
            }
        }
    }
}

fn activity_color(activity: Activity) -> Color {
    match activity {
        Activity::None => Color::new(220, 220, 220),
        Activity::Normal => Color::new(125, 185, 245),
        Activity::Important => Color::new(255, 145, 255),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_breaks_at_spaces_within_budget() {
        let body = b"the quick brown fox jumps over the lazy dog";
        let blocks = wrap_blocks(body, 16);
        for &(pos, n) in &blocks {
            let segment = &body[pos..pos + n];
            assert!(text::width(segment) <= 16);
            assert!(!segment.starts_with(b" "));
            assert!(!segment.ends_with(b" "));
        }
        // segments cover the body minus the dropped break spaces
        let rebuilt: Vec<u8> = blocks
            .iter()
            .flat_map(|&(pos, n)| body[pos..pos + n].iter().copied())
            .collect();
        let original: Vec<u8> = body.iter().copied().filter(|&b| b != b' ').collect();
        let rebuilt: Vec<u8> = rebuilt.into_iter().filter(|&b| b != b' ').collect();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn wrap_of_hundred_chars_into_thirty_columns() {
        let word = "abcdefghi "; // 10 bytes per word
        let body: String = word.repeat(10);
        let blocks = wrap_blocks(body.trim_end().as_bytes(), 30);
        assert_eq!(blocks.len(), 4); // 3 words of 29 cols, then the rest
        for &(_, n) in &blocks {
            assert!(n <= 30);
        }
    }

    #[test]
    fn wrap_hard_breaks_unbroken_words() {
        let body = b"abcdefghijklmnopqrstuvwxyz";
        let blocks = wrap_blocks(body, 10);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], (0, 10));
        assert_eq!(blocks[1], (10, 10));
        assert_eq!(blocks[2], (20, 6));
    }

    #[test]
    fn wrap_empty_body_yields_one_row() {
        assert_eq!(wrap_blocks(b"", 30), vec![(0, 0)]);
    }

    #[test]
    fn wrap_always_progresses_on_tiny_budgets() {
        let blocks = wrap_blocks("ああああ".as_bytes(), 1);
        assert_eq!(blocks.len(), 4);
    }

    #[test]
    fn draw_text_applies_toggles_and_colors() {
        let mut term = Term::new(1, 40);
        draw_text(&mut term, "a\x02b\x01c\x03#ff0000d\x0fe", Video::NORMAL);

        assert_eq!(term.cell(0, 0).video, Video::NORMAL);
        assert!(term.cell(0, 1).video.flags.contains(VideoFlags::BOLD));
        assert!(!term.cell(0, 2).video.flags.contains(VideoFlags::BOLD));
        assert_eq!(term.cell(0, 3).video.fg, Color::new(255, 0, 0));
        assert_eq!(term.cell(0, 4).video, Video::NORMAL);
        assert_eq!(term.cell(0, 4).text, "e");
    }

    #[test]
    fn draw_text_keeps_base_background_for_default_bg() {
        let mut base = Video::NORMAL;
        base.bg = Color::new(60, 60, 60);

        let mut term = Term::new(1, 40);
        draw_text(&mut term, "\x03#ff0000,#010101x", base);
        assert_eq!(term.cell(0, 0).video.bg, Color::new(60, 60, 60));
        assert_eq!(term.cell(0, 0).video.fg, Color::new(255, 0, 0));
    }

    #[test]
    fn draw_text_palette_lookup_is_offset_by_one() {
        let mut term = Term::new(1, 40);
        draw_text(&mut term, "\x034x", Video::NORMAL);
        // palette index 4 lands on table entry 5
        assert_eq!(term.cell(0, 0).video.fg, Color::new(255, 0, 0));
    }

    #[test]
    fn nick_colors_are_deterministic_and_light() {
        let a = nick_color("alice");
        let b = nick_color("alice");
        assert_eq!(a, b);
        assert_ne!(nick_color("alice"), nick_color("bob"));
        // lightness >= 0.65 guarantees visibly bright components
        let max = a.r.max(a.g).max(a.b);
        assert!(max >= 128);
    }
}
