//! UTF-8 text metrics.
//!
//! Pure functions over byte slices: decoding, display-column width,
//! fitting a prefix into a column budget, and stepping one display unit
//! at a time. Message bodies arrive from the IRC wire and may carry
//! malformed bytes as well as inline mIRC style escapes; both are
//! handled here so that every layer above measures text identically.

use unicode_width::UnicodeWidthChar;

/// The mIRC color escape introducer.
pub const COLOR_ESCAPE: u8 = 0x03;

/// One parsed color parameter of a style escape.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ColorParam {
    /// `#RRGGBB` 24-bit form.
    Rgb(u8, u8, u8),
    /// One- or two-digit palette index.
    Palette(u8),
}

/// Decode one UTF-8 scalar value from the front of `bytes`.
///
/// Returns the character and its encoded length, or `None` on a
/// truncated or malformed sequence (bare continuation bytes, invalid
/// leading bytes, surrogate/out-of-range values).
pub fn decode(bytes: &[u8]) -> Option<(char, usize)> {
    let b0 = *bytes.first()?;

    if b0 < 0x80 {
        return Some((b0 as char, 1));
    }

    let (len, init) = match b0 {
        0xc0..=0xdf => (2, (b0 & 0x1f) as u32),
        0xe0..=0xef => (3, (b0 & 0x0f) as u32),
        0xf0..=0xf7 => (4, (b0 & 0x07) as u32),
        _ => return None, // continuation byte or invalid leader
    };

    if bytes.len() < len {
        return None;
    }

    let mut cp = init;
    for &b in &bytes[1..len] {
        if b & 0xc0 != 0x80 {
            return None;
        }
        cp = (cp << 6) | (b & 0x3f) as u32;
    }

    char::from_u32(cp).map(|ch| (ch, len))
}

/// Display width of a single character.
///
/// `None` for non-printables (C0/C1 controls, DEL), `Some(0)` for
/// combining marks, otherwise 1 or 2 columns.
pub fn char_width(ch: char) -> Option<usize> {
    if is_control(ch) {
        return None;
    }
    ch.width()
}

/// C0 or C1 control character.
fn is_control(ch: char) -> bool {
    let cp = ch as u32;
    cp < 0x20 || (0x80..0xa0).contains(&cp)
}

fn hex_byte(s: &[u8]) -> Option<u8> {
    let hi = (s[0] as char).to_digit(16)?;
    let lo = (s[1] as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

/// Parse one color parameter (`#RRGGBB` or up to two palette digits).
///
/// Returns the parameter (if any) and the number of bytes consumed.
/// A `#` not followed by six hex digits consumes only itself.
pub fn color_param(s: &[u8]) -> (Option<ColorParam>, usize) {
    match s.first() {
        Some(&b'#') => {
            if s.len() >= 7 {
                if let (Some(r), Some(g), Some(b)) =
                    (hex_byte(&s[1..]), hex_byte(&s[3..]), hex_byte(&s[5..]))
                {
                    return (Some(ColorParam::Rgb(r, g, b)), 7);
                }
            }
            (None, 1)
        }
        Some(&d0) if d0.is_ascii_digit() => {
            let mut idx = (d0 - b'0') as usize;
            let mut n = 1;
            if let Some(&d1) = s.get(1) {
                if d1.is_ascii_digit() {
                    idx = idx * 10 + (d1 - b'0') as usize;
                    n = 2;
                }
            }
            (Some(ColorParam::Palette(idx as u8)), n)
        }
        _ => (None, 0),
    }
}

/// Total length of a style escape starting at `s[0] == COLOR_ESCAPE`,
/// including the introducer and an optional `,`-separated background
/// parameter. The comma is consumed only when a parameter follows it.
pub fn style_escape_len(s: &[u8]) -> usize {
    debug_assert_eq!(s.first(), Some(&COLOR_ESCAPE));

    let mut n = 1;
    let (_, flen) = color_param(&s[n..]);
    n += flen;

    if s.get(n) == Some(&b',') {
        let (bg, blen) = color_param(&s[n + 1..]);
        if bg.is_some() {
            n += 1 + blen;
        }
    }

    n
}

/// Byte count of the longest prefix of `bytes` that fits within
/// `budget` display columns.
///
/// Style escapes are always fully consumed at zero width, even with no
/// budget left; other control bytes and malformed bytes are skipped at
/// zero width, one byte at a time for the malformed case. The returned
/// prefix is maximal: the next display unit would exceed the budget.
pub fn fit(bytes: &[u8], budget: usize) -> usize {
    let mut n = 0;
    let mut cols = budget;

    while n < bytes.len() {
        let rest = &bytes[n..];

        if rest[0] == COLOR_ESCAPE {
            n += style_escape_len(rest);
            continue;
        }

        let Some((ch, len)) = decode(rest) else {
            n += 1;
            continue;
        };

        let Some(w) = char_width(ch) else {
            n += len;
            continue;
        };

        if w > cols {
            break;
        }

        cols -= w;
        n += len;
    }

    n
}

/// Total display columns of `bytes`, with the same skipping rules as
/// [`fit`].
pub fn width(bytes: &[u8]) -> usize {
    let mut n = 0;
    let mut cols = 0;

    while n < bytes.len() {
        let rest = &bytes[n..];

        if rest[0] == COLOR_ESCAPE {
            n += style_escape_len(rest);
            continue;
        }

        let Some((ch, len)) = decode(rest) else {
            n += 1;
            continue;
        };

        if let Some(w) = char_width(ch) {
            cols += w;
        }
        n += len;
    }

    cols
}

/// Byte length and column width of exactly one display unit at the
/// front of `bytes`: a base character plus any trailing zero-width
/// marks, stopping before a second spacing character begins.
///
/// Returns `(0, 0)` when the first byte is a control or malformed byte;
/// callers skip one byte and retry.
pub fn next(bytes: &[u8]) -> (usize, usize) {
    let mut n = 0;
    let mut w = 0;

    while n < bytes.len() {
        let Some((ch, len)) = decode(&bytes[n..]) else {
            break;
        };
        let Some(cw) = char_width(ch) else {
            break;
        };
        if w > 0 && cw > 0 {
            break;
        }
        w += cw;
        n += len;
    }

    (n, w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ascii_and_multibyte() {
        assert_eq!(decode(b"a"), Some(('a', 1)));
        assert_eq!(decode("é".as_bytes()), Some(('é', 2)));
        assert_eq!(decode("あ".as_bytes()), Some(('あ', 3)));
        assert_eq!(decode("🦀".as_bytes()), Some(('🦀', 4)));
    }

    #[test]
    fn decode_rejects_malformed() {
        // bare continuation byte
        assert_eq!(decode(&[0x80]), None);
        // truncated 3-byte sequence
        assert_eq!(decode(&[0xe3, 0x81]), None);
        // invalid leader
        assert_eq!(decode(&[0xff, 0x20]), None);
        // non-continuation where continuation expected
        assert_eq!(decode(&[0xc3, 0x41]), None);
        assert_eq!(decode(&[]), None);
    }

    #[test]
    fn widths() {
        assert_eq!(char_width('a'), Some(1));
        assert_eq!(char_width('あ'), Some(2));
        assert_eq!(char_width('\u{0301}'), Some(0)); // combining acute
        assert_eq!(char_width('\x07'), None);
        assert_eq!(char_width('\u{009b}'), None); // C1
        assert_eq!(width(b"hello"), 5);
        assert_eq!(width("あい".as_bytes()), 4);
    }

    #[test]
    fn width_skips_controls_and_garbage() {
        assert_eq!(width(b"a\x07b"), 2);
        assert_eq!(width(&[b'a', 0xff, 0xfe, b'b']), 2);
    }

    #[test]
    fn width_is_additive_at_unit_boundaries() {
        let s = "aあb\u{0301}cdé".as_bytes();
        let mut k = 0;
        while k < s.len() {
            let (n, _) = next(&s[k..]);
            let n = n.max(1);
            assert_eq!(width(s), width(&s[..k]) + width(&s[k..]));
            k += n;
        }
    }

    #[test]
    fn fit_respects_budget_and_is_maximal() {
        let s = b"hello world";
        for cols in 0..=s.len() + 2 {
            let n = fit(s, cols);
            assert!(width(&s[..n]) <= cols);
            if n < s.len() {
                let (unit, uw) = next(&s[n..]);
                assert!(unit == 0 || width(&s[..n]) + uw > cols);
            }
        }
    }

    #[test]
    fn fit_consumes_style_escapes_for_free() {
        // 0x03 + "#ff0000,#010101" is 16 bytes and zero columns
        let s = b"\x03#ff0000,#010101hi";
        assert_eq!(width(s), 2);
        assert_eq!(fit(s, 0), 16);
        assert_eq!(fit(s, 2), s.len());

        // palette form: two digits, comma, two digits
        let s = b"\x0304,01x";
        assert_eq!(width(s), 1);
        assert_eq!(fit(s, 0), 6);
    }

    #[test]
    fn fit_excludes_wide_char_when_one_column_remains() {
        let s = "aあ".as_bytes();
        assert_eq!(fit(s, 2), 1); // 'a' fits, 'あ' needs 2 more
        assert_eq!(fit(s, 3), s.len());
    }

    #[test]
    fn style_escape_lengths() {
        assert_eq!(style_escape_len(b"\x03#aabbcc,#001122x"), 16);
        assert_eq!(style_escape_len(b"\x03#aabbccx"), 8);
        assert_eq!(style_escape_len(b"\x034x"), 2);
        assert_eq!(style_escape_len(b"\x0312,4x"), 5);
        // bare escape, and a comma with nothing behind it
        assert_eq!(style_escape_len(b"\x03x"), 1);
        assert_eq!(style_escape_len(b"\x034,x"), 2);
    }

    #[test]
    fn next_bundles_combining_marks() {
        let s = "e\u{0301}f".as_bytes();
        let (n, w) = next(s);
        assert_eq!(n, 3); // 'e' + 2-byte combining mark
        assert_eq!(w, 1);
        let (n2, w2) = next(&s[n..]);
        assert_eq!((n2, w2), (1, 1));
    }

    #[test]
    fn next_stops_at_controls_and_garbage() {
        assert_eq!(next(b"\x03foo"), (0, 0));
        assert_eq!(next(&[0xff]), (0, 0));
        assert_eq!(next("あx".as_bytes()), (3, 2));
    }
}
