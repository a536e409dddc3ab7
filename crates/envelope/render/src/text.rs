//! Text preparation for the base-14 Helvetica font.
//!
//! Standard fonts only cover WinAnsi, so every string drawn on a page goes
//! through [`sanitize`] first. Widths come from the Helvetica AFM metrics and
//! are used to shrink text until it fits its box.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Replacement for characters the font cannot draw.
pub const REPLACEMENT: char = '?';

/// Reduce `input` to printable ASCII.
///
/// Accented letters lose their marks (`é` → `e`), typographic punctuation
/// maps to its ASCII form and anything else becomes [`REPLACEMENT`].
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        match c {
            ' '..='~' => out.push(c),
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => out.push('"'),
            '\u{2010}'..='\u{2015}' | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' | '\u{2002}'..='\u{200A}' | '\t' => out.push(' '),
            '\u{00DF}' => out.push_str("ss"),
            '\u{00C6}' => out.push_str("AE"),
            '\u{00E6}' => out.push_str("ae"),
            '\u{00D8}' => out.push('O'),
            '\u{00F8}' => out.push('o'),
            '\u{0141}' => out.push('L'),
            '\u{0142}' => out.push('l'),
            c if c.is_control() => {}
            '\u{200B}'..='\u{200D}' | '\u{FEFF}' => {}
            _ => out.push(REPLACEMENT),
        }
    }
    out
}

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

fn char_width(c: char) -> u16 {
    let code = c as u32;
    if (32..=126).contains(&code) {
        HELVETICA_WIDTHS[(code - 32) as usize]
    } else {
        HELVETICA_WIDTHS[(REPLACEMENT as u32 - 32) as usize]
    }
}

/// Width of `text` set at `font_size` points.
pub fn text_width(text: &str, font_size: f64) -> f64 {
    let units: u32 = text.chars().map(|c| char_width(c) as u32).sum();
    units as f64 * font_size / 1000.0
}

/// Largest size not above `preferred` at which `text` fits `max_width`.
pub fn fit_font_size(text: &str, preferred: f64, max_width: f64) -> f64 {
    let at_one = text_width(text, 1.0);
    if at_one <= 0.0 || max_width <= 0.0 {
        return preferred;
    }
    preferred.min(max_width / at_one)
}

/// Cut `text` so it fits `max_width`, marking the cut with `...`.
pub fn truncate_to_width(text: &str, font_size: f64, max_width: f64) -> String {
    if text_width(text, font_size) <= max_width {
        return text.to_string();
    }
    let ellipsis = text_width("...", font_size);
    let mut out = String::new();
    let mut width = 0.0;
    for c in text.chars() {
        let w = char_width(c) as f64 * font_size / 1000.0;
        if width + w + ellipsis > max_width {
            break;
        }
        width += w;
        out.push(c);
    }
    out.push_str("...");
    out
}
