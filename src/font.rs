//! Metrics for the standard Helvetica faces. Only base-14 fonts are used, so
//! no font program is embedded and widths come from the Adobe AFM tables.

use crate::types::Pt;

/// Line height as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.15;

// Width used for characters outside the tables.
const FALLBACK_WIDTH: u16 = 556;

// Glyph widths in 1/1000 em for U+0020..=U+007E.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0'..'?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P'..'_'
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`'..'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p'..'~'
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontStyle {
    Normal,
    Bold,
    Italic,
}

impl FontStyle {
    pub const ALL: [FontStyle; 3] = [FontStyle::Normal, FontStyle::Bold, FontStyle::Italic];

    pub fn base_font(self) -> &'static str {
        match self {
            FontStyle::Normal => "Helvetica",
            FontStyle::Bold => "Helvetica-Bold",
            FontStyle::Italic => "Helvetica-Oblique",
        }
    }

    fn glyph_width(self, ch: char) -> u16 {
        let table = match self {
            FontStyle::Bold => &HELVETICA_BOLD_WIDTHS,
            // Oblique shares the upright metrics.
            FontStyle::Normal | FontStyle::Italic => &HELVETICA_WIDTHS,
        };
        let code = ch as u32;
        if (0x20..=0x7E).contains(&code) {
            table[(code - 0x20) as usize]
        } else if ch == '\u{A0}' {
            table[0]
        } else {
            FALLBACK_WIDTH
        }
    }
}

pub fn text_width(style: FontStyle, font_size: Pt, text: &str) -> Pt {
    let units: u32 = text.chars().map(|ch| style.glyph_width(ch) as u32).sum();
    font_size * (units as f32 / 1000.0)
}

/// Height of one rendered line of text at `font_size`.
pub fn text_height(font_size: Pt) -> Pt {
    font_size * LINE_HEIGHT_FACTOR
}

/// Greedy word wrap. Explicit newlines always break; words wider than
/// `max_width` are split between characters.
pub fn split_text_to_size(text: &str, max_width: Pt, style: FontStyle, font_size: Pt) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split(' ').filter(|w| !w.is_empty()) {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if text_width(style, font_size, &candidate) <= max_width {
                line = candidate;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if text_width(style, font_size, word) <= max_width {
                line = word.to_string();
            } else {
                let mut pieces = split_word(word, max_width, style, font_size);
                if let Some(last) = pieces.pop() {
                    lines.extend(pieces);
                    line = last;
                }
            }
        }
        lines.push(line);
    }
    lines
}

fn split_word(word: &str, max_width: Pt, style: FontStyle, font_size: Pt) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for ch in word.chars() {
        piece.push(ch);
        if piece.chars().count() > 1 && text_width(style, font_size, &piece) > max_width {
            piece.pop();
            pieces.push(std::mem::take(&mut piece));
            piece.push(ch);
        }
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_follow_afm_tables() {
        let size = Pt::from_f32(10.0);
        assert_eq!(text_width(FontStyle::Normal, size, "2024").to_milli_i64(), 22_240);
        assert_eq!(text_width(FontStyle::Normal, size, "i").to_milli_i64(), 2_220);
        assert_eq!(text_width(FontStyle::Bold, size, "i").to_milli_i64(), 2_780);
        assert_eq!(
            text_width(FontStyle::Italic, size, "Hello"),
            text_width(FontStyle::Normal, size, "Hello")
        );
    }

    #[test]
    fn text_height_uses_line_height_factor() {
        assert_eq!(text_height(Pt::from_f32(20.0)).to_milli_i64(), 23_000);
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let size = Pt::from_f32(10.0);
        let max = text_width(FontStyle::Normal, size, "Daft Punk, The");
        let lines = split_text_to_size("Daft Punk, The Weeknd", max, FontStyle::Normal, size);
        assert_eq!(lines, vec!["Daft Punk, The", "Weeknd"]);
        for line in &lines {
            assert!(text_width(FontStyle::Normal, size, line) <= max);
        }
    }

    #[test]
    fn splits_overlong_words() {
        let size = Pt::from_f32(10.0);
        let max = text_width(FontStyle::Normal, size, "0000");
        let lines = split_text_to_size("0123456789", max, FontStyle::Normal, size);
        assert_eq!(lines, vec!["0123", "4567", "89"]);
    }

    #[test]
    fn empty_text_yields_single_empty_line() {
        let lines = split_text_to_size("", Pt::from_f32(50.0), FontStyle::Bold, Pt::from_f32(10.0));
        assert_eq!(lines, vec![String::new()]);
    }
}
