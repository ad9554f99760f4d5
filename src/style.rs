//! Colors and styles (spec §3, "Style"), and the field-wise merge theme
//! lookup relies on.
//!
//! The original (`examples/original_source/src/highlighter.cpp`) represents
//! this as a Qt `QTextCharFormat` merged property-by-property
//! (`Theme::mergeFormat`); here it's plain data so it can be handed back to
//! a caller with no GUI toolkit in the loop.

/// An RGBA color, parsed from a `#RRGGBB` or `#RRGGBBAA` theme string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn parse(text: &str) -> Option<Color> {
        let hex = text.strip_prefix('#')?;
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Color {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: 255,
            }),
            8 => Some(Color {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => None,
        }
    }
}

/// A style as assembled from one or more theme rules. Every field is
/// independently optional, `None` meaning "inherit from whatever this style
/// is merged onto" rather than "off".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Style {
    pub foreground: Option<Color>,
    pub background: Option<Color>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub caret: Option<Color>,
}

impl Style {
    /// Merges `overlay` onto `self`: fields `overlay` sets win, fields it
    /// leaves unset fall back to `self`. Ported from `Theme::mergeFormat`.
    pub fn merge(&self, overlay: &Style) -> Style {
        Style {
            foreground: overlay.foreground.or(self.foreground),
            background: overlay.background.or(self.background),
            bold: overlay.bold.or(self.bold),
            italic: overlay.italic.or(self.italic),
            underline: overlay.underline.or(self.underline),
            caret: overlay.caret.or(self.caret),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rgb() {
        let c = Color::parse("#ff0080").unwrap();
        assert_eq!(c, Color { r: 0xff, g: 0x00, b: 0x80, a: 255 });
    }

    #[test]
    fn parses_rgba() {
        let c = Color::parse("#ff008040").unwrap();
        assert_eq!(c, Color { r: 0xff, g: 0x00, b: 0x80, a: 0x40 });
    }

    #[test]
    fn rejects_malformed_colors() {
        assert_eq!(Color::parse("ff0080"), None);
        assert_eq!(Color::parse("#ff00"), None);
        assert_eq!(Color::parse("#gggggg"), None);
    }

    #[test]
    fn merge_lets_overlay_fields_win() {
        let base = Style {
            foreground: Color::parse("#000000"),
            bold: Some(false),
            ..Default::default()
        };
        let overlay = Style {
            bold: Some(true),
            italic: Some(true),
            ..Default::default()
        };
        let merged = base.merge(&overlay);
        assert_eq!(merged.foreground, base.foreground);
        assert_eq!(merged.bold, Some(true));
        assert_eq!(merged.italic, Some(true));
    }
}
