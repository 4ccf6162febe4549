//! Terminal swatches for style records.
//!
//! Settings surfaces refresh their previews when the engine reports format
//! changes. This module renders a [`StyleRecord`] as a [`console::Style`] so a
//! record can be previewed without a host editor.

use console::{Color, Style};

use super::color::Rgba;
use super::record::StyleRecord;

/// Converts a color to the nearest ANSI 256-color palette index.
///
/// # Example
///
/// ```rust
/// use stylesync::{rgb_to_ansi256, Rgba};
///
/// assert_eq!(rgb_to_ansi256(Rgba::rgb(255, 0, 0)), 196);
/// assert_eq!(rgb_to_ansi256(Rgba::rgb(0, 255, 0)), 46);
/// ```
pub fn rgb_to_ansi256(color: Rgba) -> u8 {
    let Rgba { r, g, b, .. } = color;
    if r == g && g == b {
        if r < 8 {
            16
        } else if r > 248 {
            231
        } else {
            232 + ((r as u16 - 8) * 24 / 247) as u8
        }
    } else {
        let red = (r as u16 * 5 / 255) as u8;
        let green = (g as u16 * 5 / 255) as u8;
        let blue = (b as u16 * 5 / 255) as u8;
        16 + 36 * red + 6 * green + blue
    }
}

impl StyleRecord {
    /// Builds the closest terminal style for this record.
    ///
    /// Only attributes a terminal can show are carried over: colors, bold,
    /// italic, underline and strikethrough. Fonts, sizes and overlines are
    /// dropped.
    pub fn console_style(&self) -> Style {
        let mut style = Style::new();
        if let Some(fg) = self.foreground_color {
            style = style.fg(Color::Color256(rgb_to_ansi256(fg)));
        }
        if let Some(bg) = self.background_color {
            style = style.bg(Color::Color256(rgb_to_ansi256(bg)));
        }
        if self.bold == Some(true) {
            style = style.bold();
        }
        if self.italic == Some(true) {
            style = style.italic();
        }
        if self.underline == Some(true) {
            style = style.underlined();
        }
        if self.strikethrough == Some(true) {
            style = style.strikethrough();
        }
        style
    }

    /// Renders `text` with [`console_style`](Self::console_style).
    ///
    /// Color output follows the terminal detection of the `console` crate.
    pub fn preview(&self, text: &str) -> String {
        self.console_style().apply_to(text).to_string()
    }
}
