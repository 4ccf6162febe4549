//! Brightness compatibility between stored styles and a view background.
//!
//! A coarse majority vote, not a colorimetric transform. Each stored color
//! votes on whether the style set was authored for the other polarity:
//!
//! - a foreground with the same polarity as the background is unreadable
//!   and votes incompatible, otherwise compatible
//! - a background fill with the opposite polarity to the view background
//!   votes incompatible, otherwise compatible
//!
//! Colors are inverted when `incompatible - compatible` exceeds the
//! configured threshold.

use super::mode::ColorMode;
use crate::style::StyleSet;

/// Vote tally for one style set against one background polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Compatibility {
    pub compatible: usize,
    pub incompatible: usize,
}

impl Compatibility {
    pub fn score(&self) -> i32 {
        let incompatible = i32::try_from(self.incompatible).unwrap_or(i32::MAX);
        let compatible = i32::try_from(self.compatible).unwrap_or(i32::MAX);
        incompatible.saturating_sub(compatible)
    }

    /// Returns `true` when the score exceeds `threshold`.
    pub fn should_invert(&self, threshold: i32) -> bool {
        self.score() > threshold
    }
}

/// Counts the votes of every record's foreground and background color.
pub fn assess(styles: &StyleSet, background: ColorMode) -> Compatibility {
    let mut tally = Compatibility::default();
    for (_, record) in styles.iter() {
        if let Some(fg) = record.foreground_color {
            if ColorMode::of(fg) == background {
                tally.incompatible += 1;
            } else {
                tally.compatible += 1;
            }
        }
        if let Some(bg) = record.background_color {
            if ColorMode::of(bg) == background.opposite() {
                tally.incompatible += 1;
            } else {
                tally.compatible += 1;
            }
        }
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{Rgba, StyleRecord};

    fn light_theme_styles(count: usize) -> StyleSet {
        (0..count).fold(StyleSet::new(), |set, i| {
            set.add(
                &format!("style{i}"),
                StyleRecord::new().foreground(Rgba::rgb(0x20, 0x20, 0x60)),
            )
        })
    }

    #[test]
    fn test_dark_text_on_dark_background_is_incompatible() {
        let tally = assess(&light_theme_styles(5), ColorMode::Dark);
        assert_eq!(tally.incompatible, 5);
        assert_eq!(tally.score(), 5);
        assert!(tally.should_invert(3));
    }

    #[test]
    fn test_matching_theme_is_compatible() {
        let tally = assess(&light_theme_styles(5), ColorMode::Light);
        assert_eq!(tally.compatible, 5);
        assert!(!tally.should_invert(3));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let tally = assess(&light_theme_styles(3), ColorMode::Dark);
        assert_eq!(tally.score(), 3);
        assert!(!tally.should_invert(3));
    }

    #[test]
    fn test_background_fills_vote() {
        let styles = StyleSet::new()
            .add("hl", StyleRecord::new().background(Rgba::rgb(0xFF, 0xFF, 0xE0)))
            .add("sel", StyleRecord::new().background(Rgba::rgb(0x26, 0x4F, 0x78)));

        let tally = assess(&styles, ColorMode::Dark);
        assert_eq!(tally, Compatibility { compatible: 1, incompatible: 1 });
    }
}
