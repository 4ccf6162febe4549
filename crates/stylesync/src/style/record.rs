//! The per-category override specification.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::color::{Brush, GradientDirection, Rgba};

/// How a background color is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BackgroundEffect {
    #[default]
    Solid,
    GradientToTop,
    GradientToBottom,
    GradientToLeft,
    GradientToRight,
}

impl BackgroundEffect {
    /// Gradient direction for the effect, `None` for a solid fill.
    pub fn direction(self) -> Option<GradientDirection> {
        match self {
            BackgroundEffect::Solid => None,
            BackgroundEffect::GradientToTop => Some(GradientDirection::ToTop),
            BackgroundEffect::GradientToBottom => Some(GradientDirection::ToBottom),
            BackgroundEffect::GradientToLeft => Some(GradientDirection::ToLeft),
            BackgroundEffect::GradientToRight => Some(GradientDirection::ToRight),
        }
    }

    /// Builds the brush painting `color` with this effect.
    ///
    /// Gradients fade from the color to its fully transparent variant.
    pub fn brush(self, color: Rgba) -> Brush {
        match self.direction() {
            None => Brush::Solid(color),
            Some(direction) => Brush::LinearGradient {
                from: color,
                to: color.with_alpha(0),
                direction,
            },
        }
    }
}

/// Dash pattern of a decoration line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LineStyle {
    #[default]
    Solid,
    Dot,
    Dash,
    DashDot,
    Squiggle,
}

/// The pen used to draw a text decoration line.
#[derive(Debug, Clone, PartialEq)]
pub struct LinePen {
    /// `None` draws with the text foreground.
    pub color: Option<Rgba>,
    pub thickness: f64,
    pub offset: f64,
    pub style: LineStyle,
}

/// Pen settings shared by underline, strikethrough and overline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineDecoration {
    pub color: Option<Rgba>,
    /// 0 and 255 mean "use the color's own alpha".
    pub opacity: u8,
    pub thickness: f64,
    pub offset: f64,
    pub style: LineStyle,
}

impl Default for LineDecoration {
    fn default() -> Self {
        Self {
            color: None,
            opacity: 0,
            thickness: 1.0,
            offset: 0.0,
            style: LineStyle::Solid,
        }
    }
}

impl LineDecoration {
    /// Resolves the decoration into the pen the host draws with.
    pub fn pen(&self) -> LinePen {
        LinePen {
            color: self.color.map(|c| match opacity_alpha(self.opacity) {
                Some(alpha) => c.with_alpha(alpha),
                None => c,
            }),
            thickness: self.thickness,
            offset: self.offset,
            style: self.style,
        }
    }
}

/// Returns the opacity byte when it carries an explicit channel.
///
/// 0 means unset and 255 means fully opaque; neither needs an override.
pub(crate) fn opacity_alpha(opacity: u8) -> Option<u8> {
    match opacity {
        0 | 255 => None,
        other => Some(other),
    }
}

bitflags! {
    /// Attribute groups used by [`StyleRecord::copy_from`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StyleFilter: u8 {
        /// Foreground/background colors, opacities and the background effect.
        const COLOR = 1 << 0;
        /// Font family and stretch.
        const FONT_FAMILY = 1 << 1;
        const FONT_SIZE = 1 << 2;
        /// Bold and italic.
        const FONT_STYLE = 1 << 3;
        /// Underline, strikethrough, overline and the line pen.
        const LINE_STYLE = 1 << 4;
    }
}

/// Override specification for one classification category.
///
/// Every attribute is optional: `None`, `0` and the enum defaults mean
/// "not specified, leave the host value alone". A record that specifies
/// nothing ([`is_set`](Self::is_set) returns `false`) has no effect when
/// applied.
///
/// # Example
///
/// ```rust
/// use stylesync::{Rgba, StyleRecord};
///
/// let keyword = StyleRecord::new()
///     .bold(true)
///     .foreground(Rgba::rgb(0x56, 0x9C, 0xD6));
/// assert!(keyword.is_set());
/// assert!(!StyleRecord::new().is_set());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleRecord {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strikethrough: Option<bool>,
    pub overline: Option<bool>,
    /// Added to the host's default font size. 0 means unset.
    pub font_size_delta: f64,
    pub foreground_color: Option<Rgba>,
    pub background_color: Option<Rgba>,
    /// 0 means unset, 255 fully opaque.
    pub foreground_opacity: u8,
    /// 0 means unset, 255 fully opaque.
    pub background_opacity: u8,
    pub background_effect: BackgroundEffect,
    pub line_decoration: Option<LineDecoration>,
    pub font_family: Option<String>,
    pub stretch: Option<u16>,
}

impl StyleRecord {
    /// Creates a record that specifies nothing.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = Some(bold);
        self
    }

    pub fn italic(mut self, italic: bool) -> Self {
        self.italic = Some(italic);
        self
    }

    pub fn underline(mut self, underline: bool) -> Self {
        self.underline = Some(underline);
        self
    }

    pub fn strikethrough(mut self, strikethrough: bool) -> Self {
        self.strikethrough = Some(strikethrough);
        self
    }

    pub fn overline(mut self, overline: bool) -> Self {
        self.overline = Some(overline);
        self
    }

    pub fn font_size_delta(mut self, delta: f64) -> Self {
        self.font_size_delta = delta;
        self
    }

    pub fn foreground(mut self, color: Rgba) -> Self {
        self.foreground_color = Some(color);
        self
    }

    pub fn background(mut self, color: Rgba) -> Self {
        self.background_color = Some(color);
        self
    }

    pub fn foreground_opacity(mut self, opacity: u8) -> Self {
        self.foreground_opacity = opacity;
        self
    }

    pub fn background_opacity(mut self, opacity: u8) -> Self {
        self.background_opacity = opacity;
        self
    }

    pub fn background_effect(mut self, effect: BackgroundEffect) -> Self {
        self.background_effect = effect;
        self
    }

    pub fn line_decoration(mut self, decoration: LineDecoration) -> Self {
        self.line_decoration = Some(decoration);
        self
    }

    pub fn font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = Some(family.into());
        self
    }

    pub fn stretch(mut self, stretch: u16) -> Self {
        self.stretch = Some(stretch);
        self
    }

    /// Returns `true` if at least one attribute carries a non-default value.
    pub fn is_set(&self) -> bool {
        self.bold.is_some()
            || self.italic.is_some()
            || self.has_line_flags()
            || self.font_size_delta != 0.0
            || self.foreground_color.is_some()
            || self.background_color.is_some()
            || self.foreground_opacity != 0
            || self.background_opacity != 0
            || self.background_effect != BackgroundEffect::Solid
            || self.line_decoration.is_some()
            || self.font_family.is_some()
            || self.stretch.is_some()
    }

    /// Returns `true` if any of underline, strikethrough or overline is specified.
    pub fn has_line_flags(&self) -> bool {
        self.underline.is_some() || self.strikethrough.is_some() || self.overline.is_some()
    }

    /// Returns `true` if the record overrides a color.
    pub fn has_colors(&self) -> bool {
        self.foreground_color.is_some() || self.background_color.is_some()
    }

    /// Returns `true` if the applied value depends on the host's default font.
    pub fn depends_on_default_font(&self) -> bool {
        self.font_size_delta != 0.0 || self.font_family.is_some() || self.stretch.is_some()
    }

    /// Copies the attribute groups selected by `filter` from `other`.
    ///
    /// Attributes outside the filter are left untouched.
    pub fn copy_from(&mut self, other: &StyleRecord, filter: StyleFilter) {
        if filter.contains(StyleFilter::COLOR) {
            self.foreground_color = other.foreground_color;
            self.background_color = other.background_color;
            self.foreground_opacity = other.foreground_opacity;
            self.background_opacity = other.background_opacity;
            self.background_effect = other.background_effect;
        }
        if filter.contains(StyleFilter::FONT_FAMILY) {
            self.font_family = other.font_family.clone();
            self.stretch = other.stretch;
        }
        if filter.contains(StyleFilter::FONT_SIZE) {
            self.font_size_delta = other.font_size_delta;
        }
        if filter.contains(StyleFilter::FONT_STYLE) {
            self.bold = other.bold;
            self.italic = other.italic;
        }
        if filter.contains(StyleFilter::LINE_STYLE) {
            self.underline = other.underline;
            self.strikethrough = other.strikethrough;
            self.overline = other.overline;
            self.line_decoration = other.line_decoration.clone();
        }
    }

    /// Returns a copy holding only the attribute groups selected by `filter`.
    pub fn filtered(&self, filter: StyleFilter) -> StyleRecord {
        let mut copy = StyleRecord::new();
        copy.copy_from(self, filter);
        copy
    }

    /// Clears every attribute.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Inverts the brightness of every stored color in place.
    pub fn invert_brightness(&mut self) {
        if let Some(c) = self.foreground_color.as_mut() {
            *c = c.inverted_brightness();
        }
        if let Some(c) = self.background_color.as_mut() {
            *c = c.inverted_brightness();
        }
        if let Some(c) = self
            .line_decoration
            .as_mut()
            .and_then(|line| line.color.as_mut())
        {
            *c = c.inverted_brightness();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record_is_unset() {
        assert!(!StyleRecord::new().is_set());
        assert!(!StyleRecord::default().has_line_flags());
    }

    #[test]
    fn test_each_attribute_sets_the_record() {
        let records = [
            StyleRecord::new().bold(false),
            StyleRecord::new().italic(true),
            StyleRecord::new().overline(false),
            StyleRecord::new().font_size_delta(-1.0),
            StyleRecord::new().foreground(Rgba::BLACK),
            StyleRecord::new().background_opacity(10),
            StyleRecord::new().background_effect(BackgroundEffect::GradientToLeft),
            StyleRecord::new().line_decoration(LineDecoration::default()),
            StyleRecord::new().font_family("Fira Code"),
            StyleRecord::new().stretch(5),
        ];
        for record in records {
            assert!(record.is_set(), "{record:?} should be set");
        }
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut record = StyleRecord::new().bold(true).foreground(Rgba::WHITE);
        record.reset();
        assert!(!record.is_set());
    }

    #[test]
    fn test_copy_from_respects_filter() {
        let source = StyleRecord::new()
            .bold(true)
            .foreground(Rgba::WHITE)
            .font_size_delta(2.0)
            .underline(true)
            .font_family("Iosevka");

        let colors = source.filtered(StyleFilter::COLOR);
        assert_eq!(colors.foreground_color, Some(Rgba::WHITE));
        assert_eq!(colors.bold, None);
        assert_eq!(colors.font_size_delta, 0.0);

        let mut target = StyleRecord::new().italic(true);
        target.copy_from(&source, StyleFilter::FONT_STYLE | StyleFilter::LINE_STYLE);
        assert_eq!(target.bold, Some(true));
        // Bold and italic travel together.
        assert_eq!(target.italic, None);
        assert_eq!(target.underline, Some(true));
        assert_eq!(target.font_family, None);
    }

    #[test]
    fn test_background_effect_brush() {
        let color = Rgba::rgb(10, 20, 30);
        assert_eq!(BackgroundEffect::Solid.brush(color), Brush::Solid(color));
        assert_eq!(
            BackgroundEffect::GradientToRight.brush(color),
            Brush::LinearGradient {
                from: color,
                to: color.with_alpha(0),
                direction: GradientDirection::ToRight,
            }
        );
    }

    #[test]
    fn test_line_pen_applies_explicit_opacity_only() {
        let mut line = LineDecoration {
            color: Some(Rgba::rgb(1, 2, 3)),
            opacity: 128,
            ..LineDecoration::default()
        };
        assert_eq!(line.pen().color, Some(Rgba::rgba(1, 2, 3, 128)));

        line.opacity = 255;
        assert_eq!(line.pen().color, Some(Rgba::rgb(1, 2, 3)));
    }

    #[test]
    fn test_invert_brightness_touches_all_colors() {
        let mut record = StyleRecord::new()
            .foreground(Rgba::BLACK)
            .background(Rgba::WHITE)
            .line_decoration(LineDecoration {
                color: Some(Rgba::BLACK),
                ..LineDecoration::default()
            });
        record.invert_brightness();
        assert_eq!(record.foreground_color, Some(Rgba::WHITE));
        assert_eq!(record.background_color, Some(Rgba::BLACK));
        assert_eq!(record.line_decoration.unwrap().color, Some(Rgba::WHITE));
    }

    #[test]
    fn test_record_yaml_round_trip_of_sparse_record() {
        let yaml = "bold: true\nforeground_color: '#FF0000'\n";
        let record: StyleRecord = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(record, StyleRecord::new().bold(true).foreground(Rgba::rgb(255, 0, 0)));
    }
}
