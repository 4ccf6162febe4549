//! Live text formatting properties as the host stores them.
//!
//! Both host format maps hold a [`TextProperties`] per key. Each dimension is
//! an `Option`: `None` means the key does not carry that property and the
//! host falls back to whatever lies underneath.

use crate::style::{Brush, LinePen};

/// Font family plus optional stretch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Typeface {
    pub family: String,
    pub stretch: Option<u16>,
}

impl Typeface {
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            stretch: None,
        }
    }

    pub fn with_stretch(mut self, stretch: u16) -> Self {
        self.stretch = Some(stretch);
        self
    }
}

/// Where a decoration line is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecorationLocation {
    Underline,
    Strikethrough,
    OverLine,
}

/// One decoration line. A `None` pen uses the host's default pen.
#[derive(Debug, Clone, PartialEq)]
pub struct TextDecoration {
    pub location: DecorationLocation,
    pub pen: Option<LinePen>,
}

impl TextDecoration {
    pub fn new(location: DecorationLocation) -> Self {
        Self {
            location,
            pen: None,
        }
    }
}

/// Sparse formatting properties for one format-map key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextProperties {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub foreground: Option<Brush>,
    pub background: Option<Brush>,
    /// 0.0 to 1.0.
    pub foreground_opacity: Option<f64>,
    /// 0.0 to 1.0.
    pub background_opacity: Option<f64>,
    pub font_size: Option<f64>,
    pub typeface: Option<Typeface>,
    pub decorations: Option<Vec<TextDecoration>>,
}

impl TextProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = Some(bold);
        self
    }

    pub fn with_italic(mut self, italic: bool) -> Self {
        self.italic = Some(italic);
        self
    }

    pub fn with_foreground(mut self, brush: impl Into<Brush>) -> Self {
        self.foreground = Some(brush.into());
        self
    }

    pub fn with_background(mut self, brush: impl Into<Brush>) -> Self {
        self.background = Some(brush.into());
        self
    }

    pub fn with_font_size(mut self, size: f64) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn with_typeface(mut self, typeface: Typeface) -> Self {
        self.typeface = Some(typeface);
        self
    }

    pub fn with_decorations(mut self, decorations: Vec<TextDecoration>) -> Self {
        self.decorations = Some(decorations);
        self
    }

    /// Returns `true` if no dimension carries a value.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Layers `overrides` on top of `base`: every `Some` in `overrides` wins.
    pub fn merge(base: &TextProperties, overrides: &TextProperties) -> TextProperties {
        fn pick<T: Clone>(base: &Option<T>, over: &Option<T>) -> Option<T> {
            over.as_ref().or(base.as_ref()).cloned()
        }

        TextProperties {
            bold: pick(&base.bold, &overrides.bold),
            italic: pick(&base.italic, &overrides.italic),
            foreground: pick(&base.foreground, &overrides.foreground),
            background: pick(&base.background, &overrides.background),
            foreground_opacity: pick(&base.foreground_opacity, &overrides.foreground_opacity),
            background_opacity: pick(&base.background_opacity, &overrides.background_opacity),
            font_size: pick(&base.font_size, &overrides.font_size),
            typeface: pick(&base.typeface, &overrides.typeface),
            decorations: pick(&base.decorations, &overrides.decorations),
        }
    }
}
