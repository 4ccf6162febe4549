//! Colors and brushes.
//!
//! [`Rgba`] is the only color representation the engine stores. Hosts render
//! [`Brush`] values, which are derived from a color plus the background effect
//! of a [`StyleRecord`](super::StyleRecord).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a color string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color '{input}': expected #RRGGBB or #RRGGBBAA")]
pub struct ColorParseError {
    input: String,
}

/// An 8-bit per channel color with alpha.
///
/// Serializes as a `#RRGGBB` hex string when fully opaque and `#RRGGBBAA`
/// otherwise.
///
/// # Example
///
/// ```rust
/// use stylesync::Rgba;
///
/// let red: Rgba = "#FF0000".parse().unwrap();
/// assert_eq!(red, Rgba::rgb(255, 0, 0));
/// assert_eq!(red.to_string(), "#FF0000");
/// assert!(!Rgba::rgb(250, 250, 250).is_dark());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    /// Creates an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Returns the same color with a different alpha channel.
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Perceived brightness on a 0-255 scale (ITU-R BT.601 weights).
    pub fn luminance(self) -> u8 {
        let weighted = 299 * self.r as u32 + 587 * self.g as u32 + 114 * self.b as u32;
        (weighted / 1000) as u8
    }

    /// Returns `true` when the color reads as dark.
    pub fn is_dark(self) -> bool {
        self.luminance() < 128
    }

    /// Inverts the HSL lightness of the color, keeping hue, saturation and alpha.
    ///
    /// This is a coarse brightness flip for moving a palette between light
    /// and dark themes, not a colorimetric transform.
    pub fn inverted_brightness(self) -> Self {
        let (h, s, l) = self.to_hsl();
        Self::from_hsl(h, s, 1.0 - l, self.a)
    }

    fn to_hsl(self) -> (f64, f64, f64) {
        let r = self.r as f64 / 255.0;
        let g = self.g as f64 / 255.0;
        let b = self.b as f64 / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;

        if max == min {
            return (0.0, 0.0, l);
        }

        let d = max - min;
        let s = if l > 0.5 {
            d / (2.0 - max - min)
        } else {
            d / (max + min)
        };
        let h = if max == r {
            (g - b) / d + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };
        (h / 6.0, s, l)
    }

    fn from_hsl(h: f64, s: f64, l: f64, a: u8) -> Self {
        if s == 0.0 {
            let v = channel(l);
            return Self::rgba(v, v, v, a);
        }

        let q = if l < 0.5 {
            l * (1.0 + s)
        } else {
            l + s - l * s
        };
        let p = 2.0 * l - q;
        Self::rgba(
            channel(hue_to_rgb(p, q, h + 1.0 / 3.0)),
            channel(hue_to_rgb(p, q, h)),
            channel(hue_to_rgb(p, q, h - 1.0 / 3.0)),
            a,
        )
    }
}

fn hue_to_rgb(p: f64, q: f64, t: f64) -> f64 {
    let t = if t < 0.0 {
        t + 1.0
    } else if t > 1.0 {
        t - 1.0
    } else {
        t
    };
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn channel(v: f64) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02X}", self.a)?;
        }
        Ok(())
    }
}

impl FromStr for Rgba {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ColorParseError {
            input: s.to_string(),
        };
        let hex = s.trim().strip_prefix('#').ok_or_else(err)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(err());
        }

        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        let alpha = if hex.len() == 8 { byte(6)? } else { 255 };
        Ok(Self::rgba(byte(0)?, byte(2)?, byte(4)?, alpha))
    }
}

impl TryFrom<String> for Rgba {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgba> for String {
    fn from(color: Rgba) -> Self {
        color.to_string()
    }
}

/// Direction of a linear background gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GradientDirection {
    ToTop,
    ToBottom,
    ToLeft,
    ToRight,
}

/// A paint value as the host renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Brush {
    Solid(Rgba),
    /// Gradient running from `from` to `to` along `direction`.
    LinearGradient {
        from: Rgba,
        to: Rgba,
        direction: GradientDirection,
    },
}

impl Brush {
    /// The dominant color of the brush.
    pub fn color(&self) -> Rgba {
        match self {
            Brush::Solid(color) => *color,
            Brush::LinearGradient { from, .. } => *from,
        }
    }
}

impl From<Rgba> for Brush {
    fn from(color: Rgba) -> Self {
        Brush::Solid(color)
    }
}
