//! Style records and the style database.
//!
//! - [`Rgba`], [`Brush`]: colors and the paints derived from them
//! - [`StyleRecord`]: the override specification for one category
//! - [`StyleSet`]: a registry of records keyed by category name
//! - [`StyleFilter`]: attribute groups for filtered copies
//!
//! Records are plain values. They only take effect when a
//! [`Highlighter`](crate::Highlighter) applies them through a
//! [`ChangeTrace`](crate::ChangeTrace).

mod color;
mod preview;
mod record;
mod set;

pub use color::{Brush, ColorParseError, GradientDirection, Rgba};
pub use preview::rgb_to_ansi256;
pub(crate) use record::opacity_alpha;
pub use record::{BackgroundEffect, LineDecoration, LinePen, LineStyle, StyleFilter, StyleRecord};
pub use set::StyleSet;
