//! Theme polarity detection and brightness compatibility.

mod compat;
mod mode;

pub use compat::{assess, Compatibility};
pub use mode::{detect_color_mode, reset_theme_detector, set_theme_detector, ColorMode};
