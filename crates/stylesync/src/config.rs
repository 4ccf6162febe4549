//! Engine configuration.
//!
//! Every field has a default, so partial documents are valid:
//!
//! ```yaml
//! auto_invert_colors: false
//! invert_threshold: 5
//! ```

use serde::{Deserialize, Serialize};

/// Default brightness-incompatibility margin above which colors are inverted.
pub const DEFAULT_INVERT_THRESHOLD: i32 = 3;

/// Default bound on flush rounds after an outermost operation.
pub const DEFAULT_MAX_FLUSH_ROUNDS: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Feature switches and tuning for an [`EngineContext`](crate::EngineContext).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// When `false`, no style is applied and existing overrides are reverted.
    pub enabled: bool,
    /// Run the brightness compatibility check whenever a view background changes.
    pub auto_invert_colors: bool,
    /// Colors are inverted when the incompatibility score exceeds this value.
    pub invert_threshold: i32,
    /// Upper bound on pending-event flush rounds per outermost operation.
    pub max_flush_rounds: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_invert_colors: true,
            invert_threshold: DEFAULT_INVERT_THRESHOLD,
            max_flush_rounds: DEFAULT_MAX_FLUSH_ROUNDS,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }
}
