//! Configuration models and layered config loading.
//!
//! Owns the `callboard.json5` schema, validation, and the layer-merging
//! logic used by the dashboard binary.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Layered config types and loader options.
pub use loader::{ConfigLayer, ConfigLayerSource, LayeredConfig, LayeredConfigOptions};
/// Configuration schema models.
pub use model::*;
