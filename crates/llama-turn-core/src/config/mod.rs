//! Configuration for the turn client
//!
//! YAML files are parsed into [`LlamaTurnConfig`], environment overrides are
//! applied, and the result is validated before use.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use crate::errors::TurnError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<LlamaTurnConfig, TurnError> {
    ConfigLoader::from_file(path).await
}
