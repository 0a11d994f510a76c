pub mod document;

pub use document::{parse_config, ConfigurationError};

use std::path::Path;
use thiserror::Error;

use crate::registry::HostRegistry;

/// Errors for file I/O operations (separate from pure parsing errors)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigurationError),
}

/// Load and parse a configuration file from disk.
/// This is the I/O boundary - it reads the file and delegates to pure
/// parsing functions. Used for the optional startup configuration; the
/// POST /faas upload path calls [`parse_config`] directly.
pub fn load_config_file(path: &Path) -> Result<HostRegistry, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let registry = parse_config(&content)?;
    Ok(registry)
}
