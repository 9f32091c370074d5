//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::PolicyConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::error::PolicyError;

/// Error type for configuration loading and module setup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// Relative policy file paths are resolved against the directory holding
/// the configuration file.
pub fn load_config(path: &Path) -> Result<PolicyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = parse_config(&content)?;

    if let Some(base) = path.parent() {
        resolve_paths(&mut config, base);
    }
    Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<PolicyConfig, ConfigError> {
    let config: PolicyConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn resolve_paths(config: &mut PolicyConfig, base: &Path) {
    let module = &mut config.module;
    for file in [
        &mut module.filename,
        &mut module.recv_filename,
        &mut module.acct_filename,
        &mut module.auth_filename,
        &mut module.send_filename,
    ]
    .into_iter()
    .flatten()
    {
        if file.is_relative() {
            *file = base.join(&*file);
        }
    }
}
