//! Engine configuration for bayesnet.
//!
//! This crate provides:
//! - Typed structs for `engine.json`
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation

pub mod engine;
pub mod resolve;
pub mod validate;

use std::path::{Path, PathBuf};

pub use engine::{DataConfig, EngineConfig, InferenceConfig, LearningConfig};
pub use resolve::{resolve_config, ConfigSource};
pub use validate::{validate_engine, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// A validated configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: EngineConfig,
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Resolve, parse and validate the engine configuration.
///
/// An explicit path that does not exist is an error; every other missing
/// location falls through to the next one and finally to the defaults.
pub fn load_config(cli_path: Option<&Path>) -> ValidationResult<LoadedConfig> {
    if let Some(path) = cli_path {
        if !path.exists() {
            return Err(ValidationError::IoError(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
    }

    let (path, source) = resolve_config(cli_path);
    let config = match &path {
        Some(p) => EngineConfig::from_file(p)?,
        None => EngineConfig::default(),
    };
    validate_engine(&config)?;

    Ok(LoadedConfig {
        config,
        path,
        source,
    })
}
