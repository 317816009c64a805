//! Configuration and API descriptor loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::api::descriptor::ApiDescriptor;
use crate::api::model::ApiConfig;
use crate::config::schema::EnforcerConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::error::InitError;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<EnforcerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<EnforcerConfig, ConfigError> {
    let config: EnforcerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Outcome of compiling one descriptor file.
#[derive(Debug)]
pub struct DescriptorLoad {
    pub path: PathBuf,
    pub result: Result<ApiConfig, InitError>,
}

/// Parse and compile every `*.toml` file in `dir`, in file name order.
///
/// Only a missing or unreadable directory is an error; a broken descriptor
/// is reported in its own entry so the others can still be published.
pub fn load_descriptors(dir: &Path) -> Result<Vec<DescriptorLoad>, ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if is_descriptor(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths
        .into_iter()
        .map(|path| {
            let result = ApiDescriptor::from_file(&path).and_then(|d| d.compile(dir));
            DescriptorLoad { path, result }
        })
        .collect())
}

pub fn is_descriptor(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "toml")
}
