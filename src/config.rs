//! Configuration file loading

use cc3000_transport::TransportConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default backend when neither the command line nor the file names one
pub const DEFAULT_BACKEND: &str = "dummy";

/// Errors from loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML or has unknown keys
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Contents of a configuration file
///
/// ```toml
/// backend = "linux:spidev=/dev/spidev0.0,cs=8,irq=25,en=24"
///
/// [transport]
/// bus_exclusive = true
/// rx_settle_us = 100000
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Backend string used when `--backend` is not given
    pub backend: Option<String>,
    /// Transport timings and bus ownership
    pub transport: TransportConfig,
}

impl FileConfig {
    /// Load a configuration file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let config = Self::from_toml_file(path)?;
                log::debug!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Pick the backend string: command line first, then file, then default
    pub fn backend<'a>(&'a self, cli: Option<&'a str>) -> &'a str {
        cli.or(self.backend.as_deref()).unwrap_or(DEFAULT_BACKEND)
    }
}
