//! Resolver configuration
//!
//! Layered like [`crate::logging::LogConfig`]: defaults, then environment,
//! then an optional JSON file, then command-line overrides.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extensions tried, in order, when a lookup name has none
pub const DEFAULT_LOOKUP_EXTENSIONS: &[&str] = &[".clw", ".inc", ".equ", ".eq", ".int"];

pub const DEFAULT_REDIRECTION_FILE: &str = "Clarion110.red";

pub const DEFAULT_CONFIGURATION: &str = "Debug";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Settings for redirection parsing and file resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    /// Active build configuration (`Debug`, `Release`, ...)
    pub configuration: String,
    /// Directory holding the global redirection file
    pub clarion_bin: Option<PathBuf>,
    /// File name of the redirection file
    pub redirection_file: String,
    /// `%name%` substitutions; names match case-insensitively
    pub macros: HashMap<String, String>,
    pub default_lookup_extensions: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            configuration: DEFAULT_CONFIGURATION.to_string(),
            clarion_bin: None,
            redirection_file: DEFAULT_REDIRECTION_FILE.to_string(),
            macros: HashMap::new(),
            default_lookup_extensions: DEFAULT_LOOKUP_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl ResolverConfig {
    /// Defaults overlaid with `CLARION_CONFIGURATION`, `CLARION_BIN`,
    /// `CLARION_RED_FILE` and `CLARION_LOOKUP_EXTENSIONS` (`;`-separated)
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(configuration) = env::var("CLARION_CONFIGURATION") {
            config.configuration = configuration;
        }
        if let Ok(bin) = env::var("CLARION_BIN") {
            config.clarion_bin = Some(PathBuf::from(bin));
        }
        if let Ok(red) = env::var("CLARION_RED_FILE") {
            config.redirection_file = red;
        }
        if let Ok(extensions) = env::var("CLARION_LOOKUP_EXTENSIONS") {
            config.default_lookup_extensions = parse_extensions(&extensions);
        }
        config
    }

    /// Load a JSON config file; absent keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override values from CLI arguments
    pub fn with_overrides(
        mut self,
        configuration: Option<String>,
        clarion_bin: Option<PathBuf>,
        redirection_file: Option<String>,
    ) -> Self {
        if let Some(configuration) = configuration {
            self.configuration = configuration;
        }
        if let Some(clarion_bin) = clarion_bin {
            self.clarion_bin = Some(clarion_bin);
        }
        if let Some(redirection_file) = redirection_file {
            self.redirection_file = redirection_file;
        }
        self
    }

    pub fn with_macro(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.macros.insert(name.into(), value.into());
        self
    }

    /// Value of a `%name%` macro, ignoring case
    pub fn macro_value(&self, name: &str) -> Option<&str> {
        self.macros
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Global redirection file path, when a bin directory is configured
    pub fn global_redirection_path(&self) -> Option<PathBuf> {
        self.clarion_bin
            .as_ref()
            .map(|bin| bin.join(&self.redirection_file))
    }
}

/// Split `.clw;inc;.equ` into dotted, lower-cased extensions
fn parse_extensions(value: &str) -> Vec<String> {
    value
        .split([';', ',', ' '])
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            if ext.starts_with('.') {
                ext
            } else {
                format!(".{ext}")
            }
        })
        .collect()
}
