//! Generator configuration
//!
//! Loaded from `svcforge.toml` next to the specification (or an explicit
//! path), then overridden field by field from the command line.

use crate::diagnostics::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File name looked up next to the specification
pub const CONFIG_FILE: &str = "svcforge.toml";

/// How the emitter treats an existing output tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Regenerate into a staging directory and promote it over the target
    #[default]
    Full,
    /// Rewrite changed files in place and delete stale ones
    Incremental,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Full => f.write_str("full"),
            Mode::Incremental => f.write_str("incremental"),
        }
    }
}

/// How diagnostics are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    pub output_dir: PathBuf,
    pub mode: Mode,
    /// Render threads; 0 uses one per core
    pub jobs: usize,
    pub format: Format,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("generated"),
            mode: Mode::Full,
            jobs: 0,
            format: Format::Human,
        }
    }
}

impl GeneratorConfig {
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::Config(e.message().to_string()))
    }

    /// Load `path`
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_toml(&text).map_err(|e| match e {
            Error::Config(message) => Error::Config(format!("{}: {message}", path.display())),
            other => other,
        })?;
        // Relative output directories are relative to the config file.
        if config.output_dir.is_relative() {
            if let Some(dir) = path.parent() {
                config.output_dir = dir.join(&config.output_dir);
            }
        }
        tracing::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// `explicit` when given, else `svcforge.toml` beside `spec` if present, else defaults
    pub fn discover(spec: &Path, explicit: Option<&Path>) -> Result<Self, Error> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let beside = spec
            .parent()
            .map(|dir| dir.join(CONFIG_FILE))
            .filter(|p| p.is_file());
        match beside {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}
