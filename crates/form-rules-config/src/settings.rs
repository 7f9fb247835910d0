// crates/form-rules-config/src/settings.rs
// ============================================================================
// Module: Store Settings
// Description: Source location, format selection, and size limits.
// Purpose: Resolve where rule configuration lives and how to parse it.
// Dependencies: form-rules-core, serde, serde_json, thiserror, toml
// ============================================================================

//! ## Overview
//! Settings locate the rule configuration source. Resolution order:
//! 1. an explicit `path`,
//! 2. the `FORM_RULES_CONFIG` environment variable,
//! 3. `<base_dir>/config/form_validation.json`,
//! 4. `config/form_validation.json` relative to the working directory.
//!
//! Paths and sizes are bounded. `.toml` sources parse as TOML; everything
//! else parses as JSON.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::path::Path;
use std::path::PathBuf;

use form_rules_core::RuleDocument;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable used to override the source path.
pub const CONFIG_ENV_VAR: &str = "FORM_RULES_CONFIG";
/// Default source location relative to the base directory.
pub const DEFAULT_RELATIVE_PATH: &str = "config/form_validation.json";
/// Default maximum source size in bytes.
pub const DEFAULT_MAX_BYTES: usize = 1024 * 1024;
/// Largest configurable source size in bytes.
pub const MAX_SOURCE_BYTES: usize = 16 * 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration source errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// I/O failure while reading the source.
    #[error("config io error: {0}")]
    Io(String),
    /// JSON or TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid settings or source data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Source Format
// ============================================================================

/// Serialization format of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// JSON document.
    Json,
    /// TOML document.
    Toml,
}

impl SourceFormat {
    /// Picks the format from the path extension.
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }

    /// Parses a rule document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the content is malformed.
    pub fn parse(self, content: &str) -> Result<RuleDocument, ConfigError> {
        match self {
            Self::Json => {
                serde_json::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
            Self::Toml => toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Where the store reads rule configuration from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    /// Explicit source path.
    pub path: Option<PathBuf>,
    /// Application base directory for the default location.
    pub base_dir: Option<PathBuf>,
    /// Maximum source size in bytes.
    pub max_bytes: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: None,
            base_dir: None,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl StoreSettings {
    /// Settings for an explicit source path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Settings using the default location under `base_dir`.
    #[must_use]
    pub fn under(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            ..Self::default()
        }
    }

    /// Parses and validates settings from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates limits and paths.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a limit or path is out of bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 || self.max_bytes > MAX_SOURCE_BYTES {
            return Err(ConfigError::Invalid(format!(
                "max_bytes must be between 1 and {MAX_SOURCE_BYTES}"
            )));
        }
        if let Some(path) = &self.path {
            validate_path(path)?;
        }
        if let Some(base_dir) = &self.base_dir {
            validate_path(base_dir)?;
        }
        Ok(())
    }

    /// Resolves the source path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the resolved path exceeds limits.
    pub fn resolve_path(&self) -> Result<PathBuf, ConfigError> {
        let resolved = if let Some(path) = &self.path {
            path.clone()
        } else if let Ok(env_path) = env::var(CONFIG_ENV_VAR)
            && !env_path.trim().is_empty()
        {
            if env_path.len() > MAX_TOTAL_PATH_LENGTH {
                return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
            }
            PathBuf::from(env_path)
        } else if let Some(base_dir) = &self.base_dir {
            base_dir.join(DEFAULT_RELATIVE_PATH)
        } else {
            PathBuf::from(DEFAULT_RELATIVE_PATH)
        };
        validate_path(&resolved)?;
        Ok(resolved)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates a path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid("config path must be non-empty".to_string()));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}
