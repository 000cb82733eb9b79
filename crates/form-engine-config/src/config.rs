// crates/form-engine-config/src/config.rs
// ============================================================================
// Module: Form Engine Configuration
// Description: Configuration loading and validation for the form engine.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: form-engine-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Unknown keys and out-of-range limits are rejected rather than ignored. When
//! no path is given and the default `form-engine.toml` is absent, the built-in
//! defaults apply.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use form_engine_core::EngineConfig;
use form_engine_core::EngineLimits;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "form-engine.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "FORM_ENGINE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Largest accepted `limits.max_expression_bytes`.
pub(crate) const MAX_EXPRESSION_BYTES_CEILING: usize = 1024 * 1024;
/// Largest accepted `limits.max_expression_nesting`.
pub(crate) const MAX_EXPRESSION_NESTING_CEILING: usize = 256;
/// Largest accepted `limits.max_nodes`.
pub(crate) const MAX_NODES_CEILING: usize = 1_000_000;
/// Largest accepted `limits.max_repeat_instances`.
pub(crate) const MAX_REPEAT_INSTANCES_CEILING: u32 = 10_000;
/// Largest accepted `limits.max_choices`.
pub(crate) const MAX_CHOICES_CEILING: usize = 100_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Form engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormEngineConfig {
    /// Definition and expression limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Recalculation event logging.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// File the configuration was read from (not serialized).
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl FormEngineConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order is the explicit `path`, then [`CONFIG_ENV_VAR`], then
    /// `form-engine.toml` in the working directory. Only the last may be
    /// absent, in which case defaults are returned.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (resolved, origin) = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = match fs::read(&resolved) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound && origin == PathOrigin::Default => {
                return Ok(Self::default());
            }
            Err(err) => return Err(ConfigError::Io(err.to_string())),
        };
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config = Self::from_toml_str(content)?;
        config.source = Some(resolved);
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits.validate()?;
        self.logging.validate()
    }

    /// Maps the configuration onto the core engine configuration.
    #[must_use]
    pub const fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            limits: self.limits.to_engine_limits(),
            record_evaluations: self.logging.record_evaluations,
        }
    }
}

/// Definition and expression limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum expression text size in bytes.
    #[serde(default = "default_max_expression_bytes")]
    pub max_expression_bytes: usize,
    /// Maximum expression nesting depth.
    #[serde(default = "default_max_expression_nesting")]
    pub max_expression_nesting: usize,
    /// Maximum instantiated node count.
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    /// Maximum instance count of one repeat group.
    #[serde(default = "default_max_repeat_instances")]
    pub max_repeat_instances: u32,
    /// Maximum declared choices per select field.
    #[serde(default = "default_max_choices")]
    pub max_choices: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_expression_bytes: default_max_expression_bytes(),
            max_expression_nesting: default_max_expression_nesting(),
            max_nodes: default_max_nodes(),
            max_repeat_instances: default_max_repeat_instances(),
            max_choices: default_max_choices(),
        }
    }
}

impl LimitsConfig {
    /// Validates every limit is nonzero and below its ceiling.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_limit(
            "limits.max_expression_bytes",
            self.max_expression_bytes,
            MAX_EXPRESSION_BYTES_CEILING,
        )?;
        validate_limit(
            "limits.max_expression_nesting",
            self.max_expression_nesting,
            MAX_EXPRESSION_NESTING_CEILING,
        )?;
        validate_limit("limits.max_nodes", self.max_nodes, MAX_NODES_CEILING)?;
        if self.max_repeat_instances == 0 || self.max_repeat_instances > MAX_REPEAT_INSTANCES_CEILING
        {
            return Err(ConfigError::Invalid(format!(
                "limits.max_repeat_instances must be between 1 and {MAX_REPEAT_INSTANCES_CEILING}"
            )));
        }
        validate_limit("limits.max_choices", self.max_choices, MAX_CHOICES_CEILING)
    }

    /// Converts to core engine limits.
    #[must_use]
    pub const fn to_engine_limits(&self) -> EngineLimits {
        EngineLimits {
            max_expression_bytes: self.max_expression_bytes,
            max_expression_nesting: self.max_expression_nesting,
            max_nodes: self.max_nodes,
            max_repeat_instances: self.max_repeat_instances,
            max_choices: self.max_choices,
        }
    }
}

/// Destination for recalculation events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSink {
    /// Events are discarded.
    #[default]
    None,
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to `logging.path`.
    File,
}

/// Recalculation event logging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Selected sink.
    #[serde(default)]
    pub sink: LogSink,
    /// Output file for the `file` sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Emit one event per binding evaluation.
    #[serde(default)]
    pub record_evaluations: bool,
}

impl LoggingConfig {
    /// Validates sink and path settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (LogSink::File, None) => {
                Err(ConfigError::Invalid("logging.path is required for the file sink".to_string()))
            }
            (LogSink::File, Some(path)) => validate_path_field("logging.path", path),
            (LogSink::None | LogSink::Stderr, Some(_)) => Err(ConfigError::Invalid(
                "logging.path is only valid with the file sink".to_string(),
            )),
            (LogSink::None | LogSink::Stderr, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default for `limits.max_expression_bytes`.
fn default_max_expression_bytes() -> usize {
    EngineLimits::default().max_expression_bytes
}

/// Default for `limits.max_expression_nesting`.
fn default_max_expression_nesting() -> usize {
    EngineLimits::default().max_expression_nesting
}

/// Default for `limits.max_nodes`.
fn default_max_nodes() -> usize {
    EngineLimits::default().max_nodes
}

/// Default for `limits.max_repeat_instances`.
fn default_max_repeat_instances() -> u32 {
    EngineLimits::default().max_repeat_instances
}

/// Default for `limits.max_choices`.
fn default_max_choices() -> usize {
    EngineLimits::default().max_choices
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Where a resolved config path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathOrigin {
    /// Passed by the caller.
    Explicit,
    /// Read from [`CONFIG_ENV_VAR`].
    Environment,
    /// The default filename.
    Default,
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<(PathBuf, PathOrigin), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), PathOrigin::Explicit));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), PathOrigin::Environment));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), PathOrigin::Default))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
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

/// Validates a configured path value against length constraints.
fn validate_path_field(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a numeric limit lies in `1 ..= ceiling`.
fn validate_limit(field: &str, value: usize, ceiling: usize) -> Result<(), ConfigError> {
    if value == 0 || value > ceiling {
        return Err(ConfigError::Invalid(format!("{field} must be between 1 and {ceiling}")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
