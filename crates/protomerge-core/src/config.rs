//! Run configuration with source tracking.
//!
//! Values are layered: built-in defaults, then `PROTOMERGE_*` environment
//! variables, then CLI flags. Each resolved value remembers where it came
//! from so the CLI can log it.

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::output::VtableEncoding;

/// Output directory.
pub const ENV_OUT_DIR: &str = "PROTOMERGE_OUT_DIR";
/// Vtable encoding of the class document (`objects` or `compact`).
pub const ENV_VTABLE_FORMAT: &str = "PROTOMERGE_VTABLE_FORMAT";
/// File-name glob selecting observation documents.
pub const ENV_GLOB: &str = "PROTOMERGE_GLOB";
/// `0` or `false` disables the getter fix-up.
pub const ENV_FIX_GETTERS: &str = "PROTOMERGE_FIX_GETTERS";

/// Default observation file glob.
pub const DEFAULT_GLOB: &str = "*.json";

// ============================================================================
// Configuration Sources
// ============================================================================

/// Configuration value source (for precedence tracking).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    /// Built-in default value.
    Default = 0,
    /// From environment variable.
    EnvVar = 1,
    /// From CLI flag (highest precedence).
    CliFlag = 2,
}

/// A configuration value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue<T> {
    /// The actual value.
    pub value: T,
    /// Where the value came from.
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    /// Create a new config value with the given source.
    pub fn new(value: T, source: ConfigSource) -> Self {
        ConfigValue { value, source }
    }
}

/// Errors resolving configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}: {reason}")]
    InvalidEnvValue {
        var: String,
        value: String,
        reason: String,
    },
}

// ============================================================================
// Merge Configuration
// ============================================================================

/// Overrides from CLI flags. `None` leaves the lower layers in effect.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub out_dir: Option<PathBuf>,
    pub vtable_encoding: Option<VtableEncoding>,
    pub observation_glob: Option<String>,
    /// `Some(false)` from `--no-fix-getters`.
    pub fix_getters: Option<bool>,
    /// `Some(false)` from `--compact-json`.
    pub pretty: Option<bool>,
}

/// Resolved configuration of a merge run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    pub out_dir: ConfigValue<PathBuf>,
    pub vtable_encoding: ConfigValue<VtableEncoding>,
    pub observation_glob: ConfigValue<String>,
    pub fix_getters: ConfigValue<bool>,
    pub pretty: ConfigValue<bool>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            out_dir: ConfigValue::new(PathBuf::from("."), ConfigSource::Default),
            vtable_encoding: ConfigValue::new(VtableEncoding::Objects, ConfigSource::Default),
            observation_glob: ConfigValue::new(DEFAULT_GLOB.to_string(), ConfigSource::Default),
            fix_getters: ConfigValue::new(true, ConfigSource::Default),
            pretty: ConfigValue::new(true, ConfigSource::Default),
        }
    }
}

impl MergeConfig {
    /// Resolve against the process environment.
    pub fn resolve(cli: &CliOverrides) -> Result<Self, ConfigError> {
        Self::resolve_with(cli, |var| std::env::var(var).ok())
    }

    /// Resolve with `env` standing in for the process environment.
    pub fn resolve_with(
        cli: &CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = MergeConfig::default();
        config.apply_env_vars(env)?;
        config.apply_cli_overrides(cli);
        debug!(
            out_dir = %config.out_dir.value.display(),
            out_dir_source = ?config.out_dir.source,
            vtable_format = %config.vtable_encoding.value,
            glob = %config.observation_glob.value,
            fix_getters = config.fix_getters.value,
            "resolved configuration"
        );
        Ok(config)
    }

    fn apply_env_vars(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(dir) = env(ENV_OUT_DIR) {
            self.out_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::EnvVar);
        }

        if let Some(format) = env(ENV_VTABLE_FORMAT) {
            let encoding = format
                .parse::<VtableEncoding>()
                .map_err(|reason| ConfigError::InvalidEnvValue {
                    var: ENV_VTABLE_FORMAT.to_string(),
                    value: format.clone(),
                    reason,
                })?;
            self.vtable_encoding = ConfigValue::new(encoding, ConfigSource::EnvVar);
        }

        if let Some(glob) = env(ENV_GLOB) {
            self.observation_glob = ConfigValue::new(glob, ConfigSource::EnvVar);
        }

        if let Some(flag) = env(ENV_FIX_GETTERS) {
            let enabled = parse_flag(&flag).ok_or_else(|| ConfigError::InvalidEnvValue {
                var: ENV_FIX_GETTERS.to_string(),
                value: flag.clone(),
                reason: "expected 0, 1, true or false".to_string(),
            })?;
            self.fix_getters = ConfigValue::new(enabled, ConfigSource::EnvVar);
        }

        Ok(())
    }

    fn apply_cli_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(ref dir) = overrides.out_dir {
            self.out_dir = ConfigValue::new(dir.clone(), ConfigSource::CliFlag);
        }

        if let Some(encoding) = overrides.vtable_encoding {
            self.vtable_encoding = ConfigValue::new(encoding, ConfigSource::CliFlag);
        }

        if let Some(ref glob) = overrides.observation_glob {
            self.observation_glob = ConfigValue::new(glob.clone(), ConfigSource::CliFlag);
        }

        if let Some(enabled) = overrides.fix_getters {
            self.fix_getters = ConfigValue::new(enabled, ConfigSource::CliFlag);
        }

        if let Some(pretty) = overrides.pretty {
            self.pretty = ConfigValue::new(pretty, ConfigSource::CliFlag);
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
