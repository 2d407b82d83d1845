//! Layered application configuration.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. YAML file (`--config`)
//! 3. `APP__` prefixed environment, `__` separating sections (`APP__CADENCE__ADDRESS`)
//! 4. legacy environment: `BIND_ADDRESS`, `CADENCE_ADDRESS`, `TIMING=1`
//! 5. command line overrides

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::logging::{LoggingConfig, verbosity_level};

pub const ENV_PREFIX: &str = "APP__";
pub const LEGACY_BIND_ADDRESS: &str = "BIND_ADDRESS";
pub const LEGACY_CADENCE_ADDRESS: &str = "CADENCE_ADDRESS";
pub const LEGACY_TIMING: &str = "TIMING";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file does not exist: {}", .0.display())]
    MissingFile(PathBuf),

    #[error(transparent)]
    Figment(#[from] Box<figment::Error>),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Process name; the caller name on outbound calls.
    pub name: String,
    /// Address the HTTP inbound listens on.
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "cadence-proxy".to_owned(),
            bind_address: "127.0.0.1:6666".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CadenceConfig {
    /// `host:port` of the Cadence frontend.
    pub address: String,
    /// Destination service name.
    pub service: String,
    pub connect_timeout_ms: u64,
    /// TTL for calls that arrive without one.
    pub call_timeout_ms: u64,
    /// Extra connection attempts; calls themselves are never retried.
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:7933".to_owned(),
            service: "cadence-frontend".to_owned(),
            connect_timeout_ms: 10_000,
            call_timeout_ms: 30_000,
            max_retries: 3,
            base_backoff_ms: 100,
            max_backoff_ms: 5_000,
        }
    }
}

impl CadenceConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    #[must_use]
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MiddlewareConfig {
    /// Log the duration of every outbound call.
    pub timing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cadence: CadenceConfig,
    pub middleware: MiddlewareConfig,
    pub logging: LoggingConfig,
}

/// Command line values that override every other source.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    pub bind: Option<String>,
    pub cadence: Option<String>,
    pub timing: bool,
    pub verbose: u8,
}

/// Legacy variables as a partial config document.
fn legacy_overrides(env: impl Fn(&str) -> Option<String>) -> Value {
    let present = |key: &str| env(key).filter(|value| !value.is_empty());
    let mut overrides = Map::new();

    if let Some(bind) = present(LEGACY_BIND_ADDRESS) {
        overrides.insert("server".to_owned(), json!({ "bind_address": bind }));
    }
    if let Some(address) = present(LEGACY_CADENCE_ADDRESS) {
        overrides.insert("cadence".to_owned(), json!({ "address": address }));
    }
    if present(LEGACY_TIMING).as_deref() == Some("1") {
        overrides.insert("middleware".to_owned(), json!({ "timing": true }));
    }

    Value::Object(overrides)
}

fn validate_host_port(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        field,
        reason: format!("{reason}, got {value:?}"),
    };
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port"))?;
    if host.is_empty() {
        return Err(invalid("host is empty"));
    }
    port.parse::<u16>().map_err(|_| invalid("port is not a number"))?;
    Ok(())
}

impl AppConfig {
    /// Load defaults, the optional YAML file and the process environment.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file is missing, a source cannot be parsed
    /// or the merged configuration is invalid.
    pub fn load_layered(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_legacy_env(path, |key| std::env::var(key).ok())
    }

    /// [`AppConfig::load_layered`] with the legacy variables read through `env`.
    ///
    /// # Errors
    /// Same as [`AppConfig::load_layered`].
    pub fn load_with_legacy_env(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::MissingFile(path.to_path_buf()));
            }
            figment = figment.merge(Yaml::file(path));
        }

        let config: AppConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(legacy_overrides(env)))
            .extract()
            .map_err(Box::new)?;

        config.validate()?;
        Ok(config)
    }

    /// Apply command line overrides, then validate again.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if an override is malformed.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) -> Result<(), ConfigError> {
        if let Some(bind) = &args.bind {
            self.server.bind_address.clone_from(bind);
        }
        if let Some(cadence) = &args.cadence {
            self.cadence.address.clone_from(cadence);
        }
        if args.timing {
            self.middleware.timing = true;
        }
        if let Some(level) = verbosity_level(args.verbose) {
            self.logging.level = level.to_owned();
        }
        self.validate()
    }

    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "server.name",
                reason: "must not be empty".to_owned(),
            });
        }
        validate_host_port("server.bind_address", &self.server.bind_address)?;
        validate_host_port("cadence.address", &self.cadence.address)?;
        if self.cadence.service.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "cadence.service",
                reason: "must not be empty".to_owned(),
            });
        }
        if self.cadence.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "cadence.call_timeout_ms",
                reason: "must be greater than zero".to_owned(),
            });
        }
        Ok(())
    }

    /// Effective configuration as pretty JSON.
    ///
    /// # Errors
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_pretty_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
