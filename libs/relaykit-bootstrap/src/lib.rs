#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

//! Process glue for relaykit services: configuration, logging and signals.

pub mod config;
pub mod logging;
pub mod signals;

pub use config::{AppConfig, CadenceConfig, CliArgs, ConfigError, MiddlewareConfig, ServerConfig};
pub use logging::{LogFormat, LoggingConfig, init_logging};
pub use signals::{ShutdownSignal, Signals};
