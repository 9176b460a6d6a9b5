//! Process bootstrap helpers: layered configuration and logging setup.

pub mod config;
pub mod logging;

pub use config::{AppConfig, CliArgs, LogFormat, LoggingConfig, ServerConfig};
pub use logging::init_logging;
