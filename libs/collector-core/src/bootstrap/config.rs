//! Layered process configuration.
//!
//! Sources, lowest priority first:
//! 1. built-in defaults
//! 2. YAML file (if provided)
//! 3. environment variables with the `APM__` prefix (`APM__LOGGING__LEVEL=debug`)
//! 4. CLI overrides

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ConfigProvider;

/// Prefix of environment variables merged into the configuration.
pub const ENV_PREFIX: &str = "APM__";

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    /// Raw per-module sections: `{ provider: <name>, config: { ... } }`.
    pub modules: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Fixed process instance id; a random one is generated when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level directive, used when `RUST_LOG` is not set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Overrides coming from the command line.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub print_config: bool,
    /// `-v` count: 1 = debug, 2+ = trace.
    pub verbose: u8,
}

impl AppConfig {
    /// Load defaults, then the YAML file at `path` (if any), then `APM__*` env vars.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or a source does not match the schema.
    pub fn load_layered(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Some(path) = path {
            if !path.is_file() {
                anyhow::bail!("config file does not exist: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment
            .extract()
            .context("failed to load collector configuration")
    }

    /// Same as [`load_layered`](Self::load_layered) but a missing path means "defaults + env".
    ///
    /// # Errors
    /// Returns an error if a present source is malformed.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) if p.is_file() => Self::load_layered(Some(p)),
            Some(p) => {
                tracing::warn!(path = %p.display(), "config file not found; using defaults");
                Self::load_layered(None)
            }
            None => Self::load_layered(None),
        }
    }

    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        match args.verbose {
            0 => {}
            1 => "debug".clone_into(&mut self.logging.level),
            _ => "trace".clone_into(&mut self.logging.level),
        }
    }

    /// Render the effective configuration as YAML.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        serde_saphyr::to_string(self).context("failed to render configuration as YAML")
    }
}

impl ConfigProvider for AppConfig {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.modules.get(module_name)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use std::io::Write;

    const YAML: &str = r"
logging:
  level: warn
modules:
  cluster:
    provider: standalone
  ui:
    provider: jetty
    config:
      host: 0.0.0.0
      port: 12800
      context_path: /
";

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_without_file() {
        temp_env::with_vars_unset(["APM__LOGGING__LEVEL", "APM__LOGGING__FORMAT"], || {
            let cfg = AppConfig::load_layered(None).unwrap();
            assert_eq!(cfg.logging, LoggingConfig::default());
            assert!(cfg.modules.is_empty());
        });
    }

    #[test]
    fn yaml_file_populates_module_sections() {
        let file = write_config(YAML);
        temp_env::with_vars_unset(["APM__LOGGING__LEVEL"], || {
            let cfg = AppConfig::load_layered(Some(file.path())).unwrap();
            assert_eq!(cfg.logging.level, "warn");

            let ui = ProviderConfig::from_provider(&cfg, "ui").unwrap();
            assert_eq!(ui.get::<u16>("port").unwrap(), 12800);
            assert_eq!(ui.get::<String>("host").unwrap(), "0.0.0.0");
            assert_eq!(
                crate::config::selected_provider(&cfg, "cluster").unwrap(),
                Some("standalone".to_owned())
            );
        });
    }

    #[test]
    fn env_overrides_file() {
        let file = write_config(YAML);
        temp_env::with_vars(
            [
                ("APM__LOGGING__LEVEL", Some("error")),
                ("APM__LOGGING__FORMAT", Some("json")),
            ],
            || {
                let cfg = AppConfig::load_layered(Some(file.path())).unwrap();
                assert_eq!(cfg.logging.level, "error");
                assert_eq!(cfg.logging.format, LogFormat::Json);
            },
        );
    }

    #[test]
    fn missing_file_is_an_error_for_strict_load() {
        let err = AppConfig::load_layered(Some(Path::new("/nonexistent/collector.yaml")));
        assert!(err.is_err());
        assert!(AppConfig::load_or_default(Some(Path::new("/nonexistent/collector.yaml"))).is_ok());
    }

    #[test]
    fn verbose_flag_raises_level() {
        let mut cfg = AppConfig::default();
        cfg.apply_cli_overrides(&CliArgs {
            verbose: 2,
            ..CliArgs::default()
        });
        assert_eq!(cfg.logging.level, "trace");
    }

    #[test]
    fn yaml_dump_contains_modules() {
        let file = write_config(YAML);
        temp_env::with_vars_unset(["APM__LOGGING__LEVEL"], || {
            let cfg = AppConfig::load_layered(Some(file.path())).unwrap();
            let dumped = cfg.to_yaml().unwrap();
            assert!(dumped.contains("standalone"));
            assert!(dumped.contains("12800"));
        });
    }
}
