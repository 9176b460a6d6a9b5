//! Typed access to per-module configuration.
//!
//! The process configuration carries one raw JSON section per module:
//!
//! ```yaml
//! modules:
//!   ui:
//!     provider: jetty          # optional provider selection
//!     config:                  # opaque options handed to the provider
//!       host: 0.0.0.0
//!       port: 12800
//!       context_path: /
//! ```
//!
//! Two loading modes are offered, mirroring how providers use them:
//!
//! 1. **Lenient** ([`ProviderConfig::or_default`]): falls back to `T::default()` when the
//!    `config` section is absent; a present but malformed section is still an error.
//! 2. **Strict** ([`ProviderConfig::required`]): the section must exist and deserialize.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ConfigurationError;

/// Provider of module-specific configuration (raw JSON sections only).
pub trait ConfigProvider: Send + Sync {
    /// Returns the raw JSON section for the module, if any.
    fn get_module_config(&self, module_name: &str) -> Option<&Value>;
}

/// A config provider with no module sections at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyConfig;

impl ConfigProvider for EmptyConfig {
    fn get_module_config(&self, _module_name: &str) -> Option<&Value> {
        None
    }
}

impl<S> ConfigProvider for std::collections::HashMap<String, Value, S>
where
    S: std::hash::BuildHasher + Send + Sync,
{
    fn get_module_config(&self, module_name: &str) -> Option<&Value> {
        self.get(module_name)
    }
}

/// Provider name selected for a module in its config section, if any.
///
/// # Errors
/// Returns `ConfigurationError` if `provider` is present but not a string.
pub fn selected_provider(
    provider: &dyn ConfigProvider,
    module_name: &str,
) -> Result<Option<String>, ConfigurationError> {
    let Some(section) = provider.get_module_config(module_name) else {
        return Ok(None);
    };
    match section.get("provider") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ConfigurationError::new(
            module_name,
            format!("'provider' must be a string, got {other}"),
        )),
    }
}

/// The options handed to one provider: the `config` object of its module section.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    module: String,
    section: Option<Value>,
}

impl ProviderConfig {
    /// Extract the `config` object for `module_name` from the process configuration.
    ///
    /// # Errors
    /// Returns `ConfigurationError` if the module section is not an object.
    pub fn from_provider(
        provider: &dyn ConfigProvider,
        module_name: &str,
    ) -> Result<Self, ConfigurationError> {
        let section = match provider.get_module_config(module_name) {
            None | Some(Value::Null) => None,
            Some(Value::Object(obj)) => obj.get("config").filter(|v| !v.is_null()).cloned(),
            Some(_) => {
                return Err(ConfigurationError::new(
                    module_name,
                    "module section must be an object",
                ));
            }
        };
        Ok(Self {
            module: module_name.to_owned(),
            section,
        })
    }

    /// Build a config directly from a `config` object (useful in tests).
    #[must_use]
    pub fn new(module: impl Into<String>, section: Option<Value>) -> Self {
        Self {
            module: module.into(),
            section,
        }
    }

    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Deserialize the whole section; it must be present.
    ///
    /// # Errors
    /// Returns `ConfigurationError` when the section is missing or malformed.
    pub fn required<T: DeserializeOwned>(&self) -> Result<T, ConfigurationError> {
        let section = self
            .section
            .as_ref()
            .ok_or_else(|| ConfigurationError::new(&self.module, "missing 'config' section"))?;
        serde_json::from_value(section.clone())
            .map_err(|e| ConfigurationError::new(&self.module, e.to_string()))
    }

    /// Deserialize the section, falling back to `T::default()` when it is absent.
    ///
    /// # Errors
    /// Returns `ConfigurationError` if the section exists but cannot be deserialized.
    pub fn or_default<T: DeserializeOwned + Default>(&self) -> Result<T, ConfigurationError> {
        match &self.section {
            None => Ok(T::default()),
            Some(section) => serde_json::from_value(section.clone())
                .map_err(|e| ConfigurationError::new(&self.module, e.to_string())),
        }
    }

    /// Read one option, which must be present.
    ///
    /// # Errors
    /// Returns `ConfigurationError` if the option is missing or has the wrong type.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigurationError> {
        let value = self
            .section
            .as_ref()
            .and_then(|s| s.get(key))
            .filter(|v| !v.is_null())
            .ok_or_else(|| ConfigurationError::new(&self.module, format!("missing option '{key}'")))?;
        serde_json::from_value(value.clone()).map_err(|e| {
            ConfigurationError::new(&self.module, format!("option '{key}' is malformed: {e}"))
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Deserialize, Default)]
    struct ServerConfig {
        host: String,
        port: u16,
        #[serde(default)]
        context_path: Option<String>,
    }

    fn provider() -> HashMap<String, Value> {
        let mut modules = HashMap::new();
        modules.insert(
            "ui".to_owned(),
            json!({
                "provider": "jetty",
                "config": { "host": "localhost", "port": 12800, "context_path": "/" }
            }),
        );
        modules.insert("cluster".to_owned(), json!({ "provider": "standalone" }));
        modules.insert("broken".to_owned(), json!("not an object"));
        modules.insert(
            "bad_port".to_owned(),
            json!({ "config": { "host": "localhost", "port": "eighty" } }),
        );
        modules.insert("bad_provider".to_owned(), json!({ "provider": 42 }));
        modules
    }

    #[test]
    fn required_section_deserializes() {
        let cfg = ProviderConfig::from_provider(&provider(), "ui").unwrap();
        let server: ServerConfig = cfg.required().unwrap();
        assert_eq!(
            server,
            ServerConfig {
                host: "localhost".to_owned(),
                port: 12800,
                context_path: Some("/".to_owned()),
            }
        );
    }

    #[test]
    fn required_section_missing_is_configuration_error() {
        let cfg = ProviderConfig::from_provider(&provider(), "cluster").unwrap();
        let err = cfg.required::<ServerConfig>().unwrap_err();
        assert_eq!(err.module, "cluster");
        assert!(err.reason.contains("missing"));
    }

    #[test]
    fn lenient_section_falls_back_to_default() {
        let cfg = ProviderConfig::from_provider(&provider(), "nonexistent").unwrap();
        let server: ServerConfig = cfg.or_default().unwrap();
        assert_eq!(server, ServerConfig::default());
    }

    #[test]
    fn malformed_option_is_configuration_error() {
        let cfg = ProviderConfig::from_provider(&provider(), "bad_port").unwrap();
        assert!(cfg.required::<ServerConfig>().is_err());
        assert!(cfg.or_default::<ServerConfig>().is_err());

        let err = cfg.get::<u16>("port").unwrap_err();
        assert!(err.reason.contains("'port'"));
        assert_eq!(cfg.get::<String>("host").unwrap(), "localhost");
    }

    #[test]
    fn single_options_are_typed() {
        let cfg = ProviderConfig::from_provider(&provider(), "ui").unwrap();
        assert_eq!(cfg.get::<u16>("port").unwrap(), 12800);
        assert_eq!(cfg.get::<String>("context_path").unwrap(), "/");
        assert!(cfg.get::<String>("missing").is_err());
    }

    #[test]
    fn non_object_module_section_is_rejected() {
        let err = ProviderConfig::from_provider(&provider(), "broken").unwrap_err();
        assert_eq!(err.module, "broken");
    }

    #[test]
    fn provider_selection_is_read_from_section() {
        let p = provider();
        assert_eq!(selected_provider(&p, "ui").unwrap(), Some("jetty".to_owned()));
        assert_eq!(selected_provider(&p, "nonexistent").unwrap(), None);
        assert!(selected_provider(&p, "bad_provider").is_err());
    }
}
