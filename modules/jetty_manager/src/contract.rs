//! Handler and server-management contract of the jetty manager module.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Json;
use axum::body::Bytes;
use axum::response::{IntoResponse, Response};
use collector_core::ServiceNotProvidedError;
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::server::JettyServer;

/// An inbound request as seen by a [`JettyHandler`].
#[derive(Debug, Clone)]
pub struct JettyRequest {
    pub method: Method,
    /// Full request path, context path included.
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Bytes,
}

impl JettyRequest {
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: HashMap::new(),
            body: Bytes::new(),
        }
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Query parameter `key`, required.
    ///
    /// # Errors
    /// Returns `HandlerError::BadRequest` when the parameter is absent.
    pub fn param(&self, key: &str) -> Result<&str, HandlerError> {
        self.query
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| HandlerError::BadRequest(format!("missing query parameter '{key}'")))
    }

    /// Query parameter `key` parsed as `T`, `None` when absent.
    ///
    /// # Errors
    /// Returns `HandlerError::BadRequest` when the parameter does not parse.
    pub fn parsed_param<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, HandlerError> {
        self.query
            .get(key)
            .map(|raw| {
                raw.parse::<T>().map_err(|_| {
                    HandlerError::BadRequest(format!("query parameter '{key}' is malformed"))
                })
            })
            .transpose()
    }
}

/// Request-path failures, mapped to HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),
    /// A collaborator the handler relies on is not available (yet).
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HandlerError::NotFound(_) => StatusCode::NOT_FOUND,
            HandlerError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            HandlerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            HandlerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceNotProvidedError> for HandlerError {
    fn from(e: ServiceNotProvidedError) -> Self {
        HandlerError::Unavailable(e.to_string())
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = %status, error = %self, "Handler failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// A request handler mounted on a [`JettyServer`] under the server's context path.
#[async_trait]
pub trait JettyHandler: Send + Sync + 'static {
    /// Path below the context path, starting with `/`.
    fn path(&self) -> &str;

    /// Serve one request; the value is returned as the JSON body.
    ///
    /// # Errors
    /// The error's status and message become the response.
    async fn handle(&self, request: JettyRequest) -> Result<Value, HandlerError>;
}

/// Server management failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JettyError {
    #[error("server {address} already uses context path '{existing}', requested '{requested}'")]
    ContextPathConflict {
        address: String,
        existing: String,
        requested: String,
    },
    #[error("handler path '{0}' must start with '/'")]
    InvalidPath(String),
    #[error("route '{path}' already has a handler on server {address}")]
    DuplicateRoute { address: String, path: String },
}

/// Hands out HTTP servers shared by every module of the process.
pub trait JettyManagerService: Send + Sync {
    /// The server bound to `host:port`, created on first request.
    ///
    /// # Errors
    /// Returns `JettyError::ContextPathConflict` if the server exists with a
    /// different context path.
    fn get_or_create_if_absent(
        &self,
        host: &str,
        port: u16,
        context_path: &str,
    ) -> Result<Arc<JettyServer>, JettyError>;
}

/// Where a module exposes its handlers: the `host`, `port` and `context_path`
/// options of its provider config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JettyEndpointConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_context_path")]
    pub context_path: String,
}

fn default_context_path() -> String {
    "/".to_owned()
}

/// `"/"`, `""` → `""`; `"ui/"` → `"/ui"`.
#[must_use]
pub fn normalize_context_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn context_paths_are_normalized() {
        assert_eq!(normalize_context_path("/"), "");
        assert_eq!(normalize_context_path(""), "");
        assert_eq!(normalize_context_path("ui/"), "/ui");
        assert_eq!(normalize_context_path("/a/b"), "/a/b");
    }

    #[test]
    fn endpoint_config_defaults_context_path() {
        let cfg: JettyEndpointConfig =
            serde_json::from_value(json!({ "host": "0.0.0.0", "port": 12800 })).unwrap();
        assert_eq!(cfg.context_path, "/");
        assert!(serde_json::from_value::<JettyEndpointConfig>(json!({ "host": "x" })).is_err());
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            HandlerError::Unavailable("x".to_owned()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            HandlerError::from(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn query_helpers() {
        let req = JettyRequest::get("/x").with_query("limit", "10").with_query("bad", "y");
        assert_eq!(req.param("limit").unwrap(), "10");
        assert!(matches!(req.param("missing"), Err(HandlerError::BadRequest(_))));
        assert_eq!(req.parsed_param::<u32>("limit").unwrap(), Some(10));
        assert_eq!(req.parsed_param::<u32>("none").unwrap(), None);
        assert!(req.parsed_param::<u32>("bad").is_err());
    }
}
