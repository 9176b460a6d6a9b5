//! One shared HTTP server and its dynamic route table.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use http::{Method, Uri};
use tokio_util::sync::CancellationToken;

use crate::contract::{HandlerError, JettyError, JettyHandler, JettyRequest};

type RouteTable = DashMap<String, Arc<dyn JettyHandler>>;

/// An HTTP server identified by `host:port`.
///
/// Handlers may be added before or after the server starts serving; requests are
/// routed through the table at request time.
pub struct JettyServer {
    host: String,
    port: u16,
    context_path: String,
    routes: Arc<RouteTable>,
    local_addr: OnceLock<SocketAddr>,
}

impl JettyServer {
    pub(crate) fn new(host: &str, port: u16, context_path: String) -> Self {
        Self {
            host: host.to_owned(),
            port,
            context_path,
            routes: Arc::new(DashMap::new()),
            local_addr: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Normalized context path; empty for the root.
    #[must_use]
    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    /// `host:port` as configured.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Actual bound address once serving (differs from `port` when it was 0).
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Full paths of every mounted handler, sorted.
    #[must_use]
    pub fn routes(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.routes.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    /// Mount `handler` at `context_path + handler.path()`.
    ///
    /// # Errors
    /// Returns `InvalidPath` for a relative handler path and `DuplicateRoute` if
    /// the full path is taken.
    pub fn add_handler(&self, handler: Arc<dyn JettyHandler>) -> Result<(), JettyError> {
        let path = handler.path();
        if !path.starts_with('/') {
            return Err(JettyError::InvalidPath(path.to_owned()));
        }
        let full = route_key(&format!("{}{path}", self.context_path)).to_owned();
        match self.routes.entry(full.clone()) {
            Entry::Occupied(_) => Err(JettyError::DuplicateRoute {
                address: self.address(),
                path: full,
            }),
            Entry::Vacant(slot) => {
                slot.insert(handler);
                tracing::info!(server = %self.address(), path = %full, "Handler added");
                Ok(())
            }
        }
    }

    /// Router dispatching every request through the route table.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(Arc::clone(&self.routes))
    }

    /// Bind and serve in the background until `cancel` fires.
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound or the server already serves.
    pub async fn serve(self: &Arc<Self>, cancel: CancellationToken) -> anyhow::Result<SocketAddr> {
        if self.local_addr.get().is_some() {
            anyhow::bail!("server {} is already serving", self.address());
        }
        let listener = tokio::net::TcpListener::bind((self.host.as_str(), self.port))
            .await
            .map_err(|e| anyhow::anyhow!("cannot bind {}: {e}", self.address()))?;
        let addr = listener.local_addr()?;
        self.local_addr
            .set(addr)
            .map_err(|_| anyhow::anyhow!("server {} is already serving", self.address()))?;
        tracing::info!(server = %self.address(), bound = %addr, "HTTP server bound");

        let router = self.router();
        let server = Arc::clone(self);
        tokio::spawn(async move {
            let shutdown = async move {
                cancel.cancelled().await;
                tracing::info!(server = %server.address(), "HTTP server shutting down gracefully");
            };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!(bound = %addr, error = %e, "HTTP server failed");
            }
        });
        Ok(addr)
    }
}

impl fmt::Debug for JettyServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JettyServer")
            .field("address", &self.address())
            .field("context_path", &self.context_path)
            .field("routes", &self.routes())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

/// Route table key: no trailing `/`, except for the root itself.
fn route_key(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

async fn dispatch(
    State(routes): State<Arc<RouteTable>>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let path = route_key(uri.path());

    let Some(handler) = routes.get(path).map(|h| Arc::clone(h.value())) else {
        return HandlerError::NotFound(format!("no handler for '{path}'")).into_response();
    };

    let request = JettyRequest {
        method,
        path: path.to_owned(),
        query,
        body,
    };
    match handler.handle(request).await {
        Ok(value) => Json(value).into_response(),
        Err(e) => e.into_response(),
    }
}
