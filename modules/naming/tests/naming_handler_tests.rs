#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Naming handler bridge and discovery route tests.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use collector_cluster::{
    CachingNamingListener, ClusterRegistry, Endpoint, EndpointSet, ModuleListenerService,
    ModuleRegisterService, NamingKey,
};
use collector_jetty_manager::{JettyManager, JettyManagerService};
use collector_naming::{
    DuplicateNamingHandlerError, ListenerNamingHandler, NamingHandler,
    NamingHandlerRegisterService, NamingHandlerRegistry,
};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

/// Handler with fixed endpoints.
struct Fixed {
    key: NamingKey,
    endpoints: Arc<EndpointSet>,
}

impl Fixed {
    fn new(module: &str, provider: &str, endpoints: Vec<Endpoint>) -> Self {
        Self {
            key: NamingKey::new(module, provider),
            endpoints: Arc::new(EndpointSet::new(1, endpoints)),
        }
    }
}

impl NamingHandler for Fixed {
    fn key(&self) -> &NamingKey {
        &self.key
    }

    fn endpoints(&self) -> Arc<EndpointSet> {
        Arc::clone(&self.endpoints)
    }
}

async fn call(router: axum::Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[test]
fn unknown_key_resolves_to_empty() {
    let registry = NamingHandlerRegistry::new();
    let resolved = registry.resolve("ui", "jetty");
    assert!(resolved.is_empty());
}

#[test]
fn duplicate_key_is_rejected() {
    let registry = NamingHandlerRegistry::new();
    registry
        .register(Arc::new(Fixed::new("ui", "jetty", vec![])))
        .unwrap();
    let err = registry
        .register(Arc::new(Fixed::new("ui", "jetty", vec![])))
        .unwrap_err();
    assert_eq!(err, DuplicateNamingHandlerError(NamingKey::new("ui", "jetty")));
    assert_eq!(registry.keys(), vec![NamingKey::new("ui", "jetty")]);
}

#[tokio::test]
async fn bridge_reports_what_the_listener_last_saw() {
    let cluster = ClusterRegistry::start(Uuid::new_v4()).unwrap();
    let listener = Arc::new(CachingNamingListener::new("ui", "jetty"));
    cluster.add_listener("ui", "jetty", listener.clone());

    let registry = NamingHandlerRegistry::new();
    registry
        .register(Arc::new(ListenerNamingHandler::new(listener)))
        .unwrap();

    // Nothing observed yet: a valid empty answer, not an error.
    assert!(registry.resolve("ui", "jetty").is_empty());

    cluster.register(
        "ui",
        "jetty",
        Endpoint::new("10.0.0.1", 12800).with_context_path("/"),
    );
    tokio::time::timeout(Duration::from_secs(5), async {
        while registry.resolve("ui", "jetty").is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("bridge should observe the registration");

    assert_eq!(
        registry.resolve("ui", "jetty").endpoints(),
        &[Endpoint::new("10.0.0.1", 12800)]
    );
}

#[tokio::test]
async fn attached_server_exposes_existing_and_later_handlers() {
    let jetty = JettyManager::new();
    let server = jetty.get_or_create_if_absent("127.0.0.1", 0, "/").unwrap();
    let registry = NamingHandlerRegistry::new();

    registry
        .register(Arc::new(Fixed::new(
            "ui",
            "jetty",
            vec![Endpoint::new("10.0.0.1", 12800).with_context_path("/ui")],
        )))
        .unwrap();
    registry.attach(Arc::clone(&server)).unwrap();
    registry
        .register(Arc::new(Fixed::new("collector_inside", "grpc", vec![])))
        .unwrap();

    let (status, body) = call(server.router(), Method::GET, "/ui/jetty").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["10.0.0.1:12800/ui"]));

    let (status, body) = call(server.router(), Method::GET, "/collector_inside/grpc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, _) = call(server.router(), Method::POST, "/ui/jetty").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = call(server.router(), Method::GET, "/storage/memory").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
