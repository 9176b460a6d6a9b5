//! Query handlers mounted on the UI server.

use std::sync::Arc;

use async_trait::async_trait;
use collector_jetty_manager::{HandlerError, JettyHandler, JettyRequest};
use collector_storage::DaoService;
use http::Method;
use serde_json::{Value, json};

fn ensure_get(request: &JettyRequest) -> Result<(), HandlerError> {
    if request.method == Method::GET {
        Ok(())
    } else {
        Err(HandlerError::MethodNotAllowed(request.method.clone()))
    }
}

fn required_param<T: std::str::FromStr>(
    request: &JettyRequest,
    key: &str,
) -> Result<T, HandlerError> {
    request
        .parsed_param(key)?
        .ok_or_else(|| HandlerError::BadRequest(format!("missing query parameter '{key}'")))
}

/// Every handler the UI serves, bound to `dao`.
#[must_use]
pub fn all(dao: &Arc<dyn DaoService>) -> Vec<Arc<dyn JettyHandler>> {
    vec![
        Arc::new(ApplicationsGetHandler::new(Arc::clone(dao))),
        Arc::new(AllInstanceLastTimeGetHandler::new(Arc::clone(dao))),
        Arc::new(OneInstanceLastTimeGetHandler::new(Arc::clone(dao))),
        Arc::new(InstanceOsInfoGetHandler::new(Arc::clone(dao))),
    ]
}

/// `GET /applications?startTime=..&endTime=..`
pub struct ApplicationsGetHandler {
    dao: Arc<dyn DaoService>,
}

impl ApplicationsGetHandler {
    #[must_use]
    pub fn new(dao: Arc<dyn DaoService>) -> Self {
        Self { dao }
    }
}

#[async_trait]
impl JettyHandler for ApplicationsGetHandler {
    fn path(&self) -> &str {
        "/applications"
    }

    async fn handle(&self, request: JettyRequest) -> Result<Value, HandlerError> {
        ensure_get(&request)?;
        let start_time: i64 = required_param(&request, "startTime")?;
        let end_time: i64 = required_param(&request, "endTime")?;
        if start_time > end_time {
            return Err(HandlerError::BadRequest(
                "startTime must not be after endTime".to_owned(),
            ));
        }
        let applications = self.dao.applications(start_time, end_time)?;
        serde_json::to_value(applications).map_err(|e| HandlerError::Internal(e.into()))
    }
}

/// `GET /time/allInstance`: latest heartbeat across all instances.
pub struct AllInstanceLastTimeGetHandler {
    dao: Arc<dyn DaoService>,
}

impl AllInstanceLastTimeGetHandler {
    #[must_use]
    pub fn new(dao: Arc<dyn DaoService>) -> Self {
        Self { dao }
    }
}

#[async_trait]
impl JettyHandler for AllInstanceLastTimeGetHandler {
    fn path(&self) -> &str {
        "/time/allInstance"
    }

    async fn handle(&self, request: JettyRequest) -> Result<Value, HandlerError> {
        ensure_get(&request)?;
        Ok(json!({ "time": self.dao.last_heartbeat_time()? }))
    }
}

/// `GET /time/oneInstance?instanceId=..`
pub struct OneInstanceLastTimeGetHandler {
    dao: Arc<dyn DaoService>,
}

impl OneInstanceLastTimeGetHandler {
    #[must_use]
    pub fn new(dao: Arc<dyn DaoService>) -> Self {
        Self { dao }
    }
}

#[async_trait]
impl JettyHandler for OneInstanceLastTimeGetHandler {
    fn path(&self) -> &str {
        "/time/oneInstance"
    }

    async fn handle(&self, request: JettyRequest) -> Result<Value, HandlerError> {
        ensure_get(&request)?;
        let instance_id: u32 = required_param(&request, "instanceId")?;
        let instance = self
            .dao
            .instance(instance_id)?
            .ok_or_else(|| HandlerError::NotFound(format!("instance {instance_id} not found")))?;
        Ok(json!({ "time": instance.heartbeat_time }))
    }
}

/// `GET /instance/os/instanceId?instanceId=..`
pub struct InstanceOsInfoGetHandler {
    dao: Arc<dyn DaoService>,
}

impl InstanceOsInfoGetHandler {
    #[must_use]
    pub fn new(dao: Arc<dyn DaoService>) -> Self {
        Self { dao }
    }
}

#[async_trait]
impl JettyHandler for InstanceOsInfoGetHandler {
    fn path(&self) -> &str {
        "/instance/os/instanceId"
    }

    async fn handle(&self, request: JettyRequest) -> Result<Value, HandlerError> {
        ensure_get(&request)?;
        let instance_id: u32 = required_param(&request, "instanceId")?;
        let instance = self
            .dao
            .instance(instance_id)?
            .ok_or_else(|| HandlerError::NotFound(format!("instance {instance_id} not found")))?;
        Ok(json!({
            "instanceId": instance.instance_id,
            "applicationId": instance.application_id,
            "osInfo": instance.os_info,
        }))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use collector_storage::{Application, Instance, MemoryDao};

    fn dao() -> Arc<dyn DaoService> {
        let dao = MemoryDao::new();
        dao.upsert_application(Application {
            application_id: 2,
            application_code: "portal".to_owned(),
        });
        dao.upsert_instance(Instance {
            instance_id: 7,
            application_id: 2,
            register_time: 10,
            heartbeat_time: 500,
            os_info: Some("linux".to_owned()),
        });
        Arc::new(dao)
    }

    #[tokio::test]
    async fn applications_require_a_valid_window() {
        let handler = ApplicationsGetHandler::new(dao());

        let missing = handler
            .handle(JettyRequest::get("/applications").with_query("startTime", "0"))
            .await
            .unwrap_err();
        assert!(matches!(missing, HandlerError::BadRequest(_)));

        let malformed = handler
            .handle(
                JettyRequest::get("/applications")
                    .with_query("startTime", "yesterday")
                    .with_query("endTime", "1000"),
            )
            .await
            .unwrap_err();
        assert!(matches!(malformed, HandlerError::BadRequest(_)));

        let inverted = handler
            .handle(
                JettyRequest::get("/applications")
                    .with_query("startTime", "1000")
                    .with_query("endTime", "0"),
            )
            .await
            .unwrap_err();
        assert!(matches!(inverted, HandlerError::BadRequest(_)));

        let listed = handler
            .handle(
                JettyRequest::get("/applications")
                    .with_query("startTime", "0")
                    .with_query("endTime", "1000"),
            )
            .await
            .unwrap();
        assert_eq!(
            listed,
            json!([{ "applicationId": 2, "applicationCode": "portal", "instanceCount": 1 }])
        );
    }

    #[tokio::test]
    async fn unknown_instance_is_not_found() {
        let handler = OneInstanceLastTimeGetHandler::new(dao());
        let err = handler
            .handle(JettyRequest::get("/time/oneInstance").with_query("instanceId", "99"))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::NotFound(_)));

        let found = handler
            .handle(JettyRequest::get("/time/oneInstance").with_query("instanceId", "7"))
            .await
            .unwrap();
        assert_eq!(found, json!({ "time": 500 }));
    }

    #[tokio::test]
    async fn os_info_and_last_time() {
        let os = InstanceOsInfoGetHandler::new(dao())
            .handle(JettyRequest::get("/instance/os/instanceId").with_query("instanceId", "7"))
            .await
            .unwrap();
        assert_eq!(os["osInfo"], "linux");

        let last = AllInstanceLastTimeGetHandler::new(Arc::new(MemoryDao::new()))
            .handle(JettyRequest::get("/time/allInstance"))
            .await
            .unwrap();
        assert_eq!(last, json!({ "time": null }));
    }

    #[tokio::test]
    async fn only_get_is_served() {
        let mut request = JettyRequest::get("/time/allInstance");
        request.method = Method::DELETE;
        let err = AllInstanceLastTimeGetHandler::new(dao())
            .handle(request)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::MethodNotAllowed(_)));
    }
}
