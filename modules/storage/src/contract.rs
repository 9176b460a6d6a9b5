use serde::{Deserialize, Serialize};

/// A monitored application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub application_id: u32,
    pub application_code: String,
}

/// One running agent instance of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub instance_id: u32,
    pub application_id: u32,
    pub register_time: i64,
    pub heartbeat_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_info: Option<String>,
}

/// Application plus the number of its instances alive in a time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    pub application_id: u32,
    pub application_code: String,
    pub instance_count: usize,
}

/// Read side of the collector storage, as consumed by query modules.
///
/// Times are milliseconds since the Unix epoch.
pub trait DaoService: Send + Sync {
    /// Applications with at least one instance whose heartbeat falls in
    /// `[start_time, end_time]`.
    ///
    /// # Errors
    /// Backend failures.
    fn applications(&self, start_time: i64, end_time: i64)
    -> anyhow::Result<Vec<ApplicationSummary>>;

    /// # Errors
    /// Backend failures.
    fn instance(&self, instance_id: u32) -> anyhow::Result<Option<Instance>>;

    /// Latest heartbeat among all instances, `None` when nothing reported yet.
    ///
    /// # Errors
    /// Backend failures.
    fn last_heartbeat_time(&self) -> anyhow::Result<Option<i64>>;
}
