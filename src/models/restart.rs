use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of a restart-with-log-preservation run.
///
/// Returned even when the restart failed; captured logs survive a failed delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartResult {
    /// True once the pod deletion was accepted
    pub success: bool,
    pub pod_name: String,
    pub namespace: String,
    pub restart_timestamp: DateTime<Utc>,
    pub previous_pod_uid: Option<String>,
    pub new_pod_uid: Option<String>,
    /// Default-container logs captured before deletion
    pub pre_restart_logs: String,
    pub container_pre_restart_logs: BTreeMap<String, String>,
    pub error_message: Option<String>,
}

impl RestartResult {
    pub fn started(namespace: &str, pod_name: &str) -> Self {
        Self {
            success: false,
            pod_name: pod_name.to_string(),
            namespace: namespace.to_string(),
            restart_timestamp: Utc::now(),
            previous_pod_uid: None,
            new_pod_uid: None,
            pre_restart_logs: String::new(),
            container_pre_restart_logs: BTreeMap::new(),
            error_message: None,
        }
    }
}
