use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::k8s::ClusterEvent;

/// Cluster verdict. No tier above `Warning` exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Warning,
}

impl HealthStatus {
    /// First matching rule wins: any failed pod, then more than 10% of pods
    /// pending, then any node not ready.
    pub fn evaluate(
        failed_pods: usize,
        pending_pods: usize,
        total_pods: usize,
        ready_nodes: usize,
        total_nodes: usize,
    ) -> Self {
        if failed_pods > 0 {
            return Self::Warning;
        }
        if pending_pods as f64 > total_pods as f64 * 0.1 {
            return Self::Warning;
        }
        if ready_nodes < total_nodes {
            return Self::Warning;
        }
        Self::Healthy
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => f.write_str("Healthy"),
            Self::Warning => f.write_str("Warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespacePodCount {
    pub namespace: String,
    pub pod_count: usize,
    pub running_pods: usize,
    pub failed_pods: usize,
}

/// Capacity comes from node objects, usage from metrics-server. Usage fields
/// are `None` when metrics are unavailable, never zero-filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsageSummary {
    pub total_cpu_millicores: i64,
    pub total_memory_bytes: i64,
    pub used_cpu_millicores: Option<i64>,
    pub used_memory_bytes: Option<i64>,
    pub cpu_usage_percentage: Option<f64>,
    pub memory_usage_percentage: Option<f64>,
    pub metrics_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub health_status: HealthStatus,
    pub total_nodes: usize,
    pub ready_nodes: usize,
    pub total_pods: usize,
    pub running_pods: usize,
    pub pending_pods: usize,
    pub failed_pods: usize,
    pub total_namespaces: usize,
    pub pod_status_breakdown: BTreeMap<String, usize>,
    pub node_status_breakdown: BTreeMap<String, usize>,
    pub namespace_pod_distribution: Vec<NamespacePodCount>,
    pub recent_events: Vec<ClusterEvent>,
    pub resource_usage: ResourceUsageSummary,
    pub last_updated: DateTime<Utc>,
}
