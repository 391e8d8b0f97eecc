// Point-in-time projections of cluster objects, serialised camelCase for the UI.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::metrics::{NodeUsage, PodUsage};
use crate::quantity::{parse_cpu_to_millicores, parse_memory_to_bytes};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeContext {
    pub name: String,
    pub cluster: String,
    pub user: String,
    pub namespace: Option<String>,
    pub is_active: bool,
    /// API server URL of the context's cluster stanza
    pub server_url: Option<String>,
}

/// How quickly the API server answered a timed namespace listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiLatency {
    Healthy,
    Slow,
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityUnit {
    Millicore,
    Byte,
}

/// A parsed resource quantity. The source string is not retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuantity {
    pub amount: i64,
    pub unit: QuantityUnit,
}

impl ResourceQuantity {
    pub fn cpu(raw: &str) -> Self {
        Self {
            amount: parse_cpu_to_millicores(raw),
            unit: QuantityUnit::Millicore,
        }
    }

    pub fn memory(raw: &str) -> Self {
        Self {
            amount: parse_memory_to_bytes(raw),
            unit: QuantityUnit::Byte,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResources {
    pub cpu: ResourceQuantity,
    pub memory: ResourceQuantity,
    pub pods: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub last_transition_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub name: String,
    /// `Ready`, `NotReady` or `Unknown`, from the node's Ready condition
    pub status: String,
    pub role: String,
    pub internal_ip: Option<String>,
    pub external_ip: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
    pub capacity: Option<NodeResources>,
    pub allocatable: Option<NodeResources>,
    pub conditions: Vec<NodeCondition>,
    pub kubelet_version: Option<String>,
    pub operating_system: Option<String>,
    pub architecture: Option<String>,
    pub container_runtime: Option<String>,
    /// Live usage; only set when metrics-server reported this node
    pub usage: Option<NodeUsage>,
}

impl NodeSnapshot {
    pub fn is_ready(&self) -> bool {
        self.status == "Ready"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSnapshot {
    pub name: String,
    pub image: Option<String>,
    pub ready: bool,
    pub restart_count: i32,
    /// `Running`, `Waiting`, `Terminated` or `Unknown`
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSnapshot {
    pub name: String,
    pub namespace: String,
    pub uid: Option<String>,
    pub phase: String,
    pub pod_ip: Option<String>,
    pub node_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub containers: Vec<ContainerSnapshot>,
    pub labels: BTreeMap<String, String>,
    pub owner: Option<OwnerReference>,
    pub restart_count: i32,
    pub is_ready: bool,
    pub usage: Option<PodUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reason: String,
    pub message: String,
    /// Last time the event was seen
    pub timestamp: DateTime<Utc>,
    pub involved_object_kind: String,
    pub involved_object_name: String,
    pub namespace: String,
    pub count: i32,
}

/// A namespace ResourceQuota: configured limits and current consumption,
/// as raw quantity strings keyed by resource name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuotaSnapshot {
    pub name: String,
    pub hard: BTreeMap<String, String>,
    pub used: BTreeMap<String, String>,
}
