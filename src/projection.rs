// Maps raw API objects onto the dashboard's snapshot types.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStatus, Event, Node, NodeAddress, Pod, ResourceQuota,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::models::k8s::{
    ClusterEvent, ContainerSnapshot, NodeCondition, NodeResources, NodeSnapshot, OwnerReference,
    PodSnapshot, ResourceQuantity, ResourceQuotaSnapshot,
};

const CONTROL_PLANE_LABEL: &str = "node-role.kubernetes.io/control-plane";

pub fn node_snapshot(node: &Node) -> NodeSnapshot {
    let status = node.status.as_ref();
    let conditions = status
        .and_then(|s| s.conditions.as_ref())
        .map(Vec::as_slice)
        .unwrap_or_default();
    let labels = node.metadata.labels.clone().unwrap_or_default();
    let addresses = status
        .and_then(|s| s.addresses.as_ref())
        .map(Vec::as_slice)
        .unwrap_or_default();
    let info = status.and_then(|s| s.node_info.as_ref());

    let ready = conditions.iter().find(|c| c.type_ == "Ready");
    let node_status = match ready.map(|c| c.status.as_str()) {
        Some("True") => "Ready",
        Some("False") => "NotReady",
        _ => "Unknown",
    };

    NodeSnapshot {
        name: node.metadata.name.clone().unwrap_or_default(),
        status: node_status.to_string(),
        role: if labels.contains_key(CONTROL_PLANE_LABEL) {
            "control-plane".to_string()
        } else {
            "worker".to_string()
        },
        internal_ip: address_of(addresses, "InternalIP"),
        external_ip: address_of(addresses, "ExternalIP"),
        created_at: node.metadata.creation_timestamp.as_ref().map(|t| t.0),
        labels,
        capacity: status.and_then(|s| s.capacity.as_ref()).map(node_resources),
        allocatable: status.and_then(|s| s.allocatable.as_ref()).map(node_resources),
        conditions: conditions
            .iter()
            .map(|c| NodeCondition {
                condition_type: c.type_.clone(),
                status: c.status.clone(),
                reason: c.reason.clone(),
                message: c.message.clone(),
                last_transition_time: c.last_transition_time.as_ref().map(|t| t.0),
            })
            .collect(),
        kubelet_version: info.map(|i| i.kubelet_version.clone()),
        operating_system: info.map(|i| i.operating_system.clone()),
        architecture: info.map(|i| i.architecture.clone()),
        container_runtime: info.map(|i| i.container_runtime_version.clone()),
        usage: None,
    }
}

fn address_of(addresses: &[NodeAddress], kind: &str) -> Option<String> {
    addresses
        .iter()
        .find(|a| a.type_ == kind)
        .map(|a| a.address.clone())
}

fn node_resources(resources: &BTreeMap<String, Quantity>) -> NodeResources {
    let raw = |key: &str| resources.get(key).map(|q| q.0.as_str()).unwrap_or_default();
    NodeResources {
        cpu: ResourceQuantity::cpu(raw("cpu")),
        memory: ResourceQuantity::memory(raw("memory")),
        pods: resources.get("pods").and_then(|q| q.0.trim().parse().ok()),
    }
}

pub fn pod_snapshot(pod: &Pod) -> PodSnapshot {
    let statuses = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .map(Vec::as_slice)
        .unwrap_or_default();

    let containers = pod
        .spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .map(|c| {
                    let status = statuses.iter().find(|s| s.name == c.name);
                    ContainerSnapshot {
                        name: c.name.clone(),
                        image: c.image.clone(),
                        ready: status.is_some_and(|s| s.ready),
                        restart_count: status.map_or(0, |s| s.restart_count),
                        state: container_state(status),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    PodSnapshot {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        uid: pod.metadata.uid.clone(),
        phase: pod
            .status
            .as_ref()
            .and_then(|s| s.phase.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        pod_ip: pod.status.as_ref().and_then(|s| s.pod_ip.clone()),
        node_name: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
        created_at: pod.metadata.creation_timestamp.as_ref().map(|t| t.0),
        containers,
        labels: pod.metadata.labels.clone().unwrap_or_default(),
        owner: pod
            .metadata
            .owner_references
            .as_ref()
            .and_then(|refs| refs.first())
            .map(|r| OwnerReference {
                kind: r.kind.clone(),
                name: r.name.clone(),
            }),
        restart_count: statuses.iter().map(|s| s.restart_count).sum(),
        is_ready: !statuses.is_empty() && statuses.iter().all(|s| s.ready),
        usage: None,
    }
}

fn container_state(status: Option<&ContainerStatus>) -> String {
    match status.and_then(|s| s.state.as_ref()) {
        Some(ContainerState { running: Some(_), .. }) => "Running",
        Some(ContainerState { terminated: Some(_), .. }) => "Terminated",
        Some(ContainerState { waiting: Some(_), .. }) => "Waiting",
        _ => "Unknown",
    }
    .to_string()
}

/// Last-seen time of an event, falling back through the older timestamp
/// fields; epoch when the event carries none.
pub fn event_last_seen(event: &Event) -> DateTime<Utc> {
    event
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.event_time.as_ref().map(|t| t.0))
        .or_else(|| event.first_timestamp.as_ref().map(|t| t.0))
        .or_else(|| event.metadata.creation_timestamp.as_ref().map(|t| t.0))
        .unwrap_or_default()
}

pub fn cluster_event(event: &Event) -> ClusterEvent {
    let involved = &event.involved_object;
    ClusterEvent {
        event_type: event.type_.clone().unwrap_or_default(),
        reason: event.reason.clone().unwrap_or_default(),
        message: event.message.clone().unwrap_or_default(),
        timestamp: event_last_seen(event),
        involved_object_kind: involved.kind.clone().unwrap_or_default(),
        involved_object_name: involved.name.clone().unwrap_or_default(),
        namespace: involved
            .namespace
            .clone()
            .or_else(|| event.metadata.namespace.clone())
            .unwrap_or_default(),
        count: event.count.unwrap_or(1),
    }
}

/// Most recent `count` events, newest first.
pub fn recent_events(mut events: Vec<Event>, count: usize) -> Vec<ClusterEvent> {
    events.sort_by_key(|e| std::cmp::Reverse(event_last_seen(e)));
    events.iter().take(count).map(cluster_event).collect()
}

fn quantity_strings(map: Option<&BTreeMap<String, Quantity>>) -> BTreeMap<String, String> {
    map.map(|m| m.iter().map(|(k, v)| (k.clone(), v.0.clone())).collect())
        .unwrap_or_default()
}

pub fn resource_quota_snapshot(quota: &ResourceQuota) -> ResourceQuotaSnapshot {
    ResourceQuotaSnapshot {
        name: quota.metadata.name.clone().unwrap_or_default(),
        hard: quantity_strings(quota.spec.as_ref().and_then(|s| s.hard.as_ref())),
        used: quantity_strings(quota.status.as_ref().and_then(|s| s.used.as_ref())),
    }
}
