use crate::commands::OBJECT_EVENT_LIMIT;
use crate::error::Result;
use crate::models::k8s::{ClusterEvent, NodeSnapshot, PodSnapshot};
use crate::models::metrics::{MetricsAvailability, NodeUsage};
use crate::projection::{node_snapshot, recent_events};
use crate::state::AppState;

pub async fn list_nodes(state: &AppState) -> Result<Vec<NodeSnapshot>> {
    Ok(state.aggregator.all_nodes().await?.as_ref().clone())
}

pub async fn node_details(state: &AppState, name: &str) -> Result<NodeSnapshot> {
    let node = state.driver.get_node(name).await?;
    let mut snapshot = node_snapshot(&node);
    snapshot.usage = state
        .metrics
        .node_metrics()
        .await
        .available()
        .and_then(|usage| usage.into_iter().find(|u| u.name == name));
    Ok(snapshot)
}

pub async fn node_events(state: &AppState, name: &str) -> Result<Vec<ClusterEvent>> {
    let selector = format!("involvedObject.name={name},involvedObject.kind=Node");
    let events = state.driver.list_events(None, Some(&selector)).await?;
    Ok(recent_events(events, OBJECT_EVENT_LIMIT))
}

pub async fn pods_on_node(state: &AppState, name: &str) -> Result<Vec<PodSnapshot>> {
    let pods = state.aggregator.all_pods().await?;
    Ok(pods
        .iter()
        .filter(|p| p.node_name.as_deref() == Some(name))
        .cloned()
        .collect())
}

pub async fn node_metrics(state: &AppState) -> MetricsAvailability<Vec<NodeUsage>> {
    state.metrics.node_metrics().await
}
