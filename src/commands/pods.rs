use crate::cache::{namespace_pods_key, SnapshotCache, ALL_PODS_KEY, CLUSTER_INFO_KEY};
use crate::commands::{namespace_scope, OBJECT_EVENT_LIMIT};
use crate::driver::LogRequest;
use crate::error::Result;
use crate::models::k8s::{ClusterEvent, PodSnapshot};
use crate::models::metrics::{MetricsAvailability, PodUsage};
use crate::models::restart::RestartResult;
use crate::projection::{pod_snapshot, recent_events};
use crate::restart::restart_with_preservation;
use crate::state::AppState;

/// Lists pods in `namespace`, or in all namespaces when it is `None`, empty
/// or `"all"`.
pub async fn list_pods(state: &AppState, namespace: Option<&str>) -> Result<Vec<PodSnapshot>> {
    let pods = match namespace_scope(namespace) {
        Some(ns) => state.aggregator.pods_in_namespace(ns).await?,
        None => state.aggregator.all_pods().await?,
    };
    Ok(pods.as_ref().clone())
}

/// Fresh read of one pod, with live usage attached when metrics-server has it.
pub async fn pod_details(state: &AppState, namespace: &str, name: &str) -> Result<PodSnapshot> {
    let pod = state.driver.get_pod(namespace, name).await?;
    let mut snapshot = pod_snapshot(&pod);
    snapshot.usage = state.metrics.pod_metrics(namespace, name).await.available().flatten();
    Ok(snapshot)
}

pub async fn pod_logs(
    state: &AppState,
    namespace: &str,
    name: &str,
    container: Option<&str>,
    tail_lines: Option<i64>,
    previous: bool,
) -> Result<String> {
    let request = LogRequest {
        container: container.filter(|c| !c.is_empty()).map(str::to_string),
        tail_lines,
        previous,
    };
    state.driver.pod_logs(namespace, name, &request).await
}

pub async fn pod_events(
    state: &AppState,
    namespace: &str,
    name: &str,
) -> Result<Vec<ClusterEvent>> {
    let selector = format!("involvedObject.name={name},involvedObject.kind=Pod");
    let events = state
        .driver
        .list_events(Some(namespace), Some(&selector))
        .await?;
    Ok(recent_events(events, OBJECT_EVENT_LIMIT))
}

pub async fn pod_metrics(
    state: &AppState,
    namespace: &str,
    name: &str,
) -> MetricsAvailability<Option<PodUsage>> {
    state.metrics.pod_metrics(namespace, name).await
}

pub async fn delete_pod(state: &AppState, namespace: &str, name: &str) -> Result<()> {
    state.driver.delete_pod(namespace, name).await?;
    log::info!("pods: deleted {namespace}/{name}");
    invalidate_pod_views(&state.cache, namespace);
    Ok(())
}

/// Deletes the pod after saving its logs. See [`restart_with_preservation`].
pub async fn restart_pod(state: &AppState, namespace: &str, name: &str) -> RestartResult {
    let result =
        restart_with_preservation(state.driver.as_ref(), namespace, name, state.restart_options())
            .await;
    if result.success {
        invalidate_pod_views(&state.cache, namespace);
    }
    result
}

fn invalidate_pod_views(cache: &SnapshotCache, namespace: &str) {
    cache.invalidate(ALL_PODS_KEY);
    cache.invalidate(&namespace_pods_key(namespace));
    cache.invalidate(CLUSTER_INFO_KEY);
}
