use crate::aggregator::namespace_pod_count;
use crate::commands::{namespace_scope, OBJECT_EVENT_LIMIT};
use crate::error::{Error, Result};
use crate::models::dashboard::NamespacePodCount;
use crate::models::k8s::{ClusterEvent, ResourceQuotaSnapshot};
use crate::projection::{recent_events, resource_quota_snapshot};
use crate::state::AppState;

pub async fn list_namespaces(state: &AppState) -> Result<Vec<String>> {
    Ok(state.aggregator.all_namespaces().await?.as_ref().clone())
}

pub async fn namespace_details(state: &AppState, namespace: &str) -> Result<NamespacePodCount> {
    let namespaces = state.aggregator.all_namespaces().await?;
    if !namespaces.iter().any(|ns| ns == namespace) {
        return Err(Error::NotFound(format!("namespace {namespace}")));
    }
    let pods = state.aggregator.pods_in_namespace(namespace).await?;
    Ok(namespace_pod_count(namespace, pods.iter()))
}

/// Newest events of one namespace, or of the whole cluster for `"all"`.
pub async fn namespace_events(state: &AppState, namespace: &str) -> Result<Vec<ClusterEvent>> {
    let events = state
        .driver
        .list_events(namespace_scope(Some(namespace)), None)
        .await?;
    Ok(recent_events(events, OBJECT_EVENT_LIMIT))
}

/// Quotas defined in `namespace`. A failed read is logged and shows as no
/// quotas, so the namespace view still renders.
pub async fn namespace_resource_quotas(
    state: &AppState,
    namespace: &str,
) -> Vec<ResourceQuotaSnapshot> {
    match state.driver.list_resource_quotas(namespace).await {
        Ok(quotas) => quotas.iter().map(resource_quota_snapshot).collect(),
        Err(e) => {
            log::warn!("namespaces: cannot read resource quotas of {namespace}: {e}");
            Vec::new()
        }
    }
}
