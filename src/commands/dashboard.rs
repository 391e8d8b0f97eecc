use crate::error::Result;
use crate::models::dashboard::{DashboardSnapshot, ResourceUsageSummary};
use crate::state::AppState;

pub async fn dashboard_overview(state: &AppState) -> Result<DashboardSnapshot> {
    let snapshot = state.aggregator.snapshot().await?;
    Ok(snapshot.as_ref().clone())
}

pub async fn resource_usage(state: &AppState) -> Result<ResourceUsageSummary> {
    let snapshot = state.aggregator.snapshot().await?;
    Ok(snapshot.resource_usage.clone())
}

/// `Healthy` or `Warning`, or `Unknown` when the cluster cannot be read.
pub async fn cluster_health_status(state: &AppState) -> String {
    match state.aggregator.snapshot().await {
        Ok(snapshot) => snapshot.health_status.to_string(),
        Err(e) => {
            log::error!("dashboard: health status unavailable: {e}");
            "Unknown".to_string()
        }
    }
}
