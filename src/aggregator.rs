//! Builds the dashboard snapshot from cached cluster reads.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use crate::cache::{
    namespace_pods_key, SnapshotCache, ALL_NAMESPACES_KEY, ALL_NODES_KEY, ALL_PODS_KEY,
    CLUSTER_INFO_KEY,
};
use crate::config::DashboardSettings;
use crate::driver::ClusterDriver;
use crate::error::Result;
use crate::metrics::MetricsGateway;
use crate::models::dashboard::{
    DashboardSnapshot, HealthStatus, NamespacePodCount, ResourceUsageSummary,
};
use crate::models::k8s::{ClusterEvent, NodeSnapshot, PodSnapshot};
use crate::models::metrics::{MetricsAvailability, NodeUsage};
use crate::projection::{node_snapshot, pod_snapshot, recent_events};

#[derive(Clone)]
pub struct ClusterAggregator {
    driver: Arc<dyn ClusterDriver>,
    cache: Arc<SnapshotCache>,
    metrics: MetricsGateway,
    settings: DashboardSettings,
}

impl ClusterAggregator {
    pub fn new(
        driver: Arc<dyn ClusterDriver>,
        cache: Arc<SnapshotCache>,
        metrics: MetricsGateway,
        settings: DashboardSettings,
    ) -> Self {
        Self {
            driver,
            cache,
            metrics,
            settings,
        }
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub async fn snapshot(&self) -> Result<Arc<DashboardSnapshot>> {
        self.cache
            .get_or_fetch(CLUSTER_INFO_KEY, || async {
                self.build_snapshot().await.map(Arc::new).map_err(|e| {
                    log::error!("dashboard: failed to build cluster snapshot: {e}");
                    e
                })
            })
            .await
    }

    pub async fn all_nodes(&self) -> Result<Arc<Vec<NodeSnapshot>>> {
        self.cache
            .get_or_fetch(ALL_NODES_KEY, || async {
                let nodes = self.driver.list_nodes().await?;
                Ok(Arc::new(nodes.iter().map(node_snapshot).collect()))
            })
            .await
    }

    pub async fn all_pods(&self) -> Result<Arc<Vec<PodSnapshot>>> {
        self.cache
            .get_or_fetch(ALL_PODS_KEY, || async {
                let pods = self.driver.list_pods(None).await?;
                Ok(Arc::new(pods.iter().map(pod_snapshot).collect()))
            })
            .await
    }

    pub async fn pods_in_namespace(&self, namespace: &str) -> Result<Arc<Vec<PodSnapshot>>> {
        self.cache
            .get_or_fetch(&namespace_pods_key(namespace), || async {
                let pods = self.driver.list_pods(Some(namespace)).await?;
                Ok(Arc::new(pods.iter().map(pod_snapshot).collect()))
            })
            .await
    }

    pub async fn all_namespaces(&self) -> Result<Arc<Vec<String>>> {
        self.cache
            .get_or_fetch(ALL_NAMESPACES_KEY, || async {
                let namespaces = self.driver.list_namespaces().await?;
                Ok(Arc::new(
                    namespaces
                        .into_iter()
                        .filter_map(|ns| ns.metadata.name)
                        .collect(),
                ))
            })
            .await
    }

    /// Newest `count` events across all namespaces. Event reads are not
    /// essential to the snapshot, so failures yield an empty list.
    pub async fn recent_events(&self, count: usize) -> Vec<ClusterEvent> {
        match self.driver.list_events(None, None).await {
            Ok(events) => recent_events(events, count),
            Err(e) => {
                log::error!("dashboard: failed to list recent events: {e}");
                Vec::new()
            }
        }
    }

    async fn build_snapshot(&self) -> Result<DashboardSnapshot> {
        let nodes = self.all_nodes().await?;
        let pods = self.all_pods().await?;
        let namespaces = self.all_namespaces().await?;

        let total_nodes = nodes.len();
        let ready_nodes = nodes.iter().filter(|n| n.is_ready()).count();
        let total_pods = pods.len();
        let running_pods = count_phase(&pods, "Running");
        let pending_pods = count_phase(&pods, "Pending");
        let failed_pods = count_phase(&pods, "Failed");

        let node_usage = self.metrics.node_metrics().await;

        Ok(DashboardSnapshot {
            health_status: HealthStatus::evaluate(
                failed_pods,
                pending_pods,
                total_pods,
                ready_nodes,
                total_nodes,
            ),
            total_nodes,
            ready_nodes,
            total_pods,
            running_pods,
            pending_pods,
            failed_pods,
            total_namespaces: namespaces.len(),
            pod_status_breakdown: breakdown(pods.iter().map(|p| p.phase.as_str())),
            node_status_breakdown: breakdown(nodes.iter().map(|n| n.status.as_str())),
            namespace_pod_distribution: rank_namespaces(
                &namespaces,
                &pods,
                self.settings.top_namespaces,
            ),
            recent_events: self.recent_events(self.settings.recent_events).await,
            resource_usage: summarize_usage(&nodes, node_usage.as_ref()),
            last_updated: Utc::now(),
        })
    }
}

fn count_phase(pods: &[PodSnapshot], phase: &str) -> usize {
    pods.iter().filter(|p| p.phase == phase).count()
}

fn breakdown<'a>(keys: impl Iterator<Item = &'a str>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Namespaces with at least one pod, by pod count descending, ties broken by
/// namespace name ascending.
pub fn rank_namespaces(
    namespaces: &[String],
    pods: &[PodSnapshot],
    limit: usize,
) -> Vec<NamespacePodCount> {
    let mut ranking: Vec<NamespacePodCount> = namespaces
        .iter()
        .map(|ns| namespace_pod_count(ns, pods.iter().filter(|p| &p.namespace == ns)))
        .filter(|c| c.pod_count > 0)
        .collect();

    ranking.sort_by(|a, b| {
        b.pod_count
            .cmp(&a.pod_count)
            .then_with(|| a.namespace.cmp(&b.namespace))
    });
    ranking.truncate(limit);
    ranking
}

pub fn namespace_pod_count<'a>(
    namespace: &str,
    pods: impl Iterator<Item = &'a PodSnapshot>,
) -> NamespacePodCount {
    let mut count = NamespacePodCount {
        namespace: namespace.to_string(),
        pod_count: 0,
        running_pods: 0,
        failed_pods: 0,
    };
    for pod in pods {
        count.pod_count += 1;
        match pod.phase.as_str() {
            "Running" => count.running_pods += 1,
            "Failed" => count.failed_pods += 1,
            _ => {}
        }
    }
    count
}

/// Capacity totals from node objects; usage from metrics-server, left empty
/// when it is unavailable.
pub fn summarize_usage(
    nodes: &[NodeSnapshot],
    usage: MetricsAvailability<&Vec<NodeUsage>>,
) -> ResourceUsageSummary {
    let total_cpu: i64 = nodes
        .iter()
        .filter_map(|n| n.capacity.as_ref())
        .map(|c| c.cpu.amount)
        .sum();
    let total_memory: i64 = nodes
        .iter()
        .filter_map(|n| n.capacity.as_ref())
        .map(|c| c.memory.amount)
        .sum();

    let used = usage.available().map(|usage| {
        let cpu: i64 = usage.iter().map(|u| u.cpu_millicores).sum();
        let memory: i64 = usage.iter().map(|u| u.memory_bytes).sum();
        (cpu, memory)
    });

    ResourceUsageSummary {
        total_cpu_millicores: total_cpu,
        total_memory_bytes: total_memory,
        used_cpu_millicores: used.map(|(cpu, _)| cpu),
        used_memory_bytes: used.map(|(_, memory)| memory),
        cpu_usage_percentage: used.map(|(cpu, _)| percentage(cpu, total_cpu)),
        memory_usage_percentage: used.map(|(_, memory)| percentage(memory, total_memory)),
        metrics_available: used.is_some(),
    }
}

fn percentage(used: i64, total: i64) -> f64 {
    if total > 0 {
        used as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}
