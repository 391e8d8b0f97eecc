//! Live usage from the `metrics.k8s.io` API.
//!
//! metrics-server is an optional add-on. Every read degrades to
//! [`MetricsAvailability::Unavailable`] instead of failing, and malformed
//! entries are skipped individually.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::driver::ClusterDriver;
use crate::models::metrics::{ContainerUsage, MetricsAvailability, NodeUsage, PodUsage};
use crate::quantity::{cpu_millicores_from_json, memory_bytes_from_json};

#[derive(Clone)]
pub struct MetricsGateway {
    driver: Arc<dyn ClusterDriver>,
}

impl MetricsGateway {
    pub fn new(driver: Arc<dyn ClusterDriver>) -> Self {
        Self { driver }
    }

    /// `Available(vec![])` means metrics-server answered with no nodes.
    pub async fn node_metrics(&self) -> MetricsAvailability<Vec<NodeUsage>> {
        match self.driver.raw_node_metrics().await {
            Ok(doc) => MetricsAvailability::Available(parse_node_metrics(&doc)),
            Err(e) => {
                log::warn!(
                    "metrics: node metrics unavailable, is metrics-server installed? ({e})"
                );
                MetricsAvailability::Unavailable
            }
        }
    }

    pub async fn pod_metrics_list(&self) -> MetricsAvailability<Vec<PodUsage>> {
        match self.driver.raw_pod_metrics().await {
            Ok(doc) => MetricsAvailability::Available(parse_pod_metrics(&doc)),
            Err(e) => {
                log::warn!(
                    "metrics: pod metrics unavailable, is metrics-server installed? ({e})"
                );
                MetricsAvailability::Unavailable
            }
        }
    }

    /// `Available(None)` when metrics-server is up but does not report the
    /// pod. Names are compared case-insensitively.
    pub async fn pod_metrics(
        &self,
        namespace: &str,
        name: &str,
    ) -> MetricsAvailability<Option<PodUsage>> {
        self.pod_metrics_list().await.map(|pods| {
            pods.into_iter().find(|p| {
                p.namespace.eq_ignore_ascii_case(namespace) && p.name.eq_ignore_ascii_case(name)
            })
        })
    }
}

fn items(doc: &Value) -> &[Value] {
    doc.get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn metadata_str<'a>(item: &'a Value, field: &str) -> Option<&'a str> {
    item.get("metadata")?.get(field)?.as_str()
}

fn usage_of(item: &Value) -> (i64, i64) {
    let Some(usage) = item.get("usage") else {
        return (0, 0);
    };
    let cpu = usage.get("cpu").map_or(0, cpu_millicores_from_json);
    let memory = usage.get("memory").map_or(0, memory_bytes_from_json);
    (cpu, memory)
}

pub fn parse_node_metrics(doc: &Value) -> Vec<NodeUsage> {
    items(doc)
        .iter()
        .filter_map(|item| {
            let name = metadata_str(item, "name").filter(|n| !n.is_empty())?;
            let (cpu_millicores, memory_bytes) = usage_of(item);
            Some(NodeUsage {
                name: name.to_string(),
                cpu_millicores,
                memory_bytes,
            })
        })
        .collect()
}

pub fn parse_pod_metrics(doc: &Value) -> Vec<PodUsage> {
    items(doc).iter().filter_map(parse_single_pod).collect()
}

fn parse_single_pod(item: &Value) -> Option<PodUsage> {
    let name = metadata_str(item, "name").filter(|n| !n.is_empty())?;
    let namespace = metadata_str(item, "namespace").unwrap_or_default();

    let containers: Vec<ContainerUsage> = item
        .get("containers")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .map(|c| {
                    let (cpu_millicores, memory_bytes) = usage_of(c);
                    ContainerUsage {
                        name: c.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                        cpu_millicores,
                        memory_bytes,
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let timestamp = item
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Some(PodUsage {
        name: name.to_string(),
        namespace: namespace.to_string(),
        total_cpu_millicores: containers.iter().map(|c| c.cpu_millicores).sum(),
        total_memory_bytes: containers.iter().map(|c| c.memory_bytes).sum(),
        containers,
        timestamp,
    })
}
