//! The narrow interface through which the core talks to a cluster.

pub mod client;
pub mod kubectl;

use std::io;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Event, Namespace, Node, Pod, ResourceQuota};
use tokio::io::AsyncRead;

use crate::error::Result;

pub use self::client::KubeDriver;
pub use self::kubectl::Kubectl;

/// Options for a one-shot log read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogRequest {
    pub container: Option<String>,
    pub tail_lines: Option<i64>,
    pub previous: bool,
}

/// Control half of a running log-follow process.
#[async_trait]
pub trait ProcessHandle: Send {
    /// Terminates the process and reaps it.
    async fn kill(&mut self) -> io::Result<()>;

    /// Waits for a natural exit, returning the exit code if there is one.
    async fn wait(&mut self) -> io::Result<Option<i32>>;
}

/// A live `logs --follow` process: its two output pipes plus its handle.
pub struct LogProcess {
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    pub stderr: Box<dyn AsyncRead + Send + Unpin>,
    pub handle: Box<dyn ProcessHandle>,
}

#[async_trait]
pub trait ClusterDriver: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    async fn get_node(&self, name: &str) -> Result<Node>;

    /// Lists pods in `namespace`, or in every namespace when `None`.
    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>>;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod>;

    async fn list_namespaces(&self) -> Result<Vec<Namespace>>;

    /// Lists events sorted by last-seen time, oldest first.
    async fn list_events(
        &self,
        namespace: Option<&str>,
        field_selector: Option<&str>,
    ) -> Result<Vec<Event>>;

    async fn pod_logs(&self, namespace: &str, pod: &str, request: &LogRequest) -> Result<String>;

    async fn follow_pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: i64,
    ) -> Result<LogProcess>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()>;

    async fn list_resource_quotas(&self, namespace: &str) -> Result<Vec<ResourceQuota>>;

    /// Raw `metrics.k8s.io` NodeMetricsList document.
    async fn raw_node_metrics(&self) -> Result<serde_json::Value>;

    /// Raw `metrics.k8s.io` PodMetricsList document, all namespaces.
    async fn raw_pod_metrics(&self) -> Result<serde_json::Value>;
}
