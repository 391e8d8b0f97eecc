use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Event, Namespace, Node, Pod, ResourceQuota};
use kube::api::{Api, DeleteParams, ListParams, LogParams};
use kube::Client;

use crate::driver::{ClusterDriver, Kubectl, LogProcess, LogRequest};
use crate::error::Result;
use crate::projection::event_last_seen;

const NODE_METRICS_PATH: &str = "/apis/metrics.k8s.io/v1beta1/nodes";
const POD_METRICS_PATH: &str = "/apis/metrics.k8s.io/v1beta1/pods";

/// Cluster driver backed by kube-rs for API reads/writes and kubectl for
/// log follows.
#[derive(Clone)]
pub struct KubeDriver {
    client: Client,
    kubectl: Kubectl,
}

impl KubeDriver {
    pub fn new(client: Client, kubectl: Kubectl) -> Self {
        Self { client, kubectl }
    }

    pub fn kubectl(&self) -> &Kubectl {
        &self.kubectl
    }

    fn pods(&self, namespace: Option<&str>) -> Api<Pod> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    async fn raw_get(&self, path: &str) -> Result<serde_json::Value> {
        let request = http::Request::get(path).body(Vec::new())?;
        Ok(self.client.request::<serde_json::Value>(request).await?)
    }
}

#[async_trait]
impl ClusterDriver for KubeDriver {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_node(&self, name: &str) -> Result<Node> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.get(name).await?)
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>> {
        Ok(self.pods(namespace).list(&ListParams::default()).await?.items)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        Ok(self.pods(Some(namespace)).get(name).await?)
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_events(
        &self,
        namespace: Option<&str>,
        field_selector: Option<&str>,
    ) -> Result<Vec<Event>> {
        let api: Api<Event> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let mut params = ListParams::default();
        if let Some(selector) = field_selector {
            params = params.fields(selector);
        }

        let mut events = api.list(&params).await?.items;
        events.sort_by_key(event_last_seen);
        Ok(events)
    }

    async fn pod_logs(&self, namespace: &str, pod: &str, request: &LogRequest) -> Result<String> {
        let params = LogParams {
            container: request.container.clone(),
            tail_lines: request.tail_lines,
            previous: request.previous,
            ..LogParams::default()
        };
        Ok(self.pods(Some(namespace)).logs(pod, &params).await?)
    }

    async fn follow_pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: i64,
    ) -> Result<LogProcess> {
        self.kubectl.follow_logs(namespace, pod, container, tail_lines)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        self.pods(Some(namespace))
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn list_resource_quotas(&self, namespace: &str) -> Result<Vec<ResourceQuota>> {
        let api: Api<ResourceQuota> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn raw_node_metrics(&self) -> Result<serde_json::Value> {
        self.raw_get(NODE_METRICS_PATH).await
    }

    async fn raw_pod_metrics(&self) -> Result<serde_json::Value> {
        self.raw_get(POD_METRICS_PATH).await
    }
}
