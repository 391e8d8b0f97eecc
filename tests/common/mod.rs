//! In-memory cluster used by the integration tests.
//!
//! Import via `mod common;` in integration test files.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use k8s_openapi::api::core::v1::{
    Container, ContainerStatus, Event, Namespace, Node, NodeCondition, NodeStatus,
    ObjectReference, Pod, PodSpec, PodStatus, ResourceQuota, ResourceQuotaSpec,
    ResourceQuotaStatus,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use serde_json::{json, Value};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::oneshot;

use cluster_ops_lib::config::Settings;
use cluster_ops_lib::driver::{ClusterDriver, Kubectl, LogProcess, LogRequest, ProcessHandle};
use cluster_ops_lib::error::{Error, Result};
use cluster_ops_lib::projection::event_last_seen;
use cluster_ops_lib::state::AppState;

// ============================================================================
// Cluster contents
// ============================================================================

/// Everything the fake driver serves. Mutate it through [`FakeDriver::with`].
#[derive(Default)]
pub struct FakeCluster {
    pub nodes: Vec<Node>,
    pub pods: Vec<Pod>,
    pub namespaces: Vec<String>,
    pub events: Vec<Event>,
    /// `None` makes the metrics API unreachable
    pub node_metrics: Option<Value>,
    pub pod_metrics: Option<Value>,
    /// Fail every list call, as an unreachable API server would
    pub fail_lists: bool,
    /// Delay applied to namespace listings
    pub list_delay: Duration,
    /// Containers whose log reads fail
    pub failing_log_containers: HashSet<String>,
    /// Fail log reads that name no container
    pub fail_pod_logs: bool,
    pub fail_delete: bool,
    /// When set, a deleted pod comes back under the same name with this uid
    pub recreate_uid: Option<String>,
    /// Deleted pods linger with their old uid and a deletion timestamp
    pub keep_terminating: bool,
    pub resource_quotas: Vec<ResourceQuota>,
    /// Pods for which `logs -f` cannot be started
    pub unfollowable_pods: HashSet<String>,
}

pub struct FakeDriver {
    cluster: Mutex<FakeCluster>,
    follows: Mutex<Vec<FakeFollow>>,
    alive: Arc<AtomicUsize>,
    list_pod_calls: AtomicUsize,
    deletes: Mutex<Vec<String>>,
}

impl FakeDriver {
    pub fn new(cluster: FakeCluster) -> Arc<Self> {
        Arc::new(Self {
            cluster: Mutex::new(cluster),
            follows: Mutex::new(Vec::new()),
            alive: Arc::new(AtomicUsize::new(0)),
            list_pod_calls: AtomicUsize::new(0),
            deletes: Mutex::new(Vec::new()),
        })
    }

    pub fn with(&self, change: impl FnOnce(&mut FakeCluster)) {
        change(&mut self.lock());
    }

    /// Follow processes spawned and not yet killed or exited.
    pub fn alive_processes(&self) -> usize {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn list_pod_calls(&self) -> usize {
        self.list_pod_calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn follow_count(&self) -> usize {
        self.follows.lock().unwrap().len()
    }

    /// Removes and returns the most recently spawned follow's pipes.
    pub fn take_follow(&self) -> FakeFollow {
        self.follows.lock().unwrap().pop().expect("no follow was spawned")
    }

    /// Waits until `count` follows have been spawned in total.
    pub async fn wait_for_follows(&self, count: usize) {
        for _ in 0..500 {
            if self.follow_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} follow(s), saw {}", self.follow_count());
    }

    fn lock(&self) -> MutexGuard<'_, FakeCluster> {
        self.cluster.lock().unwrap()
    }

    fn check_lists(&self) -> Result<()> {
        if self.lock().fail_lists {
            return Err(Error::Upstream("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterDriver for FakeDriver {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.check_lists()?;
        Ok(self.lock().nodes.clone())
    }

    async fn get_node(&self, name: &str) -> Result<Node> {
        self.lock()
            .nodes
            .iter()
            .find(|n| n.metadata.name.as_deref() == Some(name))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("node {name}")))
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>> {
        self.list_pod_calls.fetch_add(1, Ordering::SeqCst);
        self.check_lists()?;
        Ok(self
            .lock()
            .pods
            .iter()
            .filter(|p| namespace.is_none() || p.metadata.namespace.as_deref() == namespace)
            .cloned()
            .collect())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        self.lock()
            .pods
            .iter()
            .find(|p| {
                p.metadata.namespace.as_deref() == Some(namespace)
                    && p.metadata.name.as_deref() == Some(name)
            })
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("pod {namespace}/{name}")))
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        let delay = self.lock().list_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check_lists()?;
        Ok(self
            .lock()
            .namespaces
            .iter()
            .map(|name| Namespace {
                metadata: ObjectMeta {
                    name: Some(name.clone()),
                    ..ObjectMeta::default()
                },
                ..Namespace::default()
            })
            .collect())
    }

    async fn list_events(
        &self,
        namespace: Option<&str>,
        field_selector: Option<&str>,
    ) -> Result<Vec<Event>> {
        self.check_lists()?;
        let wanted: Vec<(String, String)> = field_selector
            .map(|s| {
                s.split(',')
                    .filter_map(|pair| pair.split_once('='))
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        let mut events: Vec<Event> = self
            .lock()
            .events
            .iter()
            .filter(|e| namespace.is_none() || e.metadata.namespace.as_deref() == namespace)
            .filter(|e| {
                wanted.iter().all(|(key, value)| {
                    let actual = match key.as_str() {
                        "involvedObject.name" => e.involved_object.name.as_deref(),
                        "involvedObject.kind" => e.involved_object.kind.as_deref(),
                        _ => None,
                    };
                    actual == Some(value.as_str())
                })
            })
            .cloned()
            .collect();
        events.sort_by_key(event_last_seen);
        Ok(events)
    }

    async fn pod_logs(&self, namespace: &str, pod: &str, request: &LogRequest) -> Result<String> {
        let cluster = self.lock();
        match request.container.as_deref() {
            Some(c) if cluster.failing_log_containers.contains(c) => {
                Err(Error::Upstream(format!("container {c} is not valid")))
            }
            Some(c) => Ok(format!("logs of {namespace}/{pod}/{c}\n")),
            None if cluster.fail_pod_logs => Err(Error::Upstream("a container name must be specified".into())),
            None => Ok(format!("logs of {namespace}/{pod}\n")),
        }
    }

    async fn follow_pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        _tail_lines: i64,
    ) -> Result<LogProcess> {
        if self.lock().unfollowable_pods.contains(pod) {
            return Err(Error::Kubectl(format!("pods \"{pod}\" not found")));
        }

        let (stdout_writer, stdout) = tokio::io::duplex(64 * 1024);
        let (stderr_writer, stderr) = tokio::io::duplex(64 * 1024);
        let (exit_tx, exit_rx) = oneshot::channel();

        self.alive.fetch_add(1, Ordering::SeqCst);
        self.follows.lock().unwrap().push(FakeFollow {
            namespace: namespace.to_string(),
            pod: pod.to_string(),
            container: container.map(str::to_string),
            stdout: stdout_writer,
            stderr: stderr_writer,
            exit: Some(exit_tx),
        });

        Ok(LogProcess {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            handle: Box::new(FakeHandle {
                alive: self.alive.clone(),
                exit: Some(exit_rx),
                done: false,
            }),
        })
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        self.deletes.lock().unwrap().push(format!("{namespace}/{name}"));
        let mut cluster = self.lock();
        if cluster.fail_delete {
            return Err(Error::Upstream("forbidden".into()));
        }

        let index = cluster
            .pods
            .iter()
            .position(|p| {
                p.metadata.namespace.as_deref() == Some(namespace)
                    && p.metadata.name.as_deref() == Some(name)
            })
            .ok_or_else(|| Error::NotFound(format!("pod {namespace}/{name}")))?;
        if cluster.keep_terminating {
            cluster.pods[index].metadata.deletion_timestamp = Some(Time(Utc::now()));
            return Ok(());
        }
        let mut removed = cluster.pods.remove(index);

        if let Some(uid) = cluster.recreate_uid.clone() {
            removed.metadata.uid = Some(uid);
            cluster.pods.push(removed);
        }
        Ok(())
    }

    async fn list_resource_quotas(&self, namespace: &str) -> Result<Vec<ResourceQuota>> {
        self.check_lists()?;
        Ok(self
            .lock()
            .resource_quotas
            .iter()
            .filter(|q| q.metadata.namespace.as_deref() == Some(namespace))
            .cloned()
            .collect())
    }

    async fn raw_node_metrics(&self) -> Result<Value> {
        self.lock()
            .node_metrics
            .clone()
            .ok_or_else(|| Error::Upstream("the server could not find the requested resource".into()))
    }

    async fn raw_pod_metrics(&self) -> Result<Value> {
        self.lock()
            .pod_metrics
            .clone()
            .ok_or_else(|| Error::Upstream("the server could not find the requested resource".into()))
    }
}

// ============================================================================
// Follow processes
// ============================================================================

/// Writing ends of a fake `logs -f` process. Dropping it ends the process.
pub struct FakeFollow {
    pub namespace: String,
    pub pod: String,
    pub container: Option<String>,
    stdout: DuplexStream,
    stderr: DuplexStream,
    exit: Option<oneshot::Sender<i32>>,
}

impl FakeFollow {
    pub async fn write_stdout(&mut self, data: &str) {
        self.stdout.write_all(data.as_bytes()).await.unwrap();
    }

    pub async fn write_stderr(&mut self, data: &str) {
        self.stderr.write_all(data.as_bytes()).await.unwrap();
    }

    /// Closes both pipes and exits with `code`.
    pub fn exit(mut self, code: i32) {
        if let Some(exit) = self.exit.take() {
            let _ = exit.send(code);
        }
    }
}

struct FakeHandle {
    alive: Arc<AtomicUsize>,
    exit: Option<oneshot::Receiver<i32>>,
    done: bool,
}

impl FakeHandle {
    fn finish(&mut self) {
        if !self.done {
            self.done = true;
            self.alive.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl ProcessHandle for FakeHandle {
    async fn kill(&mut self) -> io::Result<()> {
        self.finish();
        Ok(())
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        let code = match self.exit.take() {
            Some(exit) => exit.await.ok(),
            None => None,
        };
        self.finish();
        Ok(code)
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.finish();
    }
}

// ============================================================================
// Object builders
// ============================================================================

pub fn app_state(driver: Arc<FakeDriver>) -> AppState {
    let kubectl = Kubectl::new(PathBuf::from("kubectl"), None, None);
    AppState::new(driver, kubectl, Settings::default())
}

pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
}

pub fn node(name: &str, ready: bool, cpu: &str, memory: &str) -> Node {
    let capacity: BTreeMap<String, Quantity> = [
        ("cpu".to_string(), Quantity(cpu.to_string())),
        ("memory".to_string(), Quantity(memory.to_string())),
        ("pods".to_string(), Quantity("110".to_string())),
    ]
    .into_iter()
    .collect();

    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        },
        status: Some(NodeStatus {
            conditions: Some(vec![NodeCondition {
                type_: "Ready".to_string(),
                status: if ready { "True" } else { "False" }.to_string(),
                ..NodeCondition::default()
            }]),
            capacity: Some(capacity),
            ..NodeStatus::default()
        }),
        ..Node::default()
    }
}

pub fn pod(namespace: &str, name: &str, phase: &str) -> Pod {
    pod_with_containers(namespace, name, phase, &["main"])
}

pub fn pod_with_containers(namespace: &str, name: &str, phase: &str, containers: &[&str]) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{namespace}-{name}")),
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec {
            containers: containers
                .iter()
                .map(|c| Container {
                    name: c.to_string(),
                    image: Some(format!("registry.example/{c}:1")),
                    ..Container::default()
                })
                .collect(),
            node_name: Some("node-a".to_string()),
            ..PodSpec::default()
        }),
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            container_statuses: Some(
                containers
                    .iter()
                    .map(|c| ContainerStatus {
                        name: c.to_string(),
                        ready: phase == "Running",
                        ..ContainerStatus::default()
                    })
                    .collect(),
            ),
            ..PodStatus::default()
        }),
    }
}

pub fn event(namespace: &str, kind: &str, object: &str, reason: &str, seen: i64) -> Event {
    Event {
        metadata: ObjectMeta {
            name: Some(format!("{object}.{reason}.{seen}")),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        involved_object: ObjectReference {
            kind: Some(kind.to_string()),
            name: Some(object.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectReference::default()
        },
        reason: Some(reason.to_string()),
        message: Some(format!("{reason} happened")),
        type_: Some("Normal".to_string()),
        last_timestamp: Some(Time(at(seen))),
        count: Some(1),
        ..Event::default()
    }
}

fn quantities(entries: &[(&str, &str)]) -> Option<BTreeMap<String, Quantity>> {
    Some(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), Quantity(v.to_string())))
            .collect(),
    )
}

pub fn resource_quota(
    namespace: &str,
    name: &str,
    hard: &[(&str, &str)],
    used: &[(&str, &str)],
) -> ResourceQuota {
    ResourceQuota {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        spec: Some(ResourceQuotaSpec {
            hard: quantities(hard),
            ..ResourceQuotaSpec::default()
        }),
        status: Some(ResourceQuotaStatus {
            hard: quantities(hard),
            used: quantities(used),
        }),
    }
}

pub fn node_metrics_doc(entries: &[(&str, &str, &str)]) -> Value {
    json!({
        "kind": "NodeMetricsList",
        "items": entries
            .iter()
            .map(|(name, cpu, memory)| json!({
                "metadata": { "name": name },
                "usage": { "cpu": cpu, "memory": memory }
            }))
            .collect::<Vec<_>>()
    })
}

pub fn pod_metrics_doc(entries: &[(&str, &str, &str, &str)]) -> Value {
    json!({
        "kind": "PodMetricsList",
        "items": entries
            .iter()
            .map(|(namespace, name, cpu, memory)| json!({
                "metadata": { "name": name, "namespace": namespace },
                "timestamp": "2024-05-01T10:00:00Z",
                "containers": [{ "name": "main", "usage": { "cpu": cpu, "memory": memory } }]
            }))
            .collect::<Vec<_>>()
    })
}

/// A small healthy cluster: two ready nodes and ten running pods spread over
/// three namespaces, with metrics-server installed.
pub fn healthy_cluster() -> FakeCluster {
    let mut pods = Vec::new();
    for i in 0..5 {
        pods.push(pod("shop", &format!("web-{i}"), "Running"));
    }
    for i in 0..3 {
        pods.push(pod("data", &format!("db-{i}"), "Running"));
    }
    for i in 0..2 {
        pods.push(pod("ops", &format!("agent-{i}"), "Running"));
    }

    FakeCluster {
        nodes: vec![node("node-a", true, "4", "8Gi"), node("node-b", true, "4", "8Gi")],
        pods,
        namespaces: ["shop", "data", "ops", "empty"].iter().map(|s| s.to_string()).collect(),
        events: vec![
            event("shop", "Pod", "web-0", "Scheduled", 10),
            event("shop", "Pod", "web-0", "Started", 30),
            event("data", "Pod", "db-0", "Pulled", 20),
            event("default", "Node", "node-a", "NodeReady", 5),
        ],
        node_metrics: Some(node_metrics_doc(&[
            ("node-a", "1", "2Gi"),
            ("node-b", "1", "2Gi"),
        ])),
        pod_metrics: Some(pod_metrics_doc(&[("shop", "web-0", "250m", "128Mi")])),
        ..FakeCluster::default()
    }
}
