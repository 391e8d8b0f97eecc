use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("kubernetes API request failed: {0}")]
    Kube(#[from] kube::Error),

    #[error("failed to load kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("failed to infer kubernetes config: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    #[error("in-cluster config unavailable: {0}")]
    InCluster(#[from] kube::config::InClusterError),

    #[error("kubectl exited with an error: {0}")]
    Kubectl(String),

    #[error("command not allowed: `{0}`. Only read operations are permitted")]
    CommandNotAllowed(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("failed to build request: {0}")]
    Http(#[from] http::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("{0} not found")]
    NotFound(String),

    /// A cluster driver call failed for a reason that has no richer type.
    #[error("cluster request failed: {0}")]
    Upstream(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
