// JSON messages of the duplex log protocol.
use serde::{Deserialize, Serialize};

/// Key of one follow subscription: `{namespace}/{pod}/{container or "default"}`.
pub fn stream_id(namespace: &str, pod: &str, container: Option<&str>) -> String {
    format!("{namespace}/{pod}/{}", container.unwrap_or("default"))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SubscribeLogs {
        namespace: String,
        pod: String,
        #[serde(default)]
        container: Option<String>,
    },
    UnsubscribeLogs {
        #[serde(rename = "streamId")]
        stream_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Log {
        data: String,
        #[serde(rename = "streamId")]
        stream_id: String,
    },
    /// Stderr output of a follow, or a rejected client message. Not fatal to
    /// the stream.
    Error {
        data: String,
        #[serde(rename = "streamId", skip_serializing_if = "Option::is_none")]
        stream_id: Option<String>,
    },
    StreamClosed {
        #[serde(rename = "streamId")]
        stream_id: String,
    },
}
