use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a metrics-server read.
///
/// `Unavailable` means the metrics API could not be reached at all and must be
/// rendered as "no data". It is distinct from `Available` holding zero usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "camelCase")]
pub enum MetricsAvailability<T> {
    Available(T),
    Unavailable,
}

impl<T> MetricsAvailability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn available(self) -> Option<T> {
        match self {
            Self::Available(data) => Some(data),
            Self::Unavailable => None,
        }
    }

    pub fn as_ref(&self) -> MetricsAvailability<&T> {
        match self {
            Self::Available(data) => MetricsAvailability::Available(data),
            Self::Unavailable => MetricsAvailability::Unavailable,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> MetricsAvailability<U> {
        match self {
            Self::Available(data) => MetricsAvailability::Available(f(data)),
            Self::Unavailable => MetricsAvailability::Unavailable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUsage {
    pub name: String,
    pub cpu_millicores: i64,
    pub memory_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerUsage {
    pub name: String,
    pub cpu_millicores: i64,
    pub memory_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodUsage {
    pub name: String,
    pub namespace: String,
    pub containers: Vec<ContainerUsage>,
    pub timestamp: DateTime<Utc>,
    /// Sum over containers, in millicores
    pub total_cpu_millicores: i64,
    /// Sum over containers, in bytes
    pub total_memory_bytes: i64,
}
