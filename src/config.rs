use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

const CONFIG_ENV: &str = "CLUSTER_OPS_CONFIG";
const LISTEN_ENV: &str = "CLUSTER_OPS_LISTEN";

/// Runtime settings. Every field has a default, so an absent or partial
/// config file is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub listen_addr: String,
    pub log_level: String,
    /// TTL applied to every snapshot cache key
    pub cache_ttl_secs: u64,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub kubectl_path: Option<PathBuf>,
    pub dashboard: DashboardSettings,
    pub log_stream: LogStreamSettings,
    pub restart: RestartSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DashboardSettings {
    pub recent_events: usize,
    pub top_namespaces: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogStreamSettings {
    /// Lines replayed when a follow starts
    pub tail_lines: i64,
    /// Output chunks buffered per connection before readers stall
    pub channel_capacity: usize,
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RestartSettings {
    pub preserve_tail_lines: i64,
    pub recreate_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3001".to_string(),
            log_level: "info".to_string(),
            cache_ttl_secs: 60,
            kubeconfig: None,
            context: None,
            kubectl_path: None,
            dashboard: DashboardSettings::default(),
            log_stream: LogStreamSettings::default(),
            restart: RestartSettings::default(),
        }
    }
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            recent_events: 20,
            top_namespaces: 10,
        }
    }
}

impl Default for LogStreamSettings {
    fn default() -> Self {
        Self {
            tail_lines: 50,
            channel_capacity: 256,
            chunk_size: 8192,
        }
    }
}

impl Default for RestartSettings {
    fn default() -> Self {
        Self {
            preserve_tail_lines: 1000,
            recreate_delay_ms: 2000,
        }
    }
}

impl Settings {
    /// Loads settings from `$CLUSTER_OPS_CONFIG`, falling back to
    /// `<config dir>/cluster-ops/config.yaml`, then applies env overrides.
    pub fn load() -> Result<Self> {
        let mut settings = match config_path() {
            Some(path) if path.exists() => {
                log::info!("config: loading {}", path.display());
                Self::from_file(&path)?
            }
            Some(path) => {
                log::info!("config: {} not found, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };

        if let Ok(addr) = std::env::var(LISTEN_ENV) {
            if !addr.trim().is_empty() {
                settings.listen_addr = addr.trim().to_string();
            }
        }

        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        // An empty document deserialises to `null`, not to an empty mapping.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl RestartSettings {
    pub fn recreate_delay(&self) -> Duration {
        Duration::from_millis(self.recreate_delay_ms)
    }
}

fn config_path() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::config_dir().map(|d| d.join("cluster-ops").join("config.yaml")))
}
