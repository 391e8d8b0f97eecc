use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tokio::time::Instant;

use crate::config::Settings;
use crate::driver::ClusterDriver;
use crate::error::Result;
use crate::models::k8s::{ApiLatency, KubeContext};

const SLOW_AFTER: Duration = Duration::from_millis(1500);
const UNREACHABLE_AFTER: Duration = Duration::from_secs(5);

// ── helpers ───────────────────────────────────────────────────────────────────

/// Merges `extra` into `base` by extending clusters, auth_infos, and contexts.
/// `base.current_context` wins; `extra.current_context` is used only if base has none.
fn merge_kubeconfig(mut base: Kubeconfig, extra: Kubeconfig) -> Kubeconfig {
    base.clusters.extend(extra.clusters);
    base.auth_infos.extend(extra.auth_infos);
    base.contexts.extend(extra.contexts);
    if base.current_context.is_none() {
        base.current_context = extra.current_context;
    }
    base
}

/// Returns all regular, non-hidden files in `dir`, sorted alphabetically.
fn scan_kube_dir(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            log::warn!("kubeconfig: cannot read directory {}: {e}", dir.display());
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        // cache/, http-cache/ and dotfiles are never kubeconfigs
        .filter(|path| !path.is_dir())
        .filter(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            !name.starts_with('.')
        })
        .collect();

    paths.sort();
    paths
}

/// Tries to load each path as a kubeconfig and merges all that succeed.
fn load_from_paths(paths: &[PathBuf]) -> Option<Kubeconfig> {
    let mut merged: Option<Kubeconfig> = None;

    for path in paths {
        if !path.exists() {
            log::info!("kubeconfig: skip (not found) {}", path.display());
            continue;
        }

        match Kubeconfig::read_from(path) {
            Ok(cfg) => {
                log::info!(
                    "kubeconfig: ok ({} context(s)) {}",
                    cfg.contexts.len(),
                    path.display()
                );
                merged = Some(match merged.take() {
                    None => cfg,
                    Some(base) => merge_kubeconfig(base, cfg),
                });
            }
            Err(e) => {
                // Expected for non-kubeconfig files when scanning ~/.kube
                log::info!("kubeconfig: skip (parse error: {e}) {}", path.display());
            }
        }
    }

    merged
}

/// Loads the kubeconfig the way kubectl would: the configured file if any,
/// else every file in `KUBECONFIG`, else every parseable file in `~/.kube`.
fn load_kubeconfig(settings: &Settings) -> Option<Kubeconfig> {
    if let Some(ref path) = settings.kubeconfig {
        return load_from_paths(std::slice::from_ref(path));
    }

    let kube_env = std::env::var("KUBECONFIG").unwrap_or_default();
    if !kube_env.is_empty() {
        return match Kubeconfig::read() {
            Ok(cfg) => {
                log::info!("kubeconfig: KUBECONFIG merged {} context(s)", cfg.contexts.len());
                Some(cfg)
            }
            Err(e) => {
                log::warn!("kubeconfig: reading KUBECONFIG failed: {e}");
                None
            }
        };
    }

    let Some(home) = dirs::home_dir() else {
        log::warn!("kubeconfig: cannot determine home directory");
        return None;
    };
    let kube_dir = home.join(".kube");
    log::info!("kubeconfig: KUBECONFIG not set, scanning {}", kube_dir.display());

    let merged = load_from_paths(&scan_kube_dir(&kube_dir));
    if merged.is_none() {
        log::warn!("kubeconfig: no valid kubeconfig files found in {}", kube_dir.display());
    }
    merged
}

/// Flattens a kubeconfig into context descriptions. `active` overrides the
/// file's `current-context`.
pub fn contexts_of(kubeconfig: Kubeconfig, active: Option<&str>) -> Vec<KubeContext> {
    let current = active
        .map(str::to_string)
        .or_else(|| kubeconfig.current_context.clone())
        .unwrap_or_default();

    let cluster_servers: HashMap<String, String> = kubeconfig
        .clusters
        .iter()
        .filter_map(|nc| {
            let server = nc.cluster.as_ref()?.server.clone()?;
            Some((nc.name.clone(), server))
        })
        .collect();

    kubeconfig
        .contexts
        .into_iter()
        .filter_map(|named| {
            let ctx = named.context?;
            let server_url = cluster_servers.get(&ctx.cluster).cloned();
            Some(KubeContext {
                is_active: named.name == current,
                name: named.name,
                cluster: ctx.cluster,
                user: ctx.user.unwrap_or_default(),
                namespace: ctx.namespace,
                server_url,
            })
        })
        .collect()
}

// ── commands ──────────────────────────────────────────────────────────────────

/// Lists all contexts from the merged kubeconfig. Returns an empty vec, not
/// an error, when no kubeconfig can be found.
pub fn list_contexts(settings: &Settings) -> Vec<KubeContext> {
    match load_kubeconfig(settings) {
        Some(kubeconfig) => contexts_of(kubeconfig, settings.context.as_deref()),
        None => Vec::new(),
    }
}

/// Builds the API client.
///
/// Resolution order: configured kubeconfig/context, then the in-cluster
/// service account, then the merged kubeconfig, then kube's own inference.
pub async fn connect(settings: &Settings) -> Result<Client> {
    let options = KubeConfigOptions {
        context: settings.context.clone(),
        ..KubeConfigOptions::default()
    };

    let in_cluster = std::env::var_os("KUBERNETES_SERVICE_HOST").is_some();
    let config = if settings.kubeconfig.is_none() && settings.context.is_none() && in_cluster {
        log::info!("kubeconfig: using in-cluster service account");
        Config::incluster()?
    } else {
        match load_kubeconfig(settings) {
            Some(kubeconfig) => Config::from_custom_kubeconfig(kubeconfig, &options).await?,
            None => Config::infer().await?,
        }
    };

    log::info!("kubeconfig: connecting to {}", config.cluster_url);
    Ok(Client::try_from(config)?)
}

/// Times a namespace listing: `healthy` under 1.5 s, `slow` under 5 s,
/// `unreachable` on error or timeout.
pub async fn check_cluster_health(driver: &dyn ClusterDriver) -> ApiLatency {
    let started = Instant::now();
    match tokio::time::timeout(UNREACHABLE_AFTER, driver.list_namespaces()).await {
        Ok(Ok(_)) if started.elapsed() > SLOW_AFTER => ApiLatency::Slow,
        Ok(Ok(_)) => ApiLatency::Healthy,
        Ok(Err(e)) => {
            log::warn!("kubeconfig: API server check failed: {e}");
            ApiLatency::Unreachable
        }
        Err(_) => {
            log::warn!("kubeconfig: API server check timed out");
            ApiLatency::Unreachable
        }
    }
}
