pub mod aggregator;
pub mod cache;
pub mod commands;
pub mod config;
pub mod driver;
pub mod error;
pub mod logs;
pub mod metrics;
pub mod models;
pub mod projection;
pub mod quantity;
pub mod restart;
pub mod state;

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::Settings;
use crate::driver::{ClusterDriver, KubeDriver, Kubectl};
use crate::error::Result;
use crate::state::AppState;

/// Loads settings, connects to the cluster and serves live logs until Ctrl-C.
pub async fn run() -> Result<()> {
    let settings = Settings::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_str()),
    )
    .init();

    let client = commands::kubeconfig::connect(&settings).await?;
    let kubectl = Kubectl::from_settings(&settings);
    let driver: Arc<dyn ClusterDriver> = Arc::new(KubeDriver::new(client, kubectl.clone()));
    let state = AppState::new(driver, kubectl, settings);

    let latency = commands::kubeconfig::check_cluster_health(state.driver.as_ref()).await;
    log::info!("cluster: API server is {latency:?}");

    // Warm the snapshot; a failure here is logged, not fatal.
    match state.aggregator.snapshot().await {
        Ok(snapshot) => log::info!(
            "cluster: {} ({}/{} nodes ready, {} pods)",
            snapshot.health_status,
            snapshot.ready_nodes,
            snapshot.total_nodes,
            snapshot.total_pods
        ),
        Err(e) => log::warn!("cluster: initial snapshot failed: {e}"),
    }

    let listener = TcpListener::bind(&state.settings.listen_addr).await?;
    tokio::select! {
        served = logs::server::serve(
            listener,
            state.driver.clone(),
            state.settings.log_stream.clone(),
        ) => served,
        _ = tokio::signal::ctrl_c() => {
            log::info!("shutting down");
            Ok(())
        }
    }
}
