use std::sync::Arc;

use crate::aggregator::ClusterAggregator;
use crate::cache::SnapshotCache;
use crate::config::Settings;
use crate::driver::{ClusterDriver, Kubectl};
use crate::metrics::MetricsGateway;
use crate::restart::RestartOptions;

/// Shared handles the command layer works against. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub driver: Arc<dyn ClusterDriver>,
    pub cache: Arc<SnapshotCache>,
    pub aggregator: ClusterAggregator,
    pub metrics: MetricsGateway,
    pub kubectl: Kubectl,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(driver: Arc<dyn ClusterDriver>, kubectl: Kubectl, settings: Settings) -> Self {
        let cache = Arc::new(SnapshotCache::new(settings.cache_ttl()));
        let metrics = MetricsGateway::new(driver.clone());
        let aggregator = ClusterAggregator::new(
            driver.clone(),
            cache.clone(),
            metrics.clone(),
            settings.dashboard.clone(),
        );
        Self {
            driver,
            cache,
            aggregator,
            metrics,
            kubectl,
            settings: Arc::new(settings),
        }
    }

    pub fn restart_options(&self) -> RestartOptions {
        RestartOptions {
            preserve_tail_lines: self.settings.restart.preserve_tail_lines,
            recreate_delay: self.settings.restart.recreate_delay(),
        }
    }
}
