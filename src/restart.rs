//! Pod restart that preserves the pod's logs before deleting it.
//!
//! Steps run strictly in order and each has its own failure domain: only a
//! failed initial read aborts early, only a failed delete clears `success`.

use std::time::Duration;

use crate::driver::{ClusterDriver, LogRequest};
use crate::models::restart::RestartResult;

#[derive(Debug, Clone, Copy)]
pub struct RestartOptions {
    pub preserve_tail_lines: i64,
    /// Fixed wait for a controller to recreate the pod under the same name
    pub recreate_delay: Duration,
}

impl Default for RestartOptions {
    fn default() -> Self {
        Self {
            preserve_tail_lines: 1000,
            recreate_delay: Duration::from_secs(2),
        }
    }
}

pub async fn restart_with_preservation(
    driver: &dyn ClusterDriver,
    namespace: &str,
    pod_name: &str,
    options: RestartOptions,
) -> RestartResult {
    let mut result = RestartResult::started(namespace, pod_name);

    let pod = match driver.get_pod(namespace, pod_name).await {
        Ok(pod) => pod,
        Err(e) => {
            log::error!("restart: cannot read pod {namespace}/{pod_name}: {e}");
            result.error_message = Some(format!("failed to read pod: {e}"));
            return result;
        }
    };
    result.previous_pod_uid = pod.metadata.uid.clone();

    let containers: Vec<String> = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default();

    for container in containers {
        let request = LogRequest {
            container: Some(container.clone()),
            tail_lines: Some(options.preserve_tail_lines),
            previous: false,
        };
        match driver.pod_logs(namespace, pod_name, &request).await {
            Ok(logs) => {
                result.container_pre_restart_logs.insert(container, logs);
            }
            Err(e) => log::warn!(
                "restart: could not capture logs of container {container} in {namespace}/{pod_name}: {e}"
            ),
        }
    }

    let request = LogRequest {
        tail_lines: Some(options.preserve_tail_lines),
        ..LogRequest::default()
    };
    match driver.pod_logs(namespace, pod_name, &request).await {
        Ok(logs) => result.pre_restart_logs = logs,
        Err(e) => log::warn!("restart: could not capture logs of {namespace}/{pod_name}: {e}"),
    }

    if let Err(e) = driver.delete_pod(namespace, pod_name).await {
        log::error!("restart: failed to delete pod {namespace}/{pod_name}: {e}");
        result.error_message = Some(format!("failed to delete pod: {e}"));
        return result;
    }
    log::info!("restart: deleted pod {namespace}/{pod_name}, waiting for recreation");

    tokio::time::sleep(options.recreate_delay).await;

    // An unmanaged pod is never recreated; that is not a failed restart.
    // The old pod may still be terminating under the same name.
    match driver.get_pod(namespace, pod_name).await {
        Ok(pod) if pod.metadata.deletion_timestamp.is_some() => {
            log::debug!("restart: {namespace}/{pod_name} is still terminating");
        }
        Ok(pod) if pod.metadata.uid == result.previous_pod_uid => {
            log::debug!("restart: {namespace}/{pod_name} still has its old uid");
        }
        Ok(recreated) => result.new_pod_uid = recreated.metadata.uid,
        Err(e) => log::debug!("restart: {namespace}/{pod_name} not back yet: {e}"),
    }

    result.success = true;
    result
}
