use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::config::Settings;
use crate::driver::{LogProcess, ProcessHandle};
use crate::error::{Error, Result};

/// Spawns kubectl with the same kubeconfig/context the API client uses.
#[derive(Debug, Clone)]
pub struct Kubectl {
    binary: PathBuf,
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
    timeout: Duration,
}

impl Kubectl {
    /// Upper bound on a one-shot [`Kubectl::run`].
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(binary: PathBuf, kubeconfig: Option<PathBuf>, context: Option<String>) -> Self {
        Self {
            binary,
            kubeconfig,
            context,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Uses `kubectlPath` when configured, otherwise whatever `kubectl`
    /// resolves to on `PATH`.
    pub fn from_settings(settings: &Settings) -> Self {
        let binary = settings.kubectl_path.clone().unwrap_or_else(|| {
            which::which("kubectl").unwrap_or_else(|_| PathBuf::from("kubectl"))
        });
        Self::new(binary, settings.kubeconfig.clone(), settings.context.clone())
    }

    fn connection_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ref file) = self.kubeconfig {
            args.push(format!("--kubeconfig={}", file.display()));
        }
        if let Some(ref ctx) = self.context {
            args.push(format!("--context={ctx}"));
        }
        args
    }

    pub fn follow_args(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: i64,
    ) -> Vec<String> {
        let mut args = vec![
            "logs".to_string(),
            "-f".to_string(),
            pod.to_string(),
            "-n".to_string(),
            namespace.to_string(),
            format!("--tail={tail_lines}"),
        ];
        if let Some(c) = container {
            args.push("-c".to_string());
            args.push(c.to_string());
        }
        args.extend(self.connection_args());
        args
    }

    /// Starts `kubectl logs -f`. The child is killed if its handle is dropped.
    pub fn follow_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: i64,
    ) -> Result<LogProcess> {
        let args = self.follow_args(namespace, pod, container, tail_lines);
        log::debug!("kubectl: {} {}", self.binary.display(), args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Kubectl(format!("failed to spawn kubectl logs: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Kubectl("kubectl logs has no stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Kubectl("kubectl logs has no stderr".into()))?;

        Ok(LogProcess {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            handle: Box::new(child),
        })
    }

    /// Runs kubectl to completion and returns its stdout. The child is killed
    /// if it outlives the configured timeout.
    pub async fn run(&self, args: &[String]) -> Result<String> {
        let output = Command::new(&self.binary)
            .args(args)
            .args(self.connection_args())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| {
                Error::Kubectl(format!(
                    "kubectl did not finish within {}s",
                    self.timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| Error::Kubectl(format!("kubectl not found: {e}")))?;

        if !output.status.success() {
            let err = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(Error::Kubectl(if err.is_empty() {
                format!("kubectl exited with {}", output.status)
            } else {
                err
            }));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ProcessHandle for Child {
    async fn kill(&mut self) -> io::Result<()> {
        Child::kill(self).await
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        Child::wait(self).await.map(|status| status.code())
    }
}
