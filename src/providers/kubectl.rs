//! Convergence polling through `kubectl`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

use crate::error::{InstallError, Result};
use crate::install::cancel::CancelToken;
use crate::install::config::ChartInstallConfig;
use crate::install::traits::ConvergenceWaiter;
use crate::providers::run_tool;

const APPLICATIONS_NAMESPACE: &str = "argocd";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Deserialize, Default)]
struct ApplicationList {
    #[serde(default)]
    items: Vec<Application>,
}

#[derive(Debug, Deserialize)]
struct Application {
    metadata: ApplicationMetadata,
    #[serde(default)]
    status: ApplicationStatus,
}

#[derive(Debug, Deserialize)]
struct ApplicationMetadata {
    name: String,
}

#[derive(Debug, Deserialize, Default)]
struct ApplicationStatus {
    #[serde(default)]
    sync: StatusField,
    #[serde(default)]
    health: StatusField,
}

#[derive(Debug, Deserialize, Default)]
struct StatusField {
    #[serde(default)]
    status: String,
}

impl Application {
    fn is_converged(&self) -> bool {
        self.status.sync.status == "Synced" && self.status.health.status == "Healthy"
    }
}

/// Polls the controller's Application resources until every one reports
/// synced and healthy.
#[derive(Debug, Clone)]
pub struct KubectlConvergenceWaiter {
    poll_interval: Duration,
    timeout: Duration,
}

impl Default for KubectlConvergenceWaiter {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl KubectlConvergenceWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn with_timing(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    async fn poll_once(&self, cancel: &CancelToken) -> Result<ApplicationList> {
        let output = run_tool(
            cancel,
            "kubectl",
            &[
                "get",
                "applications.argoproj.io",
                "--namespace",
                APPLICATIONS_NAMESPACE,
                "--output",
                "json",
            ],
        )
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InstallError::Io(std::io::Error::other(format!(
                "kubectl get applications failed: {}",
                stderr.trim()
            ))));
        }
        Ok(serde_json::from_slice(&output.stdout)
            .map_err(|err| std::io::Error::other(format!("unexpected kubectl output: {err}")))?)
    }
}

#[async_trait]
impl ConvergenceWaiter for KubectlConvergenceWaiter {
    async fn wait_for_applications(
        &self,
        cancel: &CancelToken,
        config: &ChartInstallConfig,
    ) -> Result<()> {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(InstallError::Cancelled);
            }

            match self.poll_once(cancel).await {
                Ok(list) => {
                    let pending: Vec<&str> = list
                        .items
                        .iter()
                        .filter(|app| !app.is_converged())
                        .map(|app| app.metadata.name.as_str())
                        .collect();
                    if !list.items.is_empty() && pending.is_empty() {
                        return Ok(());
                    }
                    debug!(pending = ?pending, "applications not yet converged");
                }
                Err(InstallError::Cancelled) => return Err(InstallError::Cancelled),
                // Transient API errors are expected while the controller
                // comes up; keep polling until the deadline.
                Err(err) => debug!(error = %err, "convergence poll failed"),
            }

            if started.elapsed() + self.poll_interval >= self.timeout {
                return Err(InstallError::component(
                    "controller",
                    "convergence",
                    config.cluster_name.clone(),
                    anyhow::anyhow!(
                        "applications did not converge within {:?}",
                        self.timeout
                    ),
                ));
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(InstallError::Cancelled),
                _ = sleep(self.poll_interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ApplicationList {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn converged_requires_synced_and_healthy() {
        let list = parse(
            r#"{"items":[
                {"metadata":{"name":"a"},"status":{"sync":{"status":"Synced"},"health":{"status":"Healthy"}}},
                {"metadata":{"name":"b"},"status":{"sync":{"status":"OutOfSync"},"health":{"status":"Healthy"}}}
            ]}"#,
        );
        assert!(list.items[0].is_converged());
        assert!(!list.items[1].is_converged());
    }

    #[test]
    fn missing_status_means_not_converged() {
        let list = parse(r#"{"items":[{"metadata":{"name":"a"}}]}"#);
        assert!(!list.items[0].is_converged());
    }

    #[tokio::test]
    async fn cancelled_token_ends_the_wait() {
        let waiter = KubectlConvergenceWaiter::with_timing(
            Duration::from_millis(10),
            Duration::from_secs(60),
        );
        let controller = crate::install::cancel::CancellationController::new();
        controller.cancel();
        let config = ChartInstallConfig {
            cluster_name: "demo".into(),
            force: false,
            dry_run: false,
            non_interactive: true,
            values_path: "helm-values.yaml".into(),
            cert_dir: None,
            bundle: None,
        };
        let err = waiter
            .wait_for_applications(&controller.token(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Cancelled));
    }
}
