//! Helm-backed controller and bundle installers.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use crate::error::{InstallError, Result};
use crate::install::cancel::CancelToken;
use crate::install::config::ChartInstallConfig;
use crate::install::traits::{BundleInstaller, ControllerInstaller};
use crate::providers::{ensure_success, run_tool};

const CONTROLLER_RELEASE: &str = "argo-cd";
const CONTROLLER_CHART: &str = "argo-cd";
const CONTROLLER_CHART_REPO: &str = "https://argoproj.github.io/argo-helm";
const CONTROLLER_NAMESPACE: &str = "argocd";

const BUNDLE_RELEASE: &str = "app-bundle";

/// Installs charts through the `helm` CLI. `helm upgrade --install` makes
/// both releases idempotent, so re-running after a partial failure is safe.
#[derive(Debug, Clone, Default)]
pub struct HelmManager;

impl HelmManager {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ControllerInstaller for HelmManager {
    async fn install(&self, cancel: &CancelToken, config: &ChartInstallConfig) -> Result<()> {
        let values_path = config.values_path.display().to_string();
        let args = [
            "upgrade",
            "--install",
            CONTROLLER_RELEASE,
            CONTROLLER_CHART,
            "--repo",
            CONTROLLER_CHART_REPO,
            "--namespace",
            CONTROLLER_NAMESPACE,
            "--create-namespace",
            "--wait",
            "--values",
            &values_path,
        ];
        debug!(release = CONTROLLER_RELEASE, "running helm upgrade");
        let output = run_tool(cancel, "helm", &args).await?;
        ensure_success(&output, "controller chart install").map_err(|err| {
            InstallError::component(
                "controller",
                "installation",
                config.cluster_name.clone(),
                err,
            )
        })
    }
}

#[async_trait]
impl BundleInstaller for HelmManager {
    async fn install(
        &self,
        cancel: &CancelToken,
        config: &ChartInstallConfig,
        chart_path: &Path,
    ) -> Result<()> {
        let chart = chart_path.display().to_string();
        let values_path = config.values_path.display().to_string();
        let mut args = vec![
            "upgrade",
            "--install",
            BUNDLE_RELEASE,
            &chart,
            "--namespace",
            CONTROLLER_NAMESPACE,
            "--values",
            &values_path,
        ];
        let cert_args;
        if let Some(cert_dir) = config.cert_dir.as_ref() {
            cert_args = [
                format!("ingress.tls.certFile={}", cert_dir.join("cert.pem").display()),
                format!("ingress.tls.keyFile={}", cert_dir.join("key.pem").display()),
            ];
            args.push("--set-file");
            args.push(&cert_args[0]);
            args.push("--set-file");
            args.push(&cert_args[1]);
        }
        debug!(release = BUNDLE_RELEASE, chart = %chart, "running helm upgrade");
        let output = run_tool(cancel, "helm", &args).await?;
        ensure_success(&output, "bundle chart install").map_err(|err| {
            InstallError::component("bundle", "installation", config.cluster_name.clone(), err)
        })
    }
}
