//! Collaborator seams for the installation workflow.
//!
//! Everything that touches the network, the cluster, or the terminal sits
//! behind one of these traits so the orchestration logic can be exercised
//! with recording fakes.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::install::cancel::CancelToken;
use crate::install::config::{BundleSource, ChartConfiguration, ChartInstallConfig, DeploymentMode};

/// A cluster known to the provisioning tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    pub name: String,
    pub status: String,
}

#[async_trait]
pub trait ClusterLister: Send + Sync {
    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>>;
}

/// Interactive configuration flow. `configure` drives everything including
/// mode selection; `configure_with_mode` skips the mode question.
#[async_trait]
pub trait ConfigurationWizard: Send + Sync {
    async fn configure(&self) -> Result<ChartConfiguration>;
    async fn configure_with_mode(&self, mode: DeploymentMode) -> Result<ChartConfiguration>;
}

#[async_trait]
pub trait CertificateRegenerator: Send + Sync {
    async fn regenerate(&self) -> Result<()>;
}

/// Installs or upgrades the GitOps controller. Must be idempotent.
#[async_trait]
pub trait ControllerInstaller: Send + Sync {
    async fn install(&self, cancel: &CancelToken, config: &ChartInstallConfig) -> Result<()>;
}

/// A cloned bundle repository on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleCheckout {
    /// Root of the ephemeral clone directory.
    pub temp_dir: PathBuf,
    /// Path to the chart inside the clone.
    pub chart_path: PathBuf,
}

#[async_trait]
pub trait BundleCloner: Send + Sync {
    /// Clone the bundle repository into an ephemeral directory. A missing
    /// branch must surface as `InstallError::BranchNotFound`.
    async fn clone_bundle(
        &self,
        cancel: &CancelToken,
        source: &BundleSource,
    ) -> Result<BundleCheckout>;

    /// Remove a checkout produced by `clone_bundle`. Best effort.
    async fn remove_checkout(&self, checkout: &BundleCheckout);
}

#[async_trait]
pub trait BundleInstaller: Send + Sync {
    async fn install(
        &self,
        cancel: &CancelToken,
        config: &ChartInstallConfig,
        chart_path: &Path,
    ) -> Result<()>;
}

/// Polls until the controller reports all bundle-managed applications
/// synced.
#[async_trait]
pub trait ConvergenceWaiter: Send + Sync {
    async fn wait_for_applications(
        &self,
        cancel: &CancelToken,
        config: &ChartInstallConfig,
    ) -> Result<()>;
}

/// Terminal interactions the workflow needs: cluster selection and the
/// destructive-operation confirmation. Both may block on user input.
#[async_trait]
pub trait OperationsUi: Send + Sync {
    /// Pick a cluster, honoring a pre-selection from positional arguments.
    /// `None` means nothing to install onto; the run ends quietly.
    async fn select_cluster(
        &self,
        clusters: &[ClusterInfo],
        args: &[String],
    ) -> Result<Option<String>>;

    async fn confirm_installation(&self, cluster_name: &str) -> Result<bool>;
}
