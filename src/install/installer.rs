//! The deploy-and-converge sequence: controller install, bundle install,
//! convergence wait.
//!
//! The installer performs one pass; retry is the caller's concern. Phase
//! ordering is strict: the bundle never installs onto a failed controller,
//! and convergence is only awaited after a successful bundle install.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{InstallError, Result};
use crate::install::cancel::CancelToken;
use crate::install::config::ChartInstallConfig;
use crate::install::traits::{
    BundleCloner, BundleInstaller, ControllerInstaller, ConvergenceWaiter,
};

const CLONE_RETRY_AFTER: Duration = Duration::from_secs(10);
const CONVERGENCE_RETRY_AFTER: Duration = Duration::from_secs(30);

pub struct Installer {
    controller: Arc<dyn ControllerInstaller>,
    cloner: Arc<dyn BundleCloner>,
    bundle: Arc<dyn BundleInstaller>,
    convergence: Arc<dyn ConvergenceWaiter>,
}

impl Installer {
    pub fn new(
        controller: Arc<dyn ControllerInstaller>,
        cloner: Arc<dyn BundleCloner>,
        bundle: Arc<dyn BundleInstaller>,
        convergence: Arc<dyn ConvergenceWaiter>,
    ) -> Self {
        Self {
            controller,
            cloner,
            bundle,
            convergence,
        }
    }

    /// Run the full installation sequence once, checking the cancellation
    /// token at every phase boundary.
    pub async fn install_charts(
        &self,
        cancel: &CancelToken,
        config: &ChartInstallConfig,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }

        info!(cluster = %config.cluster_name, "installing GitOps controller");
        self.controller
            .install(cancel, config)
            .await
            .map_err(|err| classify(err, "controller", "installation", config))?;

        let Some(source) = config.bundle.as_ref().filter(|b| !b.repo_url.is_empty()) else {
            debug!("no bundle repository configured, skipping bundle install");
            return Ok(());
        };

        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }

        info!(branch = %source.branch, "cloning application bundle");
        let checkout = match self.cloner.clone_bundle(cancel, source).await {
            Ok(checkout) => checkout,
            Err(err @ InstallError::BranchNotFound { .. }) => return Err(err),
            Err(err @ InstallError::Cancelled) => return Err(err),
            Err(err) => {
                return Err(InstallError::recoverable(
                    "bundle",
                    "clone",
                    config.cluster_name.clone(),
                    anyhow::Error::new(err),
                    CLONE_RETRY_AFTER,
                ))
            }
        };

        // The checkout is ephemeral: remove it whether the install
        // succeeded or not, before acting on the result.
        let install_result = self
            .bundle
            .install(cancel, config, &checkout.chart_path)
            .await;
        self.cloner.remove_checkout(&checkout).await;
        install_result.map_err(|err| classify(err, "bundle", "installation", config))?;

        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }

        info!("waiting for bundle applications to converge");
        self.convergence
            .wait_for_applications(cancel, config)
            .await
            .map_err(|err| match err {
                err @ InstallError::Cancelled => err,
                // An error already classified recoverable keeps its own
                // suggested wait.
                err @ InstallError::Component {
                    recoverable: true, ..
                } => err,
                err => InstallError::recoverable(
                    "controller",
                    "convergence",
                    config.cluster_name.clone(),
                    anyhow::Error::new(err),
                    CONVERGENCE_RETRY_AFTER,
                ),
            })?;

        Ok(())
    }
}

/// Wrap a phase failure as a component error, letting the distinguished
/// kinds pass through unwrapped.
fn classify(
    err: InstallError,
    component: &'static str,
    operation: &'static str,
    config: &ChartInstallConfig,
) -> InstallError {
    match err {
        err @ (InstallError::BranchNotFound { .. }
        | InstallError::Cancelled
        | InstallError::Validation(_)
        | InstallError::AlreadyHandled) => err,
        err @ InstallError::Component { .. } => err,
        err => InstallError::component(
            component,
            operation,
            config.cluster_name.clone(),
            anyhow::Error::new(err),
        ),
    }
}
