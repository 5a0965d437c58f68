//! Git-backed bundle cloner.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{InstallError, Result};
use crate::install::cancel::CancelToken;
use crate::install::config::BundleSource;
use crate::install::traits::{BundleCheckout, BundleCloner};
use crate::providers::run_tool;

/// Subdirectory inside the bundle repository holding the chart. Falls back
/// to the repository root when the subdirectory is absent.
const BUNDLE_CHART_SUBDIR: &str = "chart";

/// Shallow-clones the bundle repository into an ephemeral directory.
#[derive(Debug, Clone, Default)]
pub struct GitBundleCloner;

impl GitBundleCloner {
    pub fn new() -> Self {
        Self
    }
}

/// Git reports a nonexistent `--branch` argument on stderr rather than with
/// a distinct exit code.
fn is_missing_branch(stderr: &str) -> bool {
    (stderr.contains("Remote branch") && stderr.contains("not found"))
        || stderr.contains("couldn't find remote ref")
}

#[async_trait]
impl BundleCloner for GitBundleCloner {
    async fn clone_bundle(
        &self,
        cancel: &CancelToken,
        source: &BundleSource,
    ) -> Result<BundleCheckout> {
        let temp_dir = tempfile::Builder::new()
            .prefix("flotilla-bundle-")
            .tempdir()?
            .keep();
        let target = temp_dir.display().to_string();

        debug!(branch = %source.branch, "cloning bundle repository");
        let output = run_tool(
            cancel,
            "git",
            &[
                "clone",
                "--depth",
                "1",
                "--branch",
                &source.branch,
                &source.repo_url,
                &target,
            ],
        )
        .await?;

        if !output.status.success() {
            if let Err(err) = tokio::fs::remove_dir_all(&temp_dir).await {
                warn!(error = %err, "failed to remove clone directory");
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_missing_branch(&stderr) {
                return Err(InstallError::branch_not_found(&source.branch));
            }
            return Err(InstallError::Io(std::io::Error::other(format!(
                "git clone failed: {}",
                stderr.trim()
            ))));
        }

        let subdir = temp_dir.join(BUNDLE_CHART_SUBDIR);
        let chart_path = if subdir.is_dir() {
            subdir
        } else {
            temp_dir.clone()
        };

        Ok(BundleCheckout {
            temp_dir,
            chart_path,
        })
    }

    async fn remove_checkout(&self, checkout: &BundleCheckout) {
        if let Err(err) = tokio::fs::remove_dir_all(&checkout.temp_dir).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    path = %checkout.temp_dir.display(),
                    error = %err,
                    "failed to remove bundle checkout"
                );
            }
        }
    }
}
