//! Installation data model: the immutable request, the resolved chart
//! configuration, and the final install config handed to the installer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::InstallError;
use crate::values::HelmValues;

/// How the chart stack is deployed. Closed set: adding a mode means adding
/// a variant here and a requirements table in `validation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentMode {
    SelfHosted,
    Managed,
    ManagedShared,
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::SelfHosted => "self-hosted",
            DeploymentMode::Managed => "managed",
            DeploymentMode::ManagedShared => "managed-shared",
        }
    }

    /// Default bundle repository for the mode. Managed and self-hosted
    /// share a public repository; managed-shared pulls from a private one.
    pub fn bundle_repository(&self) -> &'static str {
        match self {
            DeploymentMode::SelfHosted | DeploymentMode::Managed => {
                "https://github.com/flotilla-dev/flotilla-bundle"
            }
            DeploymentMode::ManagedShared => {
                "https://github.com/flotilla-dev/flotilla-bundle-shared"
            }
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentMode {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "self-hosted" => Ok(DeploymentMode::SelfHosted),
            "managed" => Ok(DeploymentMode::Managed),
            "managed-shared" => Ok(DeploymentMode::ManagedShared),
            other => Err(InstallError::validation(format!(
                "invalid deployment mode: {other} (expected self-hosted, managed, or managed-shared)"
            ))),
        }
    }
}

/// Immutable input for one installation run, constructed once at the CLI
/// boundary.
#[derive(Debug, Clone, Default)]
pub struct InstallationRequest {
    /// Positional cluster name arguments; the first pre-selects a cluster.
    pub cluster_args: Vec<String>,
    pub force: bool,
    pub dry_run: bool,
    pub non_interactive: bool,
    /// Raw mode string from the CLI; `None` keeps mode selection
    /// interactive.
    pub deployment_mode: Option<String>,
    pub bundle_repo: String,
    pub bundle_branch: String,
    pub cert_dir: Option<PathBuf>,
}

/// Resolved chart configuration produced by the configuration resolver and
/// consumed when building the install config. Not mutated after the staged
/// file is written.
#[derive(Debug, Clone)]
pub struct ChartConfiguration {
    pub base_values_path: PathBuf,
    /// Staged values file path; `None` until one is created.
    pub temp_values_path: Option<PathBuf>,
    pub values: HelmValues,
    /// Sections touched during configuration, for the user-facing summary.
    pub modified_sections: Vec<String>,
    pub deployment_mode: Option<DeploymentMode>,
}

/// Where the application bundle is pulled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSource {
    pub repo_url: String,
    pub branch: String,
}

/// Fully-resolved configuration handed to the installer.
#[derive(Debug, Clone)]
pub struct ChartInstallConfig {
    pub cluster_name: String,
    pub force: bool,
    pub dry_run: bool,
    pub non_interactive: bool,
    /// Effective values file for this run: the staged copy when one exists,
    /// the base file otherwise.
    pub values_path: PathBuf,
    pub cert_dir: Option<PathBuf>,
    /// Present only when a bundle repository is configured.
    pub bundle: Option<BundleSource>,
}

impl ChartInstallConfig {
    pub fn has_bundle(&self) -> bool {
        self.bundle
            .as_ref()
            .is_some_and(|b| !b.repo_url.is_empty())
    }
}

/// Build the install config from the request and the resolved chart
/// configuration. When a deployment mode was chosen, the bundle repository
/// follows the mode rather than the CLI flag; managed-shared injects the
/// repository access token into the clone URL.
pub fn build_install_config(
    req: &InstallationRequest,
    cluster_name: &str,
    chart_config: &ChartConfiguration,
) -> ChartInstallConfig {
    let mut repo_url = req.bundle_repo.clone();
    if let Some(mode) = chart_config.deployment_mode {
        repo_url = mode.bundle_repository().to_string();
        if mode == DeploymentMode::ManagedShared {
            if let Some(token) = chart_config.values.managed_repository_password() {
                repo_url = repo_url.replacen("https://", &format!("https://{token}@"), 1);
            }
        }
    }

    let branch = if req.bundle_branch.is_empty() {
        "main".to_string()
    } else {
        req.bundle_branch.clone()
    };

    let bundle = if repo_url.is_empty() {
        None
    } else {
        Some(BundleSource { repo_url, branch })
    };

    ChartInstallConfig {
        cluster_name: cluster_name.to_string(),
        force: req.force,
        dry_run: req.dry_run,
        non_interactive: req.non_interactive,
        values_path: chart_config
            .temp_values_path
            .clone()
            .unwrap_or_else(|| chart_config.base_values_path.clone()),
        cert_dir: req.cert_dir.clone(),
        bundle,
    }
}
