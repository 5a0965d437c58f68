//! Typed schema for the persisted Helm values file.
//!
//! The values file is user-owned and read-modify-written: unknown keys are
//! preserved through the flattened `extra` mapping, and the sub-sections the
//! installer cares about are explicit optional structs rather than dynamic
//! map traversal.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::install::config::DeploymentMode;

/// Name of the user-owned base values file, resolved against the store root.
pub const BASE_VALUES_FILE: &str = "helm-values.yaml";

/// Fixed staging filename used by dry runs. Dry runs never write it, so the
/// name does not need to be unique.
pub const DRY_RUN_VALUES_FILE: &str = "helm-values-staged.yaml";

/// Root of the Helm values document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelmValues {
    pub deployment: DeploymentValues,
    pub registry: RegistryValues,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress: Option<IngressValues>,
    /// Keys this tool does not manage; carried through unchanged.
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentValues {
    #[serde(rename = "selfHosted", skip_serializing_if = "Option::is_none")]
    pub self_hosted: Option<SelfHostedValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed: Option<ManagedValues>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfHostedValues {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryValues>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagedValues {
    pub enabled: bool,
    /// Access credential for the bundle repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<CredentialValues>,
    /// Separate access credential for the configuration repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<CredentialValues>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialValues {
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<RegistryCredentials>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngressKind {
    Localhost,
    Tunnel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressValues {
    pub kind: IngressKind,
}

impl Default for IngressValues {
    fn default() -> Self {
        Self {
            kind: IngressKind::Localhost,
        }
    }
}

impl HelmValues {
    /// Whether the deployment section for the given mode is enabled.
    pub fn is_mode_enabled(&self, mode: DeploymentMode) -> bool {
        match mode {
            DeploymentMode::SelfHosted => self
                .deployment
                .self_hosted
                .as_ref()
                .is_some_and(|s| s.enabled),
            DeploymentMode::Managed | DeploymentMode::ManagedShared => {
                self.deployment.managed.as_ref().is_some_and(|s| s.enabled)
            }
        }
    }

    pub fn managed_repository_password(&self) -> Option<&str> {
        self.deployment
            .managed
            .as_ref()
            .and_then(|m| m.repository.as_ref())
            .map(|c| c.password.as_str())
            .filter(|p| !p.trim().is_empty())
    }

    pub fn managed_config_password(&self) -> Option<&str> {
        self.deployment
            .managed
            .as_ref()
            .and_then(|m| m.config.as_ref())
            .map(|c| c.password.as_str())
            .filter(|p| !p.trim().is_empty())
    }

    pub fn has_registry_credentials(&self) -> bool {
        self.registry.credentials.as_ref().is_some_and(|c| {
            !c.username.trim().is_empty() && !c.password.trim().is_empty()
        })
    }
}

/// Loads and stages the values file relative to a root directory.
#[derive(Debug, Clone)]
pub struct ValuesStore {
    root: PathBuf,
}

impl ValuesStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn base_path(&self) -> PathBuf {
        self.root.join(BASE_VALUES_FILE)
    }

    pub fn dry_run_path(&self) -> PathBuf {
        self.root.join(DRY_RUN_VALUES_FILE)
    }

    /// Read the base values file. A missing file yields defaults so a fresh
    /// checkout works without any setup.
    pub fn load_or_default(&self) -> Result<HelmValues> {
        let path = self.base_path();
        if !path.exists() {
            return Ok(HelmValues::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        if raw.trim().is_empty() {
            return Ok(HelmValues::default());
        }
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// Enable the deployment section for the chosen mode, creating it if
    /// absent. Credentials already present in the file are left untouched.
    pub fn apply_mode(values: &mut HelmValues, mode: DeploymentMode) {
        match mode {
            DeploymentMode::SelfHosted => {
                values
                    .deployment
                    .self_hosted
                    .get_or_insert_with(SelfHostedValues::default)
                    .enabled = true;
                if let Some(managed) = values.deployment.managed.as_mut() {
                    managed.enabled = false;
                }
            }
            DeploymentMode::Managed | DeploymentMode::ManagedShared => {
                values
                    .deployment
                    .managed
                    .get_or_insert_with(ManagedValues::default)
                    .enabled = true;
                if let Some(self_hosted) = values.deployment.self_hosted.as_mut() {
                    self_hosted.enabled = false;
                }
            }
        }
    }

    /// Write a staged copy of the values next to the base file and return
    /// its path. The file is kept on disk; the cleanup ledger decides its
    /// fate once the installation reaches a terminal outcome.
    pub fn write_temp(&self, values: &HelmValues) -> Result<PathBuf> {
        let rendered = serde_yaml::to_string(values)?;
        let mut file = tempfile::Builder::new()
            .prefix("helm-values-")
            .suffix(".yaml")
            .tempfile_in(&self.root)?;
        file.write_all(rendered.as_bytes())?;
        let (_, path) = file.keep().map_err(|e| e.error)?;
        Ok(path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
