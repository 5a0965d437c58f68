//! Pre-flight validation for the non-interactive path.
//!
//! One requirements table per deployment mode; the first missing field is
//! surfaced as a single validation error before any collaborator is called.

use crate::error::{InstallError, Result};
use crate::install::config::{ChartConfiguration, DeploymentMode};
use crate::values::{HelmValues, BASE_VALUES_FILE};

/// Validate that the values file carries everything the chosen mode needs.
pub fn validate_configuration(config: &ChartConfiguration) -> Result<()> {
    let mode = config
        .deployment_mode
        .ok_or_else(|| InstallError::validation("deployment mode is required"))?;

    let missing = match mode {
        DeploymentMode::SelfHosted => self_hosted_requirements(&config.values),
        DeploymentMode::Managed => managed_requirements(&config.values, true),
        DeploymentMode::ManagedShared => managed_requirements(&config.values, false),
    };

    match missing.first() {
        Some(field) => Err(InstallError::validation(format!(
            "{field} must be configured in {BASE_VALUES_FILE} for {mode} mode"
        ))),
        None => Ok(()),
    }
}

fn self_hosted_requirements(values: &HelmValues) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if !values.is_mode_enabled(DeploymentMode::SelfHosted) {
        missing.push("self-hosted deployment");
    }
    missing
}

fn managed_requirements(values: &HelmValues, needs_config_credential: bool) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if !values.is_mode_enabled(DeploymentMode::Managed) {
        missing.push("managed deployment");
    }
    if values.managed_repository_password().is_none() {
        missing.push("repository access credential");
    }
    if needs_config_credential && values.managed_config_password().is_none() {
        missing.push("config repository access credential");
    }
    if !values.has_registry_credentials() {
        missing.push("registry credentials");
    }
    missing
}
