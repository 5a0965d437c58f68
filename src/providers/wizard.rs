//! Interactive configuration wizard over the terminal.
//!
//! Prompts only for what the chosen mode needs and is missing from the
//! persisted values file; anything already configured is reused silently.

use async_trait::async_trait;
use tracing::info;

use crate::error::{InstallError, Result};
use crate::install::config::{ChartConfiguration, DeploymentMode};
use crate::install::traits::ConfigurationWizard;
use crate::install::validation::validate_configuration;
use crate::providers::terminal::prompt;
use crate::values::{
    CredentialValues, HelmValues, ManagedValues, RegistryCredentials, ValuesStore,
};

pub struct TerminalWizard {
    store: ValuesStore,
}

impl TerminalWizard {
    pub fn new(store: ValuesStore) -> Self {
        Self { store }
    }

    async fn select_mode(&self) -> Result<DeploymentMode> {
        let answer = prompt(
            "Select a deployment mode:\n  1. self-hosted\n  2. managed\n  3. managed-shared\nChoice: "
                .to_string(),
        )
        .await?;
        match answer.as_str() {
            "1" | "self-hosted" => Ok(DeploymentMode::SelfHosted),
            "2" | "managed" => Ok(DeploymentMode::Managed),
            "3" | "managed-shared" => Ok(DeploymentMode::ManagedShared),
            other => Err(InstallError::validation(format!(
                "invalid deployment mode selection: {other}"
            ))),
        }
    }

    async fn fill_managed_credentials(
        &self,
        values: &mut HelmValues,
        needs_config_credential: bool,
        modified: &mut Vec<String>,
    ) -> Result<()> {
        if values.managed_repository_password().is_none() {
            let token = prompt("Bundle repository access token: ".to_string()).await?;
            managed_section(values).repository = Some(CredentialValues { password: token });
            modified.push("deployment.managed.repository".into());
        }

        if needs_config_credential && values.managed_config_password().is_none() {
            let token = prompt("Config repository access token: ".to_string()).await?;
            managed_section(values).config = Some(CredentialValues { password: token });
            modified.push("deployment.managed.config".into());
        }

        if !values.has_registry_credentials() {
            let username = prompt("Registry username: ".to_string()).await?;
            let password = prompt("Registry password: ".to_string()).await?;
            values.registry.credentials = Some(RegistryCredentials {
                username,
                password,
                email: None,
            });
            modified.push("registry.credentials".into());
        }

        Ok(())
    }

    async fn build(&self, mode: DeploymentMode) -> Result<ChartConfiguration> {
        let mut values = self.store.load_or_default()?;
        let mut modified = vec!["deployment".to_string()];
        ValuesStore::apply_mode(&mut values, mode);

        match mode {
            DeploymentMode::SelfHosted => {}
            DeploymentMode::Managed => {
                self.fill_managed_credentials(&mut values, true, &mut modified)
                    .await?
            }
            DeploymentMode::ManagedShared => {
                self.fill_managed_credentials(&mut values, false, &mut modified)
                    .await?
            }
        }

        let mut config = ChartConfiguration {
            base_values_path: self.store.base_path(),
            temp_values_path: None,
            values,
            modified_sections: modified,
            deployment_mode: Some(mode),
        };
        validate_configuration(&config)?;

        let staged = self.store.write_temp(&config.values)?;
        info!(path = %staged.display(), "staged configuration written");
        config.temp_values_path = Some(staged);
        Ok(config)
    }
}

fn managed_section(values: &mut HelmValues) -> &mut ManagedValues {
    values
        .deployment
        .managed
        .get_or_insert_with(ManagedValues::default)
}

#[async_trait]
impl ConfigurationWizard for TerminalWizard {
    async fn configure(&self) -> Result<ChartConfiguration> {
        let mode = self.select_mode().await?;
        self.build(mode).await
    }

    async fn configure_with_mode(&self, mode: DeploymentMode) -> Result<ChartConfiguration> {
        self.build(mode).await
    }
}
