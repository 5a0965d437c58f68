//! Configuration resolution: the 4-way mode state machine that produces the
//! staged chart configuration.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{InstallError, Result};
use crate::install::cleanup::FileCleanupLedger;
use crate::install::config::{ChartConfiguration, DeploymentMode, InstallationRequest};
use crate::install::traits::ConfigurationWizard;
use crate::install::validation::validate_configuration;
use crate::values::ValuesStore;

/// Which configuration path a request takes. Pure function of three flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationMode {
    DryRun,
    NonInteractive,
    PartialInteractive,
    FullyInteractive,
}

impl ConfigurationMode {
    pub fn select(dry_run: bool, non_interactive: bool, mode_given: bool) -> Self {
        if dry_run {
            ConfigurationMode::DryRun
        } else if non_interactive {
            ConfigurationMode::NonInteractive
        } else if mode_given {
            ConfigurationMode::PartialInteractive
        } else {
            ConfigurationMode::FullyInteractive
        }
    }
}

/// Produces a [`ChartConfiguration`] for the request, registering any staged
/// file with the cleanup ledger. Only the dry-run branch skips registration.
pub struct ConfigurationResolver {
    store: ValuesStore,
    wizard: Arc<dyn ConfigurationWizard>,
}

impl ConfigurationResolver {
    pub fn new(store: ValuesStore, wizard: Arc<dyn ConfigurationWizard>) -> Self {
        Self { store, wizard }
    }

    pub async fn resolve(
        &self,
        req: &InstallationRequest,
        ledger: &mut FileCleanupLedger,
    ) -> Result<ChartConfiguration> {
        let mode = ConfigurationMode::select(
            req.dry_run,
            req.non_interactive,
            req.deployment_mode.is_some(),
        );

        match mode {
            ConfigurationMode::DryRun => self.resolve_dry_run(),
            ConfigurationMode::NonInteractive => self.resolve_non_interactive(req, ledger),
            ConfigurationMode::PartialInteractive => {
                let mode_str = req.deployment_mode.as_deref().ok_or_else(|| {
                    InstallError::validation("deployment mode is required for pre-selection")
                })?;
                self.resolve_partial_interactive(mode_str, ledger).await
            }
            ConfigurationMode::FullyInteractive => self.resolve_fully_interactive(ledger).await,
        }
    }

    /// Load the persisted values read-only. Uses a fixed staging filename
    /// and never creates the file or registers anything with the ledger.
    fn resolve_dry_run(&self) -> Result<ChartConfiguration> {
        let values = self.store.load_or_default()?;
        info!("using existing configuration (dry-run mode)");
        Ok(ChartConfiguration {
            base_values_path: self.store.base_path(),
            temp_values_path: Some(self.store.dry_run_path()),
            values,
            modified_sections: Vec::new(),
            deployment_mode: None,
        })
    }

    /// CI/CD path: the mode flag is mandatory and validation runs before
    /// any file is staged.
    fn resolve_non_interactive(
        &self,
        req: &InstallationRequest,
        ledger: &mut FileCleanupLedger,
    ) -> Result<ChartConfiguration> {
        let mode_str = req.deployment_mode.as_deref().ok_or_else(|| {
            InstallError::validation("deployment mode is required when running non-interactively")
        })?;
        let mode: DeploymentMode = mode_str.parse()?;
        warn!(mode = %mode, "running in non-interactive mode");

        let mut values = self.store.load_or_default()?;
        ValuesStore::apply_mode(&mut values, mode);

        let mut config = ChartConfiguration {
            base_values_path: self.store.base_path(),
            temp_values_path: None,
            values,
            modified_sections: Vec::new(),
            deployment_mode: Some(mode),
        };
        validate_configuration(&config)?;

        let staged = self.store.write_temp(&config.values)?;
        ledger.register(&staged);
        config.temp_values_path = Some(staged);
        Ok(config)
    }

    /// Mode is pre-selected; everything else is delegated to the wizard.
    async fn resolve_partial_interactive(
        &self,
        mode_str: &str,
        ledger: &mut FileCleanupLedger,
    ) -> Result<ChartConfiguration> {
        let mode: DeploymentMode = mode_str.parse()?;
        warn!(mode = %mode, "deployment mode pre-selected");

        let config = self.wizard.configure_with_mode(mode).await?;
        Self::register_staged(&config, ledger);
        Ok(config)
    }

    async fn resolve_fully_interactive(
        &self,
        ledger: &mut FileCleanupLedger,
    ) -> Result<ChartConfiguration> {
        let config = self.wizard.configure().await?;
        Self::register_staged(&config, ledger);
        Ok(config)
    }

    fn register_staged(config: &ChartConfiguration, ledger: &mut FileCleanupLedger) {
        if let Some(path) = &config.temp_values_path {
            ledger.register(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::traits::mocks::{stub_chart_configuration, CallLog, MockWizard};
    use tempfile::TempDir;

    fn setup(wizard: MockWizard) -> (TempDir, ConfigurationResolver) {
        let dir = TempDir::new().unwrap();
        let store = ValuesStore::new(dir.path());
        (dir, ConfigurationResolver::new(store, Arc::new(wizard)))
    }

    fn request(dry_run: bool, non_interactive: bool, mode: Option<&str>) -> InstallationRequest {
        InstallationRequest {
            dry_run,
            non_interactive,
            deployment_mode: mode.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn mode_selection_is_ordered() {
        use ConfigurationMode::*;
        assert_eq!(ConfigurationMode::select(true, true, true), DryRun);
        assert_eq!(ConfigurationMode::select(false, true, true), NonInteractive);
        assert_eq!(
            ConfigurationMode::select(false, false, true),
            PartialInteractive
        );
        assert_eq!(
            ConfigurationMode::select(false, false, false),
            FullyInteractive
        );
    }

    #[tokio::test]
    async fn dry_run_registers_nothing_and_creates_no_file() {
        let log = Arc::new(CallLog::default());
        let (dir, resolver) = setup(MockWizard::unused(log.clone()));
        let mut ledger = FileCleanupLedger::new(true);

        let config = resolver
            .resolve(&request(true, false, None), &mut ledger)
            .await
            .unwrap();

        assert!(config.modified_sections.is_empty());
        let staged = config.temp_values_path.unwrap();
        assert!(!staged.exists());
        assert!(ledger.dispositions().is_empty());
        assert!(log.calls().is_empty());
        // Base file untouched (it never existed).
        assert!(!dir.path().join(crate::values::BASE_VALUES_FILE).exists());
    }

    #[tokio::test]
    async fn non_interactive_without_mode_fails_before_any_collaborator() {
        let log = Arc::new(CallLog::default());
        let (_dir, resolver) = setup(MockWizard::unused(log.clone()));
        let mut ledger = FileCleanupLedger::new(true);

        let err = resolver
            .resolve(&request(false, true, None), &mut ledger)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("deployment mode is required"));
        assert!(log.calls().is_empty());
        assert!(ledger.dispositions().is_empty());
    }

    #[tokio::test]
    async fn non_interactive_invalid_mode_is_a_validation_error() {
        let log = Arc::new(CallLog::default());
        let (_dir, resolver) = setup(MockWizard::unused(log));
        let mut ledger = FileCleanupLedger::new(true);

        let err = resolver
            .resolve(&request(false, true, Some("saas")), &mut ledger)
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Validation(_)));
    }

    #[tokio::test]
    async fn non_interactive_self_hosted_stages_and_registers_a_file() {
        let log = Arc::new(CallLog::default());
        let (_dir, resolver) = setup(MockWizard::unused(log.clone()));
        let mut ledger = FileCleanupLedger::new(true);

        let config = resolver
            .resolve(&request(false, true, Some("self-hosted")), &mut ledger)
            .await
            .unwrap();

        let staged = config.temp_values_path.unwrap();
        assert!(staged.exists());
        assert_eq!(ledger.dispositions().len(), 1);
        assert_eq!(ledger.dispositions()[0].0, staged);
        assert!(log.calls().is_empty());
    }

    #[tokio::test]
    async fn non_interactive_managed_fails_validation_without_credentials() {
        let log = Arc::new(CallLog::default());
        let (_dir, resolver) = setup(MockWizard::unused(log));
        let mut ledger = FileCleanupLedger::new(true);

        let err = resolver
            .resolve(&request(false, true, Some("managed")), &mut ledger)
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::Validation(_)));
        // Validation is fail-fast: nothing was staged.
        assert!(ledger.dispositions().is_empty());
    }

    #[tokio::test]
    async fn partial_interactive_delegates_to_wizard_with_mode() {
        let log = Arc::new(CallLog::default());
        let mut stub = stub_chart_configuration(Some(DeploymentMode::Managed));
        stub.temp_values_path = Some("/tmp/staged.yaml".into());
        let (_dir, resolver) = setup(MockWizard::returning(stub, log.clone()));
        let mut ledger = FileCleanupLedger::new(true);

        let config = resolver
            .resolve(&request(false, false, Some("managed")), &mut ledger)
            .await
            .unwrap();

        assert_eq!(config.deployment_mode, Some(DeploymentMode::Managed));
        assert_eq!(
            log.calls(),
            vec!["wizard.configure_with_mode:managed".to_string()]
        );
        assert_eq!(ledger.dispositions().len(), 1);
    }

    #[tokio::test]
    async fn fully_interactive_delegates_everything_to_wizard() {
        let log = Arc::new(CallLog::default());
        let stub = stub_chart_configuration(Some(DeploymentMode::SelfHosted));
        let (_dir, resolver) = setup(MockWizard::returning(stub, log.clone()));
        let mut ledger = FileCleanupLedger::new(true);

        resolver
            .resolve(&request(false, false, None), &mut ledger)
            .await
            .unwrap();

        assert_eq!(log.calls(), vec!["wizard.configure".to_string()]);
        // Stub has no staged file, so nothing registers.
        assert!(ledger.dispositions().is_empty());
    }
}
