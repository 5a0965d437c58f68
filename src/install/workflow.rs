//! The installation workflow: composition root for one `chart install`
//! invocation.
//!
//! Owns the request, the resolved configuration, and the cleanup ledger for
//! the duration of the call. Exactly two tasks run per invocation: this
//! sequential workflow and the signal listener, which only cancels the
//! shared token.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{InstallError, Result};
use crate::install::cancel::{CancelToken, CancellationController};
use crate::install::cleanup::FileCleanupLedger;
use crate::install::config::{build_install_config, InstallationRequest};
use crate::install::installer::Installer;
use crate::install::resolver::ConfigurationResolver;
use crate::install::retry::{RetryExecutor, RetryPolicy};
use crate::install::traits::{
    CertificateRegenerator, ClusterLister, ConfigurationWizard, OperationsUi,
};
use crate::values::ValuesStore;

pub struct InstallationWorkflow {
    clusters: Arc<dyn ClusterLister>,
    certificates: Arc<dyn CertificateRegenerator>,
    ui: Arc<dyn OperationsUi>,
    resolver: ConfigurationResolver,
    installer: Installer,
    retry_policy: RetryPolicy,
    /// When set, failed runs preserve staged values files for post-mortem
    /// inspection. Explicit per-workflow value; tests construct their own.
    cleanup_on_success_only: bool,
}

impl InstallationWorkflow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clusters: Arc<dyn ClusterLister>,
        wizard: Arc<dyn ConfigurationWizard>,
        certificates: Arc<dyn CertificateRegenerator>,
        ui: Arc<dyn OperationsUi>,
        installer: Installer,
        store: ValuesStore,
        retry_policy: RetryPolicy,
        cleanup_on_success_only: bool,
    ) -> Self {
        Self {
            clusters,
            certificates,
            ui,
            resolver: ConfigurationResolver::new(store, wizard),
            installer,
            retry_policy,
            cleanup_on_success_only,
        }
    }

    /// Run the installation end to end. The caller's token is merged with a
    /// scoped SIGINT/SIGTERM listener; on any terminal outcome exactly one
    /// ledger resolution runs.
    pub async fn execute(&self, parent: CancelToken, req: InstallationRequest) -> Result<()> {
        let mut controller = CancellationController::new();
        controller.link_parent(parent);
        controller.listen_for_signals()?;
        let cancel = controller.token();

        let mut ledger = FileCleanupLedger::new(self.cleanup_on_success_only);
        let outcome = self.run(&cancel, &req, &mut ledger).await;

        match outcome {
            Ok(()) if cancel.is_cancelled() => {
                // The last phase completed but the user asked to stop:
                // surface the cancelled outcome, clean up silently.
                ledger.discard_files();
                Err(InstallError::Cancelled)
            }
            Ok(()) => {
                ledger.discard_files();
                Ok(())
            }
            Err(err) if err.is_cancelled() => {
                // Cancellation cleans up silently; only failures may
                // preserve staged files.
                ledger.discard_files();
                info!("installation cancelled");
                Err(err)
            }
            Err(err) => {
                ledger.restore_files();
                debug!(error = %err, "installation failed, staged files resolved");
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        cancel: &CancelToken,
        req: &InstallationRequest,
        ledger: &mut FileCleanupLedger,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }

        let chart_config = self.resolver.resolve(req, ledger).await?;

        let Some(cluster_name) = self.select_cluster(req).await? else {
            info!("no cluster selected, nothing to install");
            return Ok(());
        };

        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }

        if !req.non_interactive {
            if !self.ui.confirm_installation(&cluster_name).await? {
                info!("installation declined");
                return Err(InstallError::Cancelled);
            }
            // Best-effort: an install against previously generated
            // certificates still works, so a failure here never aborts.
            if let Err(err) = self.certificates.regenerate().await {
                warn!(error = %err, "certificate regeneration failed, continuing");
            }
        } else {
            debug!("skipping confirmation and certificate regeneration (non-interactive)");
        }

        let install_config = build_install_config(req, &cluster_name, &chart_config);

        if req.dry_run {
            info!(
                cluster = %install_config.cluster_name,
                bundle = install_config.has_bundle(),
                "dry run: skipping controller and bundle installation"
            );
            return Ok(());
        }

        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }

        let executor = RetryExecutor::new(self.retry_policy.clone());
        executor
            .execute(cancel, || {
                self.installer.install_charts(cancel, &install_config)
            })
            .await
    }

    async fn select_cluster(&self, req: &InstallationRequest) -> Result<Option<String>> {
        let clusters = self.clusters.list_clusters().await?;
        if clusters.is_empty() && req.cluster_args.is_empty() {
            return Ok(None);
        }
        self.ui.select_cluster(&clusters, &req.cluster_args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::cleanup::Disposition;
    use crate::install::traits::mocks::*;
    use crate::install::traits::ClusterInfo;
    use crate::values::BASE_VALUES_FILE;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        log: Arc<CallLog>,
        steps: Arc<MockInstallSteps>,
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let log = Arc::new(CallLog::default());
            Self {
                steps: Arc::new(MockInstallSteps::succeeding(log.clone())),
                log,
                dir: TempDir::new().unwrap(),
            }
        }

        fn workflow(&self, confirm: bool, cleanup_on_success_only: bool) -> InstallationWorkflow {
            InstallationWorkflow::new(
                Arc::new(MockClusterLister {
                    clusters: vec![ClusterInfo {
                        name: "demo".into(),
                        status: "running".into(),
                    }],
                    log: self.log.clone(),
                }),
                Arc::new(MockWizard::unused(self.log.clone())),
                Arc::new(MockCertificates {
                    fail: false,
                    log: self.log.clone(),
                }),
                Arc::new(MockUi {
                    confirm,
                    log: self.log.clone(),
                }),
                Installer::new(
                    self.steps.clone(),
                    self.steps.clone(),
                    self.steps.clone(),
                    self.steps.clone(),
                ),
                ValuesStore::new(self.dir.path()),
                RetryPolicy {
                    attempts: 3,
                    initial_delay: Duration::from_millis(2),
                    max_delay: Duration::from_millis(10),
                    ..Default::default()
                },
                cleanup_on_success_only,
            )
        }

        /// Workflow for the fully interactive path: the wizard returns a
        /// stub self-hosted configuration with a real staged file.
        fn interactive_workflow(&self, confirm: bool, certs_fail: bool) -> InstallationWorkflow {
            let store = ValuesStore::new(self.dir.path());
            let mut stub = stub_chart_configuration(Some(
                crate::install::config::DeploymentMode::SelfHosted,
            ));
            stub.temp_values_path = Some(store.write_temp(&stub.values).unwrap());
            InstallationWorkflow::new(
                Arc::new(MockClusterLister {
                    clusters: vec![ClusterInfo {
                        name: "demo".into(),
                        status: "running".into(),
                    }],
                    log: self.log.clone(),
                }),
                Arc::new(MockWizard::returning(stub, self.log.clone())),
                Arc::new(MockCertificates {
                    fail: certs_fail,
                    log: self.log.clone(),
                }),
                Arc::new(MockUi {
                    confirm,
                    log: self.log.clone(),
                }),
                Installer::new(
                    self.steps.clone(),
                    self.steps.clone(),
                    self.steps.clone(),
                    self.steps.clone(),
                ),
                store,
                RetryPolicy::default(),
                true,
            )
        }

        fn staged_files(&self) -> Vec<std::path::PathBuf> {
            std::fs::read_dir(self.dir.path())
                .unwrap()
                .map(|e| e.unwrap().path())
                .collect()
        }
    }

    fn request() -> InstallationRequest {
        InstallationRequest {
            cluster_args: vec!["demo".into()],
            bundle_repo: "https://example.com/bundle".into(),
            bundle_branch: "main".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn dry_run_against_empty_base_config_succeeds_without_installing() {
        let fixture = Fixture::new();
        let workflow = fixture.workflow(true, true);
        let mut req = request();
        req.dry_run = true;

        workflow
            .execute(CancelToken::never(), req)
            .await
            .unwrap();

        // No installing collaborator was invoked and no temp file exists.
        assert_eq!(fixture.log.count("controller.install"), 0);
        assert_eq!(fixture.log.count("bundle."), 0);
        assert_eq!(fixture.log.count("convergence."), 0);
        assert!(!fixture.dir.path().join(BASE_VALUES_FILE).exists());
        let staged: Vec<_> = std::fs::read_dir(fixture.dir.path())
            .unwrap()
            .collect();
        assert!(staged.is_empty());
    }

    #[tokio::test]
    async fn non_interactive_without_mode_fails_with_zero_collaborator_calls() {
        let fixture = Fixture::new();
        let workflow = fixture.workflow(true, true);
        let mut req = request();
        req.non_interactive = true;

        let err = workflow
            .execute(CancelToken::never(), req)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("deployment mode is required"));
        assert!(fixture.log.calls().is_empty());
    }

    #[tokio::test]
    async fn successful_run_resolves_ledger_on_success_path() {
        let fixture = Fixture::new();
        let workflow = fixture.workflow(true, true);
        let mut req = request();
        req.non_interactive = true;
        req.deployment_mode = Some("self-hosted".into());

        workflow
            .execute(CancelToken::never(), req)
            .await
            .unwrap();

        // Full phase sequence ran exactly once.
        assert_eq!(fixture.log.count("controller.install"), 1);
        assert_eq!(fixture.log.count("bundle.install"), 1);
        assert_eq!(fixture.log.count("convergence.wait"), 1);
        // Success deletes the staged file.
        let staged: Vec<_> = std::fs::read_dir(fixture.dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert!(staged.is_empty(), "staged files left behind: {staged:?}");
    }

    #[tokio::test]
    async fn failed_run_preserves_staged_file_when_flag_is_set() {
        let fixture = Fixture::new();
        fixture.steps.controller_errors.lock().unwrap().push(
            crate::error::InstallError::component(
                "controller",
                "installation",
                "demo",
                anyhow::anyhow!("helm exploded"),
            ),
        );
        let workflow = fixture.workflow(true, true);
        let mut req = request();
        req.non_interactive = true;
        req.deployment_mode = Some("self-hosted".into());

        let err = workflow
            .execute(CancelToken::never(), req)
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Component { .. }));

        // Staged file preserved for post-mortem.
        let staged: Vec<_> = std::fs::read_dir(fixture.dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(staged.len(), 1);
    }

    #[tokio::test]
    async fn recoverable_failure_is_retried_to_success() {
        let fixture = Fixture::new();
        fixture.steps.convergence_errors.lock().unwrap().push(
            crate::error::InstallError::recoverable(
                "controller",
                "convergence",
                "demo",
                anyhow::anyhow!("not yet synced"),
                Duration::from_millis(1),
            ),
        );
        let workflow = fixture.workflow(true, true);
        let mut req = request();
        req.non_interactive = true;
        req.deployment_mode = Some("self-hosted".into());

        workflow
            .execute(CancelToken::never(), req)
            .await
            .unwrap();

        // Two installer passes: the failed one and the successful retry.
        assert_eq!(fixture.log.count("controller.install"), 2);
    }

    #[tokio::test]
    async fn declined_confirmation_is_a_cancelled_outcome() {
        let fixture = Fixture::new();
        let workflow = fixture.interactive_workflow(false, false);

        let err = workflow
            .execute(CancelToken::never(), request())
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::Cancelled));
        // The prompt was reached and declined; nothing past it ran.
        assert_eq!(fixture.log.count("ui.confirm"), 1);
        assert_eq!(fixture.log.count("controller.install"), 0);
        assert_eq!(fixture.log.count("certificates."), 0);
    }

    #[tokio::test]
    async fn parent_cancellation_before_start_cancels_the_run() {
        let fixture = Fixture::new();
        let workflow = fixture.workflow(true, true);
        let parent = CancellationController::new();
        parent.cancel();

        let err = workflow
            .execute(parent.token(), request())
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::Cancelled));
        assert_eq!(fixture.log.count("controller.install"), 0);
    }

    #[tokio::test]
    async fn certificate_failure_is_non_fatal() {
        let fixture = Fixture::new();
        let workflow = fixture.interactive_workflow(true, true);

        // The failing certificate regeneration must not abort the install.
        workflow
            .execute(CancelToken::never(), request())
            .await
            .unwrap();

        assert_eq!(fixture.log.count("certificates.regenerate"), 1);
        assert_eq!(fixture.log.count("controller.install"), 1);
    }

    #[tokio::test]
    async fn cancelled_run_discards_the_staged_file() {
        let fixture = Fixture::new();
        fixture
            .steps
            .controller_errors
            .lock()
            .unwrap()
            .push(InstallError::Cancelled);
        let workflow = fixture.interactive_workflow(true, false);

        let err = workflow
            .execute(CancelToken::never(), request())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Cancelled));

        // Cancellation cleans up silently even with preserve-on-failure set.
        assert!(fixture.staged_files().is_empty());
    }

    #[tokio::test]
    async fn exactly_one_ledger_resolution_per_outcome() {
        // Exercised indirectly above; here assert the ledger API contract
        // the workflow relies on.
        let mut ledger = FileCleanupLedger::new(true);
        ledger.register("/tmp/a.yaml");
        ledger.restore_files();
        ledger.discard_files();
        assert_eq!(ledger.dispositions()[0].1, Disposition::Preserved);
    }
}
