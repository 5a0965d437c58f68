//! Chart installation workflow.
//!
//! - `cancel` - one-shot cancellation merged from signals and the caller
//! - `cleanup` - staged-file ledger with single terminal resolution
//! - `config` - request and configuration data model
//! - `installer` - the controller / bundle / convergence sequence
//! - `resolver` - the 4-way configuration mode state machine
//! - `retry` - policy-driven retry with cancellation precedence
//! - `traits` - collaborator seams
//! - `validation` - per-mode pre-flight requirement tables
//! - `workflow` - the composition root driving one invocation

pub mod cancel;
pub mod cleanup;
pub mod config;
pub mod installer;
pub mod resolver;
pub mod retry;
pub mod traits;
pub mod validation;
pub mod workflow;

pub use cancel::{CancelToken, CancellationController};
pub use cleanup::FileCleanupLedger;
pub use config::{ChartConfiguration, ChartInstallConfig, DeploymentMode, InstallationRequest};
pub use installer::Installer;
pub use resolver::{ConfigurationMode, ConfigurationResolver};
pub use retry::{RetryExecutor, RetryPolicy};
pub use workflow::InstallationWorkflow;
