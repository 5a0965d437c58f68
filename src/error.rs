//! Error taxonomy for the installation workflow.
//!
//! Classification drives behavior: validation and branch-not-found errors
//! surface immediately and are never retried, component errors may carry a
//! recoverable flag with a suggested wait, and cancellation is kept distinct
//! from failure so the CLI can render a neutral message.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstallError {
    /// Pre-flight validation failure. Never retried, never wrapped.
    #[error("{0}")]
    Validation(String),

    /// The requested bundle repository branch does not exist. User-input
    /// class: passed through unwrapped so the CLI can suggest remediation.
    #[error("branch '{branch}' does not exist in the bundle repository")]
    BranchNotFound { branch: String },

    /// An external component call failed.
    #[error("{component} {operation} failed for cluster '{cluster_name}': {source}")]
    Component {
        component: &'static str,
        operation: &'static str,
        cluster_name: String,
        recoverable: bool,
        retry_after: Option<Duration>,
        #[source]
        source: anyhow::Error,
    },

    /// The invocation was cancelled, by signal or by the caller's token.
    #[error("installation cancelled")]
    Cancelled,

    /// A lower layer already rendered the user-facing message; only the
    /// exit code propagates.
    #[error("error already reported")]
    AlreadyHandled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl InstallError {
    pub fn validation(message: impl Into<String>) -> Self {
        InstallError::Validation(message.into())
    }

    pub fn branch_not_found(branch: impl Into<String>) -> Self {
        InstallError::BranchNotFound {
            branch: branch.into(),
        }
    }

    /// Fatal component error, not eligible for retry.
    pub fn component(
        component: &'static str,
        operation: &'static str,
        cluster_name: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        InstallError::Component {
            component,
            operation,
            cluster_name: cluster_name.into(),
            recoverable: false,
            retry_after: None,
            source,
        }
    }

    /// Recoverable component error with a suggested minimum wait before
    /// the next attempt.
    pub fn recoverable(
        component: &'static str,
        operation: &'static str,
        cluster_name: impl Into<String>,
        source: anyhow::Error,
        retry_after: Duration,
    ) -> Self {
        InstallError::Component {
            component,
            operation,
            cluster_name: cluster_name.into(),
            recoverable: true,
            retry_after: Some(retry_after),
            source,
        }
    }

    /// Whether the retry executor may attempt this operation again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            InstallError::Component {
                recoverable: true,
                ..
            }
        )
    }

    /// Suggested lower bound on the wait before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            InstallError::Component { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, InstallError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, InstallError>;
