//! Production collaborator implementations backed by external tools.
//!
//! Each provider shells out to the corresponding CLI (`helm`, `git`,
//! `kubectl`, `mkcert`) and folds stderr into the returned error. Commands
//! are raced against the cancellation token so a pending subprocess does
//! not hold up a cancelled run longer than necessary.

pub mod certs;
pub mod clusters;
pub mod git;
pub mod helm;
pub mod kubectl;
pub mod terminal;
pub mod wizard;

pub use certs::MkcertRegenerator;
pub use clusters::K3dClusterLister;
pub use git::GitBundleCloner;
pub use helm::HelmManager;
pub use kubectl::KubectlConvergenceWaiter;
pub use terminal::TerminalUi;
pub use wizard::TerminalWizard;

use std::process::Output;

use crate::error::{InstallError, Result};
use crate::install::cancel::CancelToken;

/// Run an external tool, racing it against cancellation.
pub(crate) async fn run_tool(
    cancel: &CancelToken,
    program: &str,
    args: &[&str],
) -> Result<Output> {
    let mut command = tokio::process::Command::new(program);
    command.args(args).kill_on_drop(true);

    tokio::select! {
        _ = cancel.cancelled() => Err(InstallError::Cancelled),
        result = command.output() => Ok(result?),
    }
}

/// Fold a failed exit status into an error carrying the trimmed stderr.
pub(crate) fn ensure_success(output: &Output, description: &str) -> anyhow::Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("{description} failed: {}", stderr.trim())
}
