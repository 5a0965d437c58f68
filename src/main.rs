use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, trace};

use flotilla::install::{
    CancellationController, InstallationRequest, InstallationWorkflow, Installer, RetryPolicy,
};
use flotilla::providers::{
    GitBundleCloner, HelmManager, K3dClusterLister, KubectlConvergenceWaiter, MkcertRegenerator,
    TerminalUi, TerminalWizard,
};
use flotilla::values::ValuesStore;
use flotilla::InstallError;

/// Bootstrap a GitOps controller and application bundle onto local clusters
#[derive(Parser)]
#[command(name = "flotilla")]
#[command(about = "Install the GitOps controller and application bundle", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the chart stack on a cluster
    Chart {
        #[command(subcommand)]
        command: ChartCommands,
    },
}

#[derive(Subcommand)]
enum ChartCommands {
    /// Install the controller and application bundle
    Install {
        /// Cluster to install onto; prompts when omitted
        cluster: Vec<String>,

        /// Reinstall even when the charts are already present
        #[arg(long)]
        force: bool,

        /// Resolve configuration and stop before any installation
        #[arg(long)]
        dry_run: bool,

        /// Skip prompts; requires --deployment-mode
        #[arg(long)]
        non_interactive: bool,

        /// Deployment mode: self-hosted, managed, or managed-shared
        #[arg(long)]
        deployment_mode: Option<String>,

        /// Application bundle repository URL
        #[arg(long, default_value = "https://github.com/flotilla-dev/flotilla-bundle")]
        bundle_repo: String,

        /// Application bundle branch
        #[arg(long, default_value = "main")]
        bundle_branch: String,

        /// Directory for locally generated TLS certificates
        #[arg(long)]
        cert_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("flotilla started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = match cli.command {
        Commands::Chart {
            command:
                ChartCommands::Install {
                    cluster,
                    force,
                    dry_run,
                    non_interactive,
                    deployment_mode,
                    bundle_repo,
                    bundle_branch,
                    cert_dir,
                },
        } => {
            run_chart_install(InstallationRequest {
                cluster_args: cluster,
                force,
                dry_run,
                non_interactive,
                deployment_mode,
                bundle_repo,
                bundle_branch,
                cert_dir,
            })
            .await
        }
    };

    if let Err(err) = result {
        match err {
            InstallError::Cancelled => {
                eprintln!("Installation cancelled.");
                std::process::exit(130);
            }
            InstallError::AlreadyHandled => std::process::exit(1),
            InstallError::BranchNotFound { ref branch } => {
                eprintln!("Error: {err}");
                eprintln!(
                    "Hint: check that branch '{branch}' exists in the bundle repository, \
                     or pass a different --bundle-branch."
                );
                std::process::exit(1);
            }
            err => {
                eprintln!("Error: {err}");
                std::process::exit(1);
            }
        }
    }
}

async fn run_chart_install(req: InstallationRequest) -> flotilla::Result<()> {
    let store = ValuesStore::new(std::env::current_dir()?);
    let cert_dir = req
        .cert_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("certs"));

    let helm = Arc::new(HelmManager::new());
    let installer = Installer::new(
        helm.clone(),
        Arc::new(GitBundleCloner::new()),
        helm,
        Arc::new(KubectlConvergenceWaiter::new()),
    );

    let workflow = InstallationWorkflow::new(
        Arc::new(K3dClusterLister::new()),
        Arc::new(TerminalWizard::new(store.clone())),
        Arc::new(MkcertRegenerator::new(cert_dir)),
        Arc::new(TerminalUi::new()),
        installer,
        store,
        RetryPolicy::installation(),
        true,
    );

    let controller = CancellationController::new();
    workflow.execute(controller.token(), req).await
}
