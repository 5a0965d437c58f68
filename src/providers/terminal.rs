//! Terminal prompts for cluster selection and confirmation.

use async_trait::async_trait;
use std::io::{BufRead, Write};
use tracing::info;

use crate::error::{InstallError, Result};
use crate::install::traits::{ClusterInfo, OperationsUi};

/// Blocking stdin read, pushed onto the blocking pool so the runtime stays
/// responsive to signals while a prompt is open.
pub(crate) async fn prompt(message: String) -> Result<String> {
    let answer = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
        let mut stdout = std::io::stdout().lock();
        write!(stdout, "{message}")?;
        stdout.flush()?;
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    })
    .await
    .map_err(|err| std::io::Error::other(err.to_string()))??;
    Ok(answer)
}

#[derive(Debug, Clone, Default)]
pub struct TerminalUi;

impl TerminalUi {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OperationsUi for TerminalUi {
    async fn select_cluster(
        &self,
        clusters: &[ClusterInfo],
        args: &[String],
    ) -> Result<Option<String>> {
        if let Some(requested) = args.first() {
            if clusters.iter().any(|c| &c.name == requested) {
                return Ok(Some(requested.clone()));
            }
            return Err(InstallError::validation(format!(
                "cluster '{requested}' not found"
            )));
        }

        match clusters {
            [] => Ok(None),
            [only] => {
                info!(cluster = %only.name, "using the only available cluster");
                Ok(Some(only.name.clone()))
            }
            _ => {
                let mut menu = String::from("Select a cluster:\n");
                for (index, cluster) in clusters.iter().enumerate() {
                    menu.push_str(&format!(
                        "  {}. {} ({})\n",
                        index + 1,
                        cluster.name,
                        cluster.status
                    ));
                }
                menu.push_str("Choice: ");
                let answer = prompt(menu).await?;
                let choice: usize = answer
                    .parse()
                    .map_err(|_| InstallError::validation("invalid cluster selection"))?;
                clusters
                    .get(choice.wrapping_sub(1))
                    .map(|c| Some(c.name.clone()))
                    .ok_or_else(|| InstallError::validation("invalid cluster selection"))
            }
        }
    }

    async fn confirm_installation(&self, cluster_name: &str) -> Result<bool> {
        let answer = prompt(format!(
            "Install charts on cluster '{cluster_name}'? [y/N] "
        ))
        .await?;
        Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }
}
