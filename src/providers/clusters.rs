//! Cluster discovery through the `k3d` CLI.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{InstallError, Result};
use crate::install::traits::{ClusterInfo, ClusterLister};
use crate::providers::ensure_success;

#[derive(Debug, Deserialize)]
struct K3dCluster {
    name: String,
    #[serde(rename = "serversRunning", default)]
    servers_running: u32,
}

impl From<K3dCluster> for ClusterInfo {
    fn from(cluster: K3dCluster) -> Self {
        let status = if cluster.servers_running > 0 {
            "running"
        } else {
            "stopped"
        };
        ClusterInfo {
            name: cluster.name,
            status: status.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct K3dClusterLister;

impl K3dClusterLister {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ClusterLister for K3dClusterLister {
    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>> {
        let output = tokio::process::Command::new("k3d")
            .args(["cluster", "list", "--output", "json"])
            .output()
            .await?;
        ensure_success(&output, "cluster listing")
            .map_err(|err| InstallError::Io(std::io::Error::other(err.to_string())))?;

        let clusters: Vec<K3dCluster> = serde_json::from_slice(&output.stdout)
            .map_err(|err| std::io::Error::other(format!("unexpected k3d output: {err}")))?;
        Ok(clusters.into_iter().map(ClusterInfo::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_running_state_from_server_counts() {
        let clusters: Vec<K3dCluster> = serde_json::from_str(
            r#"[{"name":"dev","serversRunning":1},{"name":"idle","serversRunning":0}]"#,
        )
        .unwrap();
        let infos: Vec<ClusterInfo> = clusters.into_iter().map(ClusterInfo::from).collect();
        assert_eq!(infos[0].status, "running");
        assert_eq!(infos[1].status, "stopped");
    }
}
