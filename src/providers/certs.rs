//! Local TLS certificate regeneration via `mkcert`.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{InstallError, Result};
use crate::install::traits::CertificateRegenerator;
use crate::providers::ensure_success;

const CERT_FILE: &str = "cert.pem";
const KEY_FILE: &str = "key.pem";
const CERT_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

/// Regenerates the local ingress certificate with `mkcert`. Failures here
/// are reported but never block an installation.
#[derive(Debug, Clone)]
pub struct MkcertRegenerator {
    cert_dir: PathBuf,
}

impl MkcertRegenerator {
    pub fn new(cert_dir: impl Into<PathBuf>) -> Self {
        Self {
            cert_dir: cert_dir.into(),
        }
    }
}

#[async_trait]
impl CertificateRegenerator for MkcertRegenerator {
    async fn regenerate(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.cert_dir).await?;

        let cert_file = self.cert_dir.join(CERT_FILE).display().to_string();
        let key_file = self.cert_dir.join(KEY_FILE).display().to_string();
        let mut args = vec![
            "-cert-file".to_string(),
            cert_file,
            "-key-file".to_string(),
            key_file,
        ];
        args.extend(CERT_HOSTS.iter().map(|h| h.to_string()));

        debug!(dir = %self.cert_dir.display(), "regenerating local certificates");
        let output = tokio::process::Command::new("mkcert")
            .args(&args)
            .output()
            .await?;
        ensure_success(&output, "certificate regeneration").map_err(|err| {
            InstallError::component("certificates", "regeneration", "local", err)
        })
    }
}
