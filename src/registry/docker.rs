//! Docker image transport
//!
//! Docker images are not plain files in the registry, so they are moved with
//! the `docker` CLI: pulled from the source's docker endpoint into the local
//! daemon, then re-tagged and pushed to the destination's endpoint. The daemon
//! and its credential store are shared, which is why only one docker transfer
//! may run at a time.

use crate::error::{Result, SyncError};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone, Default)]
pub struct DockerTransport {
    pull_host: Option<String>,
    push_host: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl DockerTransport {
    pub fn new(pull_host: Option<String>, push_host: Option<String>) -> Self {
        Self {
            pull_host,
            push_host,
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    /// Fully qualified image reference on `host`
    pub fn image_ref(host: &str, image: &str, tag: &str) -> String {
        format!("{}/{}:{}", host.trim_end_matches('/'), image, tag)
    }

    fn pull_host(&self) -> Result<&str> {
        self.pull_host
            .as_deref()
            .ok_or_else(|| SyncError::Configuration("DOCKER_PULL_URL not set".to_string()))
    }

    fn push_host(&self) -> Result<&str> {
        self.push_host
            .as_deref()
            .ok_or_else(|| SyncError::Configuration("DOCKER_PUSH_URL not set".to_string()))
    }

    /// Pull `image:tag` from the pull endpoint into the local daemon
    pub async fn pull(&self, image: &str, tag: &str) -> Result<()> {
        let host = self.pull_host()?;
        self.login(host).await?;
        self.run(&["pull", &Self::image_ref(host, image, tag)]).await
    }

    /// Re-tag the pulled image for the push endpoint and push it
    pub async fn push(&self, image: &str, tag: &str) -> Result<()> {
        let source = Self::image_ref(self.pull_host()?, image, tag);
        let host = self.push_host()?;
        let target = Self::image_ref(host, image, tag);

        self.login(host).await?;
        self.run(&["tag", &source, &target]).await?;
        self.run(&["push", &target]).await
    }

    async fn login(&self, host: &str) -> Result<()> {
        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Ok(());
        };

        let mut child = Command::new("docker")
            .args(["login", host, "--username", username, "--password-stdin"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SyncError::Transfer(format!("Failed to start docker login: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(password.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(SyncError::Authentication(format!(
                "docker login to {} failed: {}",
                host,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn run(&self, args: &[&str]) -> Result<()> {
        let output = Command::new("docker")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SyncError::Transfer(format!("Failed to start docker {}: {}", args[0], e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(SyncError::Transfer(format!(
                "docker {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}
