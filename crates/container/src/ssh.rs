use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::SshConfig;
use crate::RemoteExecutor;

/// Remote executor shelling out to `ssh` and `scp`
#[derive(Debug, Clone)]
pub struct SshExecutor {
    config: SshConfig,
}

impl SshExecutor {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    fn target(&self, host: &str) -> String {
        format!("{}@{}", self.config.user, host)
    }

    fn common_options(&self) -> Vec<String> {
        let mut options = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout),
        ];
        if self.config.password.is_none() {
            options.extend(["-o".to_string(), "BatchMode=yes".to_string()]);
        }
        options
    }

    /// Program and arguments of a remote shell command
    pub fn ssh_command(&self, host: &str, command: &str) -> Vec<String> {
        let mut args = self.password_prefix();
        args.push("ssh".to_string());
        args.extend(self.common_options());
        args.extend(["-p".to_string(), self.config.port.to_string()]);
        args.push(self.target(host));
        args.push(command.to_string());
        args
    }

    /// Program and arguments of a recursive copy to a host
    pub fn scp_command(&self, host: &str, local: &Path, remote: &str) -> Vec<String> {
        let mut args = self.password_prefix();
        args.push("scp".to_string());
        args.push("-r".to_string());
        args.extend(self.common_options());
        args.extend(["-P".to_string(), self.config.port.to_string()]);
        args.push(local.display().to_string());
        args.push(format!("{}:{}", self.target(host), remote));
        args
    }

    fn password_prefix(&self) -> Vec<String> {
        match &self.config.password {
            Some(password) => vec!["sshpass".to_string(), "-p".to_string(), password.clone()],
            None => Vec::new(),
        }
    }
}

async fn run(args: Vec<String>) -> Result<Output> {
    let Some((program, rest)) = args.split_first() else {
        return Err(anyhow!("Empty command"));
    };
    let output = Command::new(program)
        .args(rest)
        .output()
        .await
        .with_context(|| format!("Failed to spawn {}", program))?;
    if !output.status.success() {
        return Err(anyhow!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(output)
}

#[async_trait::async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(&self, host: &str, command: &str) -> Result<String> {
        debug!("[SSH] {}: {}", host, command);
        let output = run(self.ssh_command(host, command))
            .await
            .with_context(|| format!("Remote command on {} failed", host))?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn copy_directory(&self, host: &str, local: &Path, remote: &str) -> Result<()> {
        run(self.scp_command(host, local, remote))
            .await
            .with_context(|| format!("Copy of {} to {} failed", local.display(), host))?;
        info!("[SSH] Copied {} to {}:{}", local.display(), host, remote);
        Ok(())
    }
}
