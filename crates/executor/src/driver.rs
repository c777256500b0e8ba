use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::CaliperConfig;
use crate::{DriverOutput, WorkloadDriver};

/// Workload driver launching a caliper master process
#[derive(Debug, Clone)]
pub struct CaliperDriver {
    config: CaliperConfig,
}

impl CaliperDriver {
    pub fn new(config: CaliperConfig) -> Self {
        Self { config }
    }

    fn search_path(&self) -> Option<OsString> {
        let bin = self.config.node_bin_path.as_ref()?;
        let mut paths = vec![bin.clone()];
        if let Some(current) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&current));
        }
        std::env::join_paths(paths).ok()
    }

    fn command(&self, benchmark: &Path, network: &Path) -> Result<Command> {
        let Some((program, args)) = self.config.command.split_first() else {
            return Err(anyhow!("Caliper command is empty"));
        };
        let mut command = Command::new(program);
        command
            .args(args)
            .arg("--caliper-workspace")
            .arg(&self.config.workspace)
            .arg("--caliper-benchconfig")
            .arg(benchmark)
            .arg("--caliper-networkconfig")
            .arg(network)
            .current_dir(&self.config.workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = self.search_path() {
            command.env("PATH", path);
        }
        Ok(command)
    }

    async fn launch(&self, benchmark: &Path, network: &Path, log: &Path) -> Result<()> {
        let mut child = self
            .command(benchmark, network)?
            .spawn()
            .context("Failed to spawn caliper")?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("Caliper stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("Caliper stderr not captured"))?;
        let stderr_task = tokio::spawn(async move {
            let mut buffer = String::new();
            let _ = stderr.read_to_string(&mut buffer).await;
            buffer
        });

        let progress = ProgressBar::new_spinner();
        progress.set_style(ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {msg} ({pos} lines)",
        )?);
        progress.set_message("caliper benchmark");
        progress.enable_steady_tick(Duration::from_millis(120));

        let mut file = File::create(log)
            .await
            .with_context(|| format!("Failed to create {}", log.display()))?;
        // Raw bytes: caliper output is not guaranteed to be valid UTF-8.
        let mut lines = BufReader::new(stdout).split(b'\n');
        while let Some(line) = lines.next_segment().await? {
            file.write_all(&line).await?;
            file.write_all(b"\n").await?;
            progress.inc(1);
        }
        file.flush().await?;
        progress.finish_and_clear();

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        if !stderr.trim().is_empty() {
            debug!("Caliper stderr: {}", stderr.trim());
        }
        if !status.success() {
            return Err(anyhow!(
                "Caliper exited with {}: {}",
                status,
                stderr.lines().last().unwrap_or_default()
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl WorkloadDriver for CaliperDriver {
    async fn run(&self, benchmark: &Path, network: &Path) -> Result<DriverOutput> {
        let log = self.config.log_path();
        info!(
            "Launching caliper with {} and {}",
            benchmark.display(),
            network.display()
        );

        let timeout = Duration::from_secs(self.config.timeout);
        tokio::time::timeout(timeout, self.launch(benchmark, network, &log))
            .await
            .map_err(|_| anyhow!("Caliper did not finish within {}s", self.config.timeout))??;

        info!("Caliper finished, log written to {}", log.display());
        Ok(DriverOutput {
            log,
            report: self.config.report_path(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn driver(dir: &TempDir, script: &str) -> CaliperDriver {
        CaliperDriver::new(CaliperConfig {
            command: vec!["sh".into(), "-c".into(), script.into(), "sh".into()],
            workspace: dir.path().to_path_buf(),
            timeout: 30,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_output_is_logged() {
        let dir = TempDir::new().unwrap();
        let driver = driver(&dir, "echo starting; echo \"args: $*\"");
        let output = driver
            .run(Path::new("benchmark/config.yaml"), Path::new("network/fisco-bcos.json"))
            .await
            .unwrap();

        assert_eq!(output.log, dir.path().join("caliper.log"));
        assert_eq!(output.report, dir.path().join("report.html"));
        let log = std::fs::read_to_string(&output.log).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines[0], "starting");
        assert!(lines[1].contains("--caliper-benchconfig benchmark/config.yaml"));
        assert!(lines[1].contains("--caliper-networkconfig network/fisco-bcos.json"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_output_is_kept() {
        let dir = TempDir::new().unwrap();
        let driver = driver(&dir, "printf 'before\\377after\\n'; echo done");
        let output = driver
            .run(Path::new("b.yaml"), Path::new("n.json"))
            .await
            .unwrap();
        let log = std::fs::read(&output.log).unwrap();
        assert_eq!(log, b"before\xffafter\ndone\n");
    }

    #[tokio::test]
    async fn test_failed_launch() {
        let dir = TempDir::new().unwrap();
        let driver = driver(&dir, "echo partial; echo boom >&2; exit 2");
        let err = driver
            .run(Path::new("b.yaml"), Path::new("n.json"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(dir.path().join("caliper.log").exists());
    }

    #[tokio::test]
    async fn test_node_bin_path_is_searched_first() {
        let dir = TempDir::new().unwrap();
        let mut config = CaliperConfig {
            command: vec!["sh".into(), "-c".into(), "echo $PATH".into(), "sh".into()],
            workspace: dir.path().to_path_buf(),
            ..Default::default()
        };
        config.node_bin_path = Some(PathBuf::from("/opt/node/bin"));
        let output = CaliperDriver::new(config)
            .run(Path::new("b.yaml"), Path::new("n.json"))
            .await
            .unwrap();
        let log = std::fs::read_to_string(output.log).unwrap();
        assert!(log.starts_with("/opt/node/bin:"));
    }
}
