use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Caliper invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaliperConfig {
    /// Program and leading arguments of the benchmark launcher
    #[serde(default = "default_command")]
    pub command: Vec<String>,

    /// Caliper workspace; relative paths below are resolved against it
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Directory holding `node`/`npx`, prepended to `PATH`
    #[serde(default)]
    pub node_bin_path: Option<PathBuf>,

    /// File receiving the launcher's stdout
    #[serde(default = "default_log")]
    pub log: PathBuf,

    /// HTML report written by caliper
    #[serde(default = "default_report")]
    pub report: PathBuf,

    /// Upper bound of one benchmark invocation in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_command() -> Vec<String> {
    ["npx", "caliper", "launch", "master"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}
fn default_log() -> PathBuf {
    PathBuf::from("caliper.log")
}
fn default_report() -> PathBuf {
    PathBuf::from("report.html")
}
fn default_timeout() -> u64 {
    3600
}

impl Default for CaliperConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            workspace: default_workspace(),
            node_bin_path: None,
            log: default_log(),
            report: default_report(),
            timeout: default_timeout(),
        }
    }
}

impl CaliperConfig {
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.resolve(&self.log)
    }

    pub fn report_path(&self) -> PathBuf {
        self.resolve(&self.report)
    }
}
