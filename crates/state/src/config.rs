use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// CSV table every run appends to
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Directory collecting each measured run's log and report
    #[serde(default = "default_history_dir")]
    pub history_dir: PathBuf,

    #[serde(default = "default_archive")]
    pub archive: bool,
}

fn default_path() -> PathBuf {
    PathBuf::from("results.csv")
}
fn default_history_dir() -> PathBuf {
    PathBuf::from("caliper_history")
}
fn default_archive() -> bool {
    true
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            history_dir: default_history_dir(),
            archive: default_archive(),
        }
    }
}
