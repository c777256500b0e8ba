pub mod error;
pub mod types;
pub mod utils;

pub use error::{Error, Result};
pub use types::{
    ConsensusKind, ResultRecord, RoundMetrics, RoundOutcome, RoundResult, RunConfig, RunResult,
    StorageKind, Workload,
};
pub use utils::{config_fingerprint, ConfigFingerprint};
