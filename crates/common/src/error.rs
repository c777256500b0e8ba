use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The run configuration cannot describe a valid network.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Allocation and sealer placement disagree.
    #[error("Configuration inconsistent: {0}")]
    ConfigInconsistent(String),

    #[error("Clean failure: {0}")]
    CleanFailure(String),

    #[error("Configure failure: {0}")]
    ConfigureFailure(String),

    /// At least one host failed to receive or start its nodes.
    #[error("Deploy failure: {0}")]
    DeployFailure(String),

    #[error("Workload failure: {0}")]
    WorkloadFailure(String),

    #[error("Extraction incomplete: {0}")]
    ExtractionIncomplete(String),

    /// The workload log predates the configuration that triggered the run.
    #[error("Stale result: log {} is older than config {}", log.display(), config.display())]
    StaleResult { log: PathBuf, config: PathBuf },

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl Error {
    /// Errors that abort a single attempt and may clear on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::CleanFailure(_)
                | Error::ConfigureFailure(_)
                | Error::DeployFailure(_)
                | Error::WorkloadFailure(_)
                | Error::ExtractionIncomplete(_)
                | Error::StaleResult { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::DeployFailure("h1".into()).is_transient());
        assert!(Error::ExtractionIncomplete("no marker".into()).is_transient());
        assert!(Error::StaleResult {
            log: "caliper.log".into(),
            config: "config.yaml".into(),
        }
        .is_transient());

        assert!(!Error::InvalidArgument("hosts".into()).is_transient());
        assert!(!Error::ConfigInconsistent("sealers".into()).is_transient());
        assert!(!Error::PersistenceFailure("disk full".into()).is_transient());
    }
}
