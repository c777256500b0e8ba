use ab_common::{config_fingerprint, Error, ResultRecord, Result, RunConfig, RunResult};
use ab_container::{NodeRuntime, RemoteExecutor};
use ab_executor::{extract_file, DriverOutput, WorkloadDriver};
use ab_network::ArtifactGenerator;
use ab_state::{ResultSink, RunArchive};
use ab_topology::{plan_topology, ConfigSynthesizer, HostLayout};
use chrono::Local;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::deploy::{clean_hosts, deploy_hosts};
use crate::policy::RetryPolicy;
use crate::state::RunState;

/// External capabilities a run is delegated to
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub artifacts: Arc<dyn ArtifactGenerator>,
    pub executor: Arc<dyn RemoteExecutor>,
    pub runtime: Arc<dyn NodeRuntime>,
    pub driver: Arc<dyn WorkloadDriver>,
    pub sink: Arc<dyn ResultSink>,
    pub archive: Option<RunArchive>,
}

/// What a finished run left in the result table
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    /// Attempts made, including the successful one
    pub attempts: u32,
    pub result: RunResult,
    pub records: usize,
}

impl RunOutcome {
    pub fn is_measured(&self) -> bool {
        self.result.is_measured()
    }
}

/// Executes runs as a bounded-retry state machine.
///
/// One attempt walks Cleaning, Configuring, Deploying, Executing and
/// Extracting. A transient failure aborts the attempt; after the last attempt
/// an unmeasured result is persisted instead, so every accepted run leaves
/// exactly one record set behind.
#[derive(Debug)]
pub struct RunController {
    collaborators: Collaborators,
    layout: HostLayout,
    flag: String,
    policy: RetryPolicy,
    state: RunState,
    transitions: Vec<RunState>,
}

impl RunController {
    pub fn new(
        collaborators: Collaborators,
        layout: HostLayout,
        flag: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            collaborators,
            layout,
            flag: flag.into(),
            policy,
            state: RunState::Idle,
            transitions: vec![RunState::Idle],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state entered since the controller was created
    pub fn transitions(&self) -> &[RunState] {
        &self.transitions
    }

    fn enter(&mut self, run_id: &Uuid, attempt: u32, next: RunState) {
        info!(%run_id, attempt, "{} -> {}", self.state, next);
        self.state = next;
        self.transitions.push(next);
    }

    /// Execute one run to completion
    ///
    /// Invalid configurations and persistence failures are returned; every
    /// other failure ends in a persisted unmeasured result.
    pub async fn execute(&mut self, config: &RunConfig) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4();
        self.state = RunState::Idle;

        let topology = match config.validate().and_then(|_| plan_topology(config)) {
            Ok((_, topology)) => topology,
            Err(e) => {
                error!(%run_id, "Rejected run configuration: {}", e);
                self.enter(&run_id, 0, RunState::Failed);
                return Err(e);
            }
        };
        info!(
            %run_id,
            nodes = config.node_count,
            sealers = config.sealer_count,
            hosts = config.host_count(),
            workload = config.workload.name(),
            "Starting run"
        );

        let mut attempts = 0;
        let mut measured = None;
        for attempt in 1..=self.policy.attempts() {
            if attempt > 1 {
                info!(
                    %run_id,
                    attempt,
                    "Cooling down for {}s before retrying",
                    self.policy.cooldown_secs
                );
                tokio::time::sleep(self.policy.cooldown()).await;
            }
            attempts = attempt;

            match self.attempt(&run_id, attempt, config, &topology).await {
                Ok(found) => {
                    measured = Some(found);
                    break;
                }
                Err(e) if e.is_transient() => {
                    warn!(%run_id, attempt, "Attempt failed in {}: {}", self.state, e);
                }
                Err(e) => {
                    error!(%run_id, attempt, "Run aborted in {}: {}", self.state, e);
                    self.enter(&run_id, attempt, RunState::Failed);
                    return Err(e);
                }
            }
        }

        let (result, output) = match measured {
            Some((result, output)) => (result, Some(output)),
            None => {
                warn!(
                    %run_id,
                    "All {} attempts failed, recording an unmeasured result",
                    attempts
                );
                let sentinel =
                    RunResult::unmeasured(config.round_labels(), Local::now().naive_local());
                (sentinel, None)
            }
        };

        self.enter(&run_id, attempts, RunState::Persisting);
        let fingerprint = config_fingerprint(&self.flag, &config.hosts);
        let records = ResultRecord::from_run(config, &fingerprint, &result);
        let written = match self.collaborators.sink.append(&records) {
            Ok(written) => written,
            Err(e) => {
                error!(%run_id, "Failed to persist results: {}", e);
                self.enter(&run_id, attempts, RunState::Failed);
                return Err(e);
            }
        };

        if let (Some(archive), Some(output)) = (&self.collaborators.archive, &output) {
            if let Err(e) = archive
                .store(&result.timestamp, &output.log, &output.report)
                .await
            {
                warn!(%run_id, "Failed to archive run history: {:#}", e);
            }
        }

        self.enter(&run_id, attempts, RunState::Done);
        Ok(RunOutcome {
            run_id,
            attempts,
            result,
            records: written,
        })
    }

    async fn attempt(
        &mut self,
        run_id: &Uuid,
        attempt: u32,
        config: &RunConfig,
        topology: &ConfigSynthesizer,
    ) -> Result<(RunResult, DriverOutput)> {
        let c = self.collaborators.clone();

        self.enter(run_id, attempt, RunState::Cleaning);
        c.artifacts
            .clean()
            .await
            .map_err(|e| Error::CleanFailure(format!("{:#}", e)))?;
        clean_hosts(&config.hosts, c.executor.as_ref(), c.runtime.as_ref(), &self.layout).await?;

        self.enter(run_id, attempt, RunState::Configuring);
        let artifacts = c
            .artifacts
            .generate(config, topology)
            .await
            .map_err(|e| Error::ConfigureFailure(format!("{:#}", e)))?;

        self.enter(run_id, attempt, RunState::Deploying);
        deploy_hosts(
            topology,
            &artifacts.nodes_dir,
            c.executor.as_ref(),
            c.runtime.as_ref(),
            &self.layout,
        )
        .await?;

        self.enter(run_id, attempt, RunState::Executing);
        let output = c
            .driver
            .run(&artifacts.benchmark_descriptor, &artifacts.network_descriptor)
            .await
            .map_err(|e| Error::WorkloadFailure(format!("{:#}", e)))?;

        self.enter(run_id, attempt, RunState::Extracting);
        let result = extract_file(&output.log, artifacts.config_artifact(), config.workload).await?;
        Ok((result, output))
    }

    /// Run only the cleaning stage against a set of hosts
    pub async fn clean(&mut self, hosts: &[String]) -> Result<()> {
        let run_id = Uuid::new_v4();
        self.enter(&run_id, 0, RunState::Cleaning);
        let c = self.collaborators.clone();
        let cleaned = match c.artifacts.clean().await {
            Ok(()) => clean_hosts(hosts, c.executor.as_ref(), c.runtime.as_ref(), &self.layout).await,
            Err(e) => Err(Error::CleanFailure(format!("{:#}", e))),
        };
        let next = if cleaned.is_ok() {
            RunState::Done
        } else {
            RunState::Failed
        };
        self.enter(&run_id, 0, next);
        cleaned
    }
}
