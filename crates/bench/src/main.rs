mod settings;

use ab_common::{config_fingerprint, Error};
use ab_container::{config::host_layout, create_node_runtime, create_remote_executor};
use ab_executor::create_workload_driver;
use ab_network::create_artifact_generator;
use ab_runner::{Collaborators, RunController};
use ab_state::{create_result_sink, create_run_archive};
use ab_topology::plan_topology;
use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use settings::{load_config, AppConfig};

/// autobench - repeatable distributed benchmark runs of FISCO BCOS networks
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to the configuration file
    #[clap(short, long, default_value = "autobench.toml")]
    config: String,

    /// Log level, used when RUST_LOG is unset
    #[clap(short, long, default_value = "info")]
    log_level: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute the configured runs in order
    Run {
        /// Execute only the run at this index
        #[clap(long)]
        only: Option<usize>,
    },
    /// Validate every run and print its node placement
    Plan,
    /// Remove local artifacts and every host's nodes
    Clean,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let config = load_config(Path::new(&args.config))?;
    info!("Using configuration file: {}", args.config);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async {
            match args.command {
                Command::Run { only } => run_sweep(&config, only).await,
                Command::Plan => plan(&config),
                Command::Clean => clean(&config).await,
            }
        })
}

fn build_controller(config: &AppConfig) -> RunController {
    let layout = host_layout(&config.ssh, &config.docker);
    let collaborators = Collaborators {
        artifacts: create_artifact_generator(config.bench.clone(), layout.clone()),
        executor: create_remote_executor(config.ssh.clone()),
        runtime: create_node_runtime(config.docker.clone(), layout.clone(), config.bench.ports),
        driver: create_workload_driver(config.caliper.clone()),
        sink: create_result_sink(&config.sink),
        archive: create_run_archive(&config.sink),
    };
    RunController::new(collaborators, layout, config.bench.agency.clone(), config.retry)
}

/// Execute runs one at a time against the hosts
async fn run_sweep(config: &AppConfig, only: Option<usize>) -> Result<()> {
    let selected: Vec<usize> = match only {
        Some(index) if index < config.runs.len() => vec![index],
        Some(index) => bail!(
            "Run index {} out of range, {} runs configured",
            index,
            config.runs.len()
        ),
        None => (0..config.runs.len()).collect(),
    };
    if selected.is_empty() {
        warn!("No runs configured");
        return Ok(());
    }

    let mut controller = build_controller(config);
    let (mut measured, mut unmeasured, mut skipped) = (0, 0, 0);
    for index in selected {
        let run = &config.runs[index];
        info!(
            "Run {}: {} nodes, {} sealers on {:?}",
            index, run.node_count, run.sealer_count, run.hosts
        );
        match controller.execute(run).await {
            Ok(outcome) if outcome.is_measured() => {
                measured += 1;
                info!(
                    run_id = %outcome.run_id,
                    "Run {} measured after {} attempts, {} records written",
                    index, outcome.attempts, outcome.records
                );
            }
            Ok(outcome) => {
                unmeasured += 1;
                warn!(run_id = %outcome.run_id, "Run {} recorded as unmeasured", index);
            }
            Err(e @ (Error::InvalidArgument(_) | Error::ConfigInconsistent(_))) => {
                skipped += 1;
                error!("Run {} skipped: {}", index, e);
            }
            Err(e) => {
                return Err(anyhow!(e).context(format!("Run {} stopped the sweep", index)));
            }
        }
    }

    info!(
        "Sweep finished: {} measured, {} unmeasured, {} skipped",
        measured, unmeasured, skipped
    );
    Ok(())
}

fn plan(config: &AppConfig) -> Result<()> {
    for (index, run) in config.runs.iter().enumerate() {
        let planned = run.validate().and_then(|_| plan_topology(run));
        let report = match planned {
            Ok((allocation, topology)) => json!({
                "run": index,
                "workload": run.workload.name(),
                "allocation": allocation,
                "sealer_set": topology.sealer_set(),
                "sealer_endpoints": topology.sealer_endpoints(&config.bench.ports),
                "fingerprint": config_fingerprint(&config.bench.agency, &run.hosts).as_str(),
            }),
            Err(e) => json!({
                "run": index,
                "error": e.to_string(),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

async fn clean(config: &AppConfig) -> Result<()> {
    let hosts = config.all_hosts();
    info!("Cleaning local artifacts and {} hosts", hosts.len());
    build_controller(config).clean(&hosts).await?;
    Ok(())
}
