use ab_common::{Error, Result, RoundMetrics, RoundOutcome, RoundResult, RunResult, Workload};
use chrono::NaiveDateTime;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Line preceding the final report of the driver
pub const RESULTS_MARKER: &str = "### All test results ###";

/// Timestamp format of driver log lines, e.g. `2020.06.05-10:23:45.123`
pub const LOG_TIME_FORMAT: &str = "%Y.%m.%d-%H:%M:%S%.f";

static LOG_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\S+)\s+info").unwrap());
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());

/// Report row pattern of one round label: the label then seven cells
fn round_pattern(label: &str) -> Result<Regex> {
    let cells = r"\s*(\S*)\s*\|".repeat(7);
    Regex::new(&format!(r"^\|\s*{}\s*\|{}", regex::escape(label), cells))
        .map_err(|e| Error::InvalidArgument(format!("round label {}: {}", label, e)))
}

fn parse_row(caps: &regex::Captures<'_>) -> Option<RoundMetrics> {
    let float = |i: usize| caps[i].parse::<f64>().ok();
    Some(RoundMetrics {
        succeeded: caps[1].parse().ok()?,
        failed: caps[2].parse().ok()?,
        send_rate: float(3)?,
        max_latency: float(4)?,
        min_latency: float(5)?,
        avg_latency: float(6)?,
        throughput: float(7)?,
    })
}

/// Reduce a driver log to a run result.
///
/// Single pass over the lines. A row or timestamp seen later overwrites an
/// earlier one. The timestamp is taken from the line following the results
/// marker.
pub fn extract<I, S>(lines: I, workload: Workload) -> Result<RunResult>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let patterns = workload
        .round_labels()
        .iter()
        .map(|label| Ok((*label, round_pattern(label)?)))
        .collect::<Result<Vec<(&str, Regex)>>>()?;
    let mut rounds: Vec<Option<RoundMetrics>> = vec![None; patterns.len()];
    let mut timestamp: Option<NaiveDateTime> = None;
    let mut after_marker = false;

    for line in lines {
        let line = ANSI_ESCAPE.replace_all(line.as_ref(), "");
        let line = line.trim_end();

        if after_marker {
            after_marker = false;
            if let Some(caps) = LOG_TIMESTAMP.captures(line) {
                match NaiveDateTime::parse_from_str(&caps[1], LOG_TIME_FORMAT) {
                    Ok(parsed) => timestamp = Some(parsed),
                    Err(e) => debug!("Unparsable report timestamp {}: {}", &caps[1], e),
                }
            }
        }
        if line.contains(RESULTS_MARKER) {
            after_marker = true;
            continue;
        }

        for (slot, (label, pattern)) in rounds.iter_mut().zip(&patterns) {
            if let Some(caps) = pattern.captures(line) {
                match parse_row(&caps) {
                    Some(metrics) => *slot = Some(metrics),
                    None => debug!("Skipping non-numeric {} row: {}", label, line),
                }
            }
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        Error::ExtractionIncomplete(format!("no timestamp after \"{}\"", RESULTS_MARKER))
    })?;

    let mut results = Vec::with_capacity(patterns.len());
    for ((label, _), metrics) in patterns.iter().zip(rounds) {
        let metrics = metrics.ok_or_else(|| {
            Error::ExtractionIncomplete(format!("no result row for round {}", label))
        })?;
        results.push(RoundResult {
            label: label.to_string(),
            outcome: RoundOutcome::Measured(metrics),
        });
    }

    Ok(RunResult {
        timestamp,
        rounds: results,
    })
}

/// Extract the result of a log file, refusing logs older than the run's config artifact
pub async fn extract_file(log: &Path, config_artifact: &Path, workload: Workload) -> Result<RunResult> {
    let modified = |path: &Path| {
        let path = path.to_path_buf();
        async move {
            tokio::fs::metadata(&path)
                .await
                .and_then(|meta| meta.modified())
                .map_err(|e| {
                    Error::ExtractionIncomplete(format!("cannot stat {}: {}", path.display(), e))
                })
        }
    };

    let log_time = modified(log).await?;
    let config_time = modified(config_artifact).await?;
    if log_time < config_time {
        return Err(Error::StaleResult {
            log: log.to_path_buf(),
            config: config_artifact.to_path_buf(),
        });
    }

    let bytes = tokio::fs::read(log).await.map_err(|e| {
        Error::ExtractionIncomplete(format!("cannot read {}: {}", log.display(), e))
    })?;
    let content = String::from_utf8_lossy(&bytes);
    let result = extract(content.lines(), workload)?;
    info!(
        "Extracted {} rounds from {} (test time {})",
        result.rounds.len(),
        log.display(),
        result.timestamp
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    const REPORT: &str = "\
2020.06.05-10:23:40.001 info  [caliper] [round-orchestrator] 	Finished round 2 (set) in 2.01 seconds
2020.06.05-10:23:45.120 info  [caliper] [report-builder] 	### All test results ###
2020.06.05-10:23:45.123 info  [caliper] [report-builder] 
+-------+-------+------+-----------------+-----------------+-----------------+-----------------+------------------+
| Name  | Succ  | Fail | Send Rate (TPS) | Max Latency (s) | Min Latency (s) | Avg Latency (s) | Throughput (TPS) |
|-------|-------|------|-----------------|-----------------|-----------------|-----------------|------------------|
| get   | 10000 | 0    | 5001.3          | 0.21            | 0.01            | 0.05            | 4998.2           |
|-------|-------|------|-----------------|-----------------|-----------------|-----------------|------------------|
| set   | 9990  | 10   | 4870.0          | 1.92            | 0.12            | 0.73            | 3312.5           |
+-------+-------+------+-----------------+-----------------+-----------------+-----------------+------------------+
2020.06.05-10:23:45.200 info  [caliper] [report-builder] 	Generated report with path report.html
";

    fn measured(result: &RunResult, index: usize) -> RoundMetrics {
        match result.rounds[index].outcome {
            RoundOutcome::Measured(metrics) => metrics,
            RoundOutcome::Unmeasured => panic!("round {} unmeasured", index),
        }
    }

    #[test]
    fn test_extract_report() {
        let result = extract(REPORT.lines(), Workload::HelloWorld).unwrap();
        assert_eq!(
            result.timestamp,
            NaiveDateTime::parse_from_str("2020-06-05 10:23:45.123", "%Y-%m-%d %H:%M:%S%.f")
                .unwrap()
        );
        assert_eq!(result.rounds[0].label, "get");
        assert_eq!(result.rounds[1].label, "set");

        let get = measured(&result, 0);
        assert_eq!(get.succeeded, 10000);
        assert_eq!(get.failed, 0);
        assert_eq!(get.send_rate, 5001.3);
        assert_eq!(get.throughput, 4998.2);

        let set = measured(&result, 1);
        assert_eq!(set.failed, 10);
        assert_eq!(set.avg_latency, 0.73);
        assert!(result.is_measured());
    }

    #[test]
    fn test_last_match_wins() {
        let log = format!(
            "| get | 1 | 1 | 1 | 1 | 1 | 1 | 1 |\n{}| get | 7 | 0 | 2 | 3 | 4 | 5 | 6 |\n",
            REPORT
        );
        let result = extract(log.lines(), Workload::HelloWorld).unwrap();
        assert_eq!(measured(&result, 0).succeeded, 7);
        assert_eq!(measured(&result, 1).succeeded, 9990);
    }

    #[test]
    fn test_missing_round() {
        let log: Vec<&str> = REPORT.lines().filter(|l| !l.starts_with("| set")).collect();
        let err = extract(log, Workload::HelloWorld).unwrap_err();
        assert!(matches!(err, Error::ExtractionIncomplete(ref m) if m.contains("set")));
    }

    #[test]
    fn test_missing_timestamp() {
        let log: Vec<&str> = REPORT
            .lines()
            .filter(|l| !l.contains(RESULTS_MARKER))
            .collect();
        assert!(matches!(
            extract(log, Workload::HelloWorld),
            Err(Error::ExtractionIncomplete(_))
        ));
    }

    #[test]
    fn test_workload_labels() {
        let log = REPORT.replace("| get  ", "| addUser").replace("| set  ", "| transfer");
        let result = extract(log.lines(), Workload::Transfer).unwrap();
        assert_eq!(result.rounds[0].label, "addUser");
        assert_eq!(measured(&result, 1).throughput, 3312.5);
        assert!(extract(log.lines(), Workload::HelloWorld).is_err());
    }

    #[test]
    fn test_colored_output() {
        let log = REPORT.replace("| get ", "\x1b[32m| get ").replace("| 4998.2 ", "| 4998.2\x1b[0m ");
        let result = extract(log.lines(), Workload::HelloWorld).unwrap();
        assert_eq!(measured(&result, 0).throughput, 4998.2);
    }

    #[tokio::test]
    async fn test_stale_log_is_rejected() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("caliper.log");
        let config = dir.path().join("config.yaml");
        std::fs::write(&log, REPORT).unwrap();
        std::fs::write(&config, "test: {}").unwrap();

        let now = SystemTime::now();
        File::options()
            .write(true)
            .open(&log)
            .unwrap()
            .set_modified(now - Duration::from_secs(600))
            .unwrap();
        File::options()
            .write(true)
            .open(&config)
            .unwrap()
            .set_modified(now)
            .unwrap();

        let err = extract_file(&log, &config, Workload::HelloWorld)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StaleResult { .. }));
    }

    #[tokio::test]
    async fn test_fresh_log() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("caliper.log");
        let config = dir.path().join("config.yaml");
        std::fs::write(&config, "test: {}").unwrap();
        std::fs::write(&log, REPORT).unwrap();

        let now = SystemTime::now();
        File::options()
            .write(true)
            .open(&config)
            .unwrap()
            .set_modified(now - Duration::from_secs(60))
            .unwrap();

        let result = extract_file(&log, &config, Workload::HelloWorld)
            .await
            .unwrap();
        assert_eq!(result.rounds.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_utf8_in_log() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("caliper.log");
        let config = dir.path().join("config.yaml");
        std::fs::write(&config, "test: {}").unwrap();
        let mut content = b"\xff\xfe progress \x1b[32m\xc3\n".to_vec();
        content.extend_from_slice(REPORT.as_bytes());
        std::fs::write(&log, content).unwrap();
        File::options()
            .write(true)
            .open(&config)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(60))
            .unwrap();

        let result = extract_file(&log, &config, Workload::HelloWorld)
            .await
            .unwrap();
        assert_eq!(measured(&result, 1).succeeded, 9990);
    }

    #[tokio::test]
    async fn test_missing_log() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.yaml");
        std::fs::write(&config, "test: {}").unwrap();
        let err = extract_file(&dir.path().join("caliper.log"), &config, Workload::HelloWorld)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExtractionIncomplete(_)));
    }
}
