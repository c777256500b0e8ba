use ab_common::{Error, ResultRecord, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::ResultSink;

/// Append-only CSV table with the [`ResultRecord`] column schema
#[derive(Debug)]
pub struct CsvResultSink {
    path: PathBuf,
    lock: Mutex<()>,
}

fn persistence(context: &str, path: &Path, err: impl std::fmt::Display) -> Error {
    Error::PersistenceFailure(format!("{} {}: {}", context, path.display(), err))
}

impl CsvResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the table already starts with the expected header row.
    ///
    /// A missing or empty table has none; a table starting with any other
    /// row is rejected instead of being appended to.
    fn has_header(&self) -> Result<bool> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(persistence("cannot open", &self.path, e)),
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(file);
        let mut first = csv::StringRecord::new();
        let found = reader
            .read_record(&mut first)
            .map_err(|e| persistence("cannot read", &self.path, e))?;
        if !found {
            return Ok(false);
        }
        if first.iter().eq(ResultRecord::COLUMNS) {
            Ok(true)
        } else {
            Err(persistence(
                "unexpected header in",
                &self.path,
                first.iter().collect::<Vec<_>>().join(","),
            ))
        }
    }
}

impl ResultSink for CsvResultSink {
    fn append(&self, records: &[ResultRecord]) -> Result<usize> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| persistence("lock poisoned for", &self.path, e))?;

        let write_header = !self.has_header()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| persistence("cannot create directory for", &self.path, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| persistence("cannot open", &self.path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        if write_header && records.is_empty() {
            writer
                .write_record(ResultRecord::COLUMNS)
                .map_err(|e| persistence("cannot write", &self.path, e))?;
        }
        for record in records {
            writer
                .serialize(record)
                .map_err(|e| persistence("cannot write", &self.path, e))?;
        }
        writer
            .flush()
            .map_err(|e| persistence("cannot flush", &self.path, e))?;

        if write_header {
            debug!("Header written to {}", self.path.display());
        }
        info!(
            "Appended {} records to {}",
            records.len(),
            self.path.display()
        );
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ab_common::{config_fingerprint, RoundMetrics, RoundOutcome, RoundResult, RunConfig, RunResult};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn timestamp() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 6, 5)
            .unwrap()
            .and_hms_opt(10, 23, 45)
            .unwrap()
    }

    fn records(measured: bool) -> Vec<ResultRecord> {
        let config = RunConfig::new(5, 3, vec!["h1".into(), "h2".into()]);
        let fingerprint = config_fingerprint("dfface", &config.hosts);
        let result = if measured {
            let metrics = RoundMetrics {
                succeeded: 10000,
                failed: 0,
                send_rate: 5001.3,
                max_latency: 0.21,
                min_latency: 0.01,
                avg_latency: 0.05,
                throughput: 4998.2,
            };
            RunResult {
                timestamp: timestamp(),
                rounds: config
                    .round_labels()
                    .iter()
                    .map(|label| RoundResult {
                        label: label.to_string(),
                        outcome: RoundOutcome::Measured(metrics),
                    })
                    .collect(),
            }
        } else {
            RunResult::unmeasured(config.round_labels(), timestamp())
        };
        ResultRecord::from_run(&config, &fingerprint, &result)
    }

    fn read(path: &Path) -> Vec<ResultRecord> {
        csv::Reader::from_path(path)
            .unwrap()
            .deserialize()
            .collect::<std::result::Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_header_bootstrap() {
        let dir = TempDir::new().unwrap();
        let sink = CsvResultSink::new(dir.path().join("out/results.csv"));

        assert_eq!(sink.append(&records(true)).unwrap(), 2);
        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], ResultRecord::COLUMNS.join(","));

        sink.append(&records(true)).unwrap();
        let content = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content.lines().count(), 5);
        assert_eq!(
            content
                .lines()
                .filter(|line| line.starts_with("timestamp,"))
                .count(),
            1
        );
        assert_eq!(read(sink.path()), [records(true), records(true)].concat());
    }

    #[test]
    fn test_sentinel_rows_have_empty_metrics() {
        let dir = TempDir::new().unwrap();
        let sink = CsvResultSink::new(dir.path().join("results.csv"));
        sink.append(&records(false)).unwrap();

        let rows = read(sink.path());
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.succeeded.is_none() && row.throughput.is_none()));
        assert_eq!(rows[0].round_label, "get");
        assert_eq!(rows[1].round_label, "set");
    }

    #[test]
    fn test_existing_empty_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");
        std::fs::write(&path, "").unwrap();
        let sink = CsvResultSink::new(&path);
        sink.append(&records(true)).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("timestamp,total_tx,"));
    }

    #[test]
    fn test_foreign_table_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");
        std::fs::write(&path, "a,b,c\n1,2,3\n").unwrap();
        let sink = CsvResultSink::new(&path);
        let err = sink.append(&records(true)).unwrap_err();
        assert!(matches!(err, Error::PersistenceFailure(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b,c\n1,2,3\n");
    }
}
