//! The result record

use crate::error::BenchError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the result record
pub const RESULTS_FILE: &str = "results.json";

/// Outcome of one benchmark run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Expected information content of the dataset
    pub actual_information_bytes: u64,
    /// Slowest rank's write time
    pub seconds: f64,
    /// `actual_information_bytes / seconds`
    #[serde(rename = "throughput_B/s")]
    pub throughput: f64,
}

impl ResultRecord {
    /// Record for `bytes` written in `seconds`
    ///
    /// A zero or negative duration yields a throughput of 0.
    #[must_use]
    pub fn new(bytes: u64, seconds: f64) -> Self {
        let throughput = if seconds > 0.0 {
            bytes as f64 / seconds
        } else {
            warn!(seconds, "write took no measurable time, reporting zero throughput");
            0.0
        };
        Self {
            actual_information_bytes: bytes,
            seconds,
            throughput,
        }
    }

    /// Read a record written by [`ResultReporter::report`]
    pub fn load(path: &Path) -> Result<Self, BenchError> {
        let text = fs::read_to_string(path).map_err(BenchError::artifact(path))?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Persists result records
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultReporter;

impl ResultReporter {
    /// Write `record` to `dir/results.json`, replacing any previous record
    pub fn report(record: &ResultRecord, dir: &Path) -> Result<PathBuf, BenchError> {
        let path = dir.join(RESULTS_FILE);
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json + "\n").map_err(BenchError::artifact(&path))?;
        info!(
            path = %path.display(),
            bytes = record.actual_information_bytes,
            seconds = record.seconds,
            throughput = record.throughput,
            "results written"
        );
        Ok(path)
    }
}
