//! The record of a successful run.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::executor::StageReport;

/// Returned by [`Processor::run`](crate::Processor::run). Maps the original
/// input to the output it produced, so verification does not have to guess.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Path of the original input.
    pub input: PathBuf,
    /// File name of the original input.
    pub original_name: String,
    /// Final output location.
    pub output_path: PathBuf,
    /// Generated output file name.
    pub output_name: String,
    pub stages: Vec<StageReport>,
    pub elapsed_secs: f64,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Names of the stages that copied their input through unchanged.
    pub fn skipped_stages(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| s.outcome.is_skipped())
            .map(|s| s.name.as_str())
            .collect()
    }
}
