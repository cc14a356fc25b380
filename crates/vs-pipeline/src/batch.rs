//! Sequential batch processing.
//!
//! A failing file is recorded and the batch moves on; nothing short of an
//! empty input list stops it early.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use vs_core::paths::{display_name, is_video_file};
use vs_core::ProcessingOptions;
use walkdir::WalkDir;

use crate::processor::Processor;

/// Progress callback for a batch:
/// `(file_index, label, overall_percent, step_index, total_steps)`.
///
/// `file_index` is 0-based; the remaining arguments are those of the
/// per-file [`ProgressFn`](crate::context::ProgressFn).
pub type BatchProgressFn = dyn Fn(usize, &str, f64, usize, usize) + Send + Sync;

/// Result for one input file.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub input: PathBuf,
    pub success: bool,
    /// One-line human-readable outcome.
    pub message: String,
    pub output_filename: Option<String>,
    pub elapsed_secs: f64,
}

/// Totals over a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_secs: f64,
    pub average_secs: f64,
}

impl BatchSummary {
    pub fn from_items(items: &[BatchItem]) -> Self {
        let succeeded = items.iter().filter(|i| i.success).count();
        let total_secs: f64 = items.iter().map(|i| i.elapsed_secs).sum();
        Self {
            total: items.len(),
            succeeded,
            failed: items.len() - succeeded,
            total_secs,
            average_secs: if items.is_empty() {
                0.0
            } else {
                total_secs / items.len() as f64
            },
        }
    }
}

/// `✅ <input> → <output>`
pub fn success_message(input_name: &str, output_name: &str) -> String {
    format!("✅ {input_name} → {output_name}")
}

/// `❌ Error processing <input>: <reason>`, folded onto one line.
pub fn error_message(input_name: &str, reason: &str) -> String {
    let reason = reason
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
    format!("❌ Error processing {input_name}: {reason}")
}

/// Every video file under `dir`, recursively, in sorted order.
pub fn find_video_files(dir: &Path) -> vs_core::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(vs_core::Error::Validation(format!(
            "not a directory: {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {e}", dir.display());
                continue;
            }
        };
        if entry.file_type().is_file() && is_video_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Runs one [`Processor`] over many inputs, one at a time.
pub struct BatchRunner<'p> {
    processor: &'p Processor,
    options: ProcessingOptions,
}

impl<'p> BatchRunner<'p> {
    pub fn new(processor: &'p Processor, options: ProcessingOptions) -> Self {
        Self { processor, options }
    }

    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    pub async fn run(
        &self,
        inputs: &[PathBuf],
        on_progress: &(dyn Fn(usize, &str, f64, usize, usize) + Send + Sync + '_),
    ) -> Vec<BatchItem> {
        let total = inputs.len();
        let mut items = Vec::with_capacity(total);

        for (index, input) in inputs.iter().enumerate() {
            let name = display_name(input);
            tracing::info!("Processing [{}/{total}]: {name}", index + 1);

            let started = Instant::now();
            let forward = |label: &str, pct: f64, step: usize, steps: usize| {
                on_progress(index, label, pct, step, steps)
            };
            let item = match self.processor.run(input, &self.options, &forward).await {
                Ok(report) => {
                    let message = success_message(&name, &report.output_name);
                    tracing::info!("{message}");
                    BatchItem {
                        input: input.clone(),
                        success: true,
                        message,
                        output_filename: Some(report.output_name),
                        elapsed_secs: started.elapsed().as_secs_f64(),
                    }
                }
                Err(e) => {
                    let message = error_message(&name, &e.to_string());
                    tracing::error!("{message}");
                    BatchItem {
                        input: input.clone(),
                        success: false,
                        message,
                        output_filename: None,
                        elapsed_secs: started.elapsed().as_secs_f64(),
                    }
                }
            };
            items.push(item);
        }

        items
    }
}
