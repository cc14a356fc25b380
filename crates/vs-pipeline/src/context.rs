//! Execution context shared by the stages of a pipeline run.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vs_av::{Budget, ColorProfileProbe, ToolRegistry, Workspace};
use vs_core::config::LimitsConfig;

/// Caller-supplied progress callback:
/// `(label, overall_percent, step_index, total_steps)`.
///
/// `step_index` is 1-based and names the step currently running.
pub type ProgressFn = dyn Fn(&str, f64, usize, usize) + Send + Sync;

/// Long-lived collaborators shared by every run of one processor.
#[derive(Debug)]
pub struct Services {
    pub tools: Arc<ToolRegistry>,
    /// Color profile cache; owned here so it lives exactly as long as the
    /// processor.
    pub colors: ColorProfileProbe,
    pub limits: LimitsConfig,
    /// Worker pool for frame processing.
    pub pool: Arc<rayon::ThreadPool>,
}

impl Services {
    /// Build services, sizing the worker pool from `limits.max_workers` or
    /// `min(8, cpus)`.
    pub fn new(tools: ToolRegistry, limits: LimitsConfig) -> vs_core::Result<Self> {
        let workers = worker_count(limits.max_workers);
        let pool = vs_noise::build_pool(workers)
            .map_err(|e| vs_core::Error::Internal(format!("failed to build worker pool: {e}")))?;
        tracing::debug!("Frame worker pool: {workers} threads");

        Ok(Self {
            tools: Arc::new(tools),
            colors: ColorProfileProbe::new(),
            limits,
            pool: Arc::new(pool),
        })
    }

    /// Budget for stream copies and light filters.
    pub fn stage_budget(&self) -> Budget {
        Budget::new(self.limits.stage_timeout(), self.limits.kill_grace())
    }

    /// Budget for full re-encodes.
    pub fn encode_budget(&self) -> Budget {
        Budget::new(self.limits.encode_timeout(), self.limits.kill_grace())
    }
}

/// Number of frame workers: the configured value, else `min(8, cpus)`.
pub fn worker_count(configured: Option<usize>) -> usize {
    configured.unwrap_or_else(|| num_cpus::get().min(8)).max(1)
}

/// Sender for reporting the completed fraction (0.0 -- 1.0) of the running
/// stage.
pub struct ProgressSender<'a> {
    callback: Box<dyn Fn(f64) + Send + Sync + 'a>,
}

impl<'a> ProgressSender<'a> {
    pub fn new(callback: impl Fn(f64) + Send + Sync + 'a) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// A sender that discards all reports.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_| {}),
        }
    }

    pub fn send(&self, fraction: f64) {
        (self.callback)(fraction.clamp(0.0, 1.0));
    }
}

impl std::fmt::Debug for ProgressSender<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

/// Context passed to a stage for one execution.
#[derive(Debug)]
pub struct StageContext<'a> {
    /// Artifact of the previous stage, or the original input.
    pub input: &'a Path,
    /// Where this stage must write its result.
    pub output: &'a Path,
    /// File name of the original input, for messages.
    pub original_name: &'a str,
    /// The run's scratch workspace, for auxiliary files.
    pub workspace: &'a Workspace,
    pub services: &'a Services,
    pub progress: ProgressSender<'a>,
}

/// Turns per-stage fractions into overall progress reports.
///
/// Overall percent is `min(100, 100 * (completed + fraction) / total)`.
pub struct ProgressTracker<'a> {
    callback: &'a (dyn Fn(&str, f64, usize, usize) + Send + Sync + 'a),
    total_steps: usize,
    completed: AtomicUsize,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(callback: &'a (dyn Fn(&str, f64, usize, usize) + Send + Sync + 'a), total_steps: usize) -> Self {
        Self {
            callback,
            total_steps: total_steps.max(1),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Overall percentage for `fraction` of the step after `completed`.
    pub fn overall_percent(completed: usize, fraction: f64, total: usize) -> f64 {
        let total = total.max(1) as f64;
        (100.0 * (completed as f64 + fraction.clamp(0.0, 1.0)) / total).min(100.0)
    }

    /// Report progress within the current step.
    pub fn report(&self, label: &str, fraction: f64) {
        let completed = self.completed();
        let pct = Self::overall_percent(completed, fraction, self.total_steps);
        let step = (completed + 1).min(self.total_steps);
        (self.callback)(label, pct, step, self.total_steps);
    }

    /// Report the current step as finished and move to the next.
    pub fn complete(&self, label: &str) {
        self.report(label, 1.0);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    /// A sender that reports fractions of the current step under `label`.
    pub fn sender<'s>(&'s self, label: &'s str) -> ProgressSender<'s> {
        ProgressSender::new(move |fraction| self.report(label, fraction))
    }
}
