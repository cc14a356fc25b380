//! Pipeline executor: runs a sequence of [`Stage`]s with progress reporting
//! and scratch cleanup on failure.

use std::time::Instant;

use serde::Serialize;
use vs_av::Workspace;

use crate::context::{ProgressTracker, Services, StageContext};
use crate::stage::{Stage, StageOutcome};

/// What one stage did during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: StageOutcome,
    pub elapsed_secs: f64,
}

/// Runs stages strictly in sequence, chaining each stage's artifact into the
/// next.
pub struct PipelineExecutor {
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineExecutor {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Check every stage's preconditions. Nothing runs unless all pass.
    pub async fn validate(&self, services: &Services) -> vs_core::Result<()> {
        for stage in &self.stages {
            stage.validate(services).await.map_err(|e| {
                vs_core::Error::Validation(format!("{}: validation failed: {e}", stage.name()))
            })?;
        }
        Ok(())
    }

    /// Execute the pipeline inside `workspace`.
    ///
    /// On success the workspace's current artifact is the last stage's
    /// output. On failure every scratch file of the run is deleted before the
    /// error is returned, tagged with the stage name and `original_name`.
    pub async fn execute(
        &self,
        workspace: &mut Workspace,
        services: &Services,
        original_name: &str,
        tracker: &ProgressTracker<'_>,
    ) -> vs_core::Result<Vec<StageReport>> {
        self.validate(services).await?;

        let mut reports = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            match self
                .execute_stage(stage.as_ref(), workspace, services, original_name, tracker)
                .await
            {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::error!("Stage failed: {e}");
                    workspace.purge();
                    return Err(e);
                }
            }
        }
        Ok(reports)
    }

    async fn execute_stage(
        &self,
        stage: &dyn Stage,
        workspace: &mut Workspace,
        services: &Services,
        original_name: &str,
        tracker: &ProgressTracker<'_>,
    ) -> vs_core::Result<StageReport> {
        let name = stage.name();
        let input = workspace.current().to_path_buf();
        let output = workspace.next_artifact();

        tracing::info!("Starting: {name}");
        tracker.report(stage.label(), 0.1);
        let started = Instant::now();

        let outcome = {
            let ctx = StageContext {
                input: &input,
                output: &output,
                original_name,
                workspace,
                services,
                progress: tracker.sender(stage.label()),
            };
            stage
                .execute(&ctx)
                .await
                .map_err(|e| e.into_stage_failure(name, original_name))?
        };

        if !output.exists() {
            return Err(vs_core::Error::stage(
                name,
                original_name,
                format!("no output written to {}", output.display()),
            ));
        }
        workspace.advance(output);

        tracker.complete(stage.done_label());
        let pct = ProgressTracker::overall_percent(tracker.completed(), 0.0, tracker.total_steps());
        match &outcome {
            StageOutcome::Completed => tracing::info!("[{pct:.0}%] Completed: {name}"),
            StageOutcome::Skipped { reason } => {
                tracing::info!("[{pct:.0}%] Skipped: {name} ({reason})")
            }
        }

        Ok(StageReport {
            name: name.to_string(),
            outcome,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }
}
