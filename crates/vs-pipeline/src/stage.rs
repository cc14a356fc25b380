//! The [`Stage`] trait defines a single pipeline step.
//!
//! Each stage reads the previous artifact (or the original input), writes a
//! fresh artifact, and reports how far along it is. Stages run strictly in
//! sequence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::{Services, StageContext};

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    /// The transformation was applied.
    Completed,
    /// The stage copied its input through unchanged.
    Skipped { reason: String },
}

impl StageOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, StageOutcome::Skipped { .. })
    }
}

/// A single step in the processing pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short name used in errors and logs (e.g. "Re-encode").
    fn name(&self) -> &'static str;

    /// Progress label shown while the stage runs.
    fn label(&self) -> &'static str;

    /// Progress label shown once the stage has finished.
    fn done_label(&self) -> &'static str;

    /// Check preconditions before any stage of the run starts.
    ///
    /// The default requires ffmpeg and ffprobe.
    async fn validate(&self, services: &Services) -> vs_core::Result<()> {
        services.tools.require("ffmpeg")?;
        services.tools.require("ffprobe")?;
        Ok(())
    }

    /// Transform `ctx.input` into `ctx.output`.
    async fn execute(&self, ctx: &StageContext<'_>) -> vs_core::Result<StageOutcome>;
}
