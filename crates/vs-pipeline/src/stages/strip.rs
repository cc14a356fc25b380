//! Container metadata strip.

use async_trait::async_trait;

use crate::context::StageContext;
use crate::stage::{Stage, StageOutcome};

/// Drop global metadata and chapters by stream copy.
#[derive(Debug, Default)]
pub struct StripMetadataStage;

#[async_trait]
impl Stage for StripMetadataStage {
    fn name(&self) -> &'static str {
        "Strip metadata"
    }

    fn label(&self) -> &'static str {
        "Stripping metadata"
    }

    fn done_label(&self) -> &'static str {
        "Metadata stripped"
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> vs_core::Result<StageOutcome> {
        vs_av::actions::strip_metadata(
            &ctx.services.tools,
            ctx.input,
            ctx.output,
            ctx.services.stage_budget(),
            |fraction| ctx.progress.send(fraction),
        )
        .await?;
        Ok(StageOutcome::Completed)
    }
}
