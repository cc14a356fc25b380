//! Single-pixel overlay.

use async_trait::async_trait;
use vs_av::actions::{add_overlay, random_position, write_overlay_png};

use crate::context::StageContext;
use crate::stage::{Stage, StageOutcome};

/// Composite a nearly transparent pixel into one corner of every frame.
#[derive(Debug, Default)]
pub struct OverlayStage;

#[async_trait]
impl Stage for OverlayStage {
    fn name(&self) -> &'static str {
        "Add overlay"
    }

    fn label(&self) -> &'static str {
        "Adding overlay"
    }

    fn done_label(&self) -> &'static str {
        "Overlay added"
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> vs_core::Result<StageOutcome> {
        let tools = &ctx.services.tools;

        let png = ctx.workspace.scratch_file("overlay", "png");
        write_overlay_png(&png)?;

        let color = ctx.services.colors.probe(tools, ctx.workspace.input()).await;
        let position = random_position();
        ctx.progress.send(0.3);
        add_overlay(
            tools,
            ctx.input,
            &png,
            ctx.output,
            position,
            &color,
            ctx.services.encode_budget(),
        )
        .await?;

        Ok(StageOutcome::Completed)
    }
}
