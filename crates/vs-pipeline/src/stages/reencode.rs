//! Full re-encode at a chosen quality.

use async_trait::async_trait;
use vs_av::actions::{re_encode, ReEncodeParams};
use vs_av::probe::probe_media;

use crate::context::StageContext;
use crate::stage::{Stage, StageOutcome};

/// Re-encode video with the best available H.264 encoder while keeping the
/// source's color description.
#[derive(Debug)]
pub struct ReEncodeStage {
    crf: u8,
}

impl ReEncodeStage {
    pub fn new(crf: u8) -> Self {
        Self { crf }
    }
}

#[async_trait]
impl Stage for ReEncodeStage {
    fn name(&self) -> &'static str {
        "Re-encode"
    }

    fn label(&self) -> &'static str {
        "Re-encoding video"
    }

    fn done_label(&self) -> &'static str {
        "Video re-encoded"
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> vs_core::Result<StageOutcome> {
        let tools = &ctx.services.tools;

        // Without a duration the encode still runs, just without granular progress.
        let duration = match probe_media(tools, ctx.input).await {
            Ok(probe) => probe.duration_secs(),
            Err(e) => {
                tracing::warn!("Could not probe duration of {:?}: {e}", ctx.input);
                None
            }
        };
        let color = ctx.services.colors.probe(tools, ctx.workspace.input()).await;
        let encoder = tools.video_encoder().await;

        let params = ReEncodeParams {
            crf: self.crf,
            encoder,
            color: &color,
            duration,
        };
        re_encode(
            tools,
            ctx.input,
            ctx.output,
            &params,
            ctx.services.encode_budget(),
            |fraction| ctx.progress.send(0.1 + 0.9 * fraction),
        )
        .await?;

        Ok(StageOutcome::Completed)
    }
}
