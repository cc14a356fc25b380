//! Silence padding.

use async_trait::async_trait;
use vs_av::actions::{add_silence, SilencePlacement};
use vs_av::probe::{probe_media, AudioStream};

use crate::context::StageContext;
use crate::stage::{Stage, StageOutcome};

/// Splice a short silent segment at the start or end of the audio track.
#[derive(Debug)]
pub struct SilenceStage {
    duration: f64,
}

impl SilenceStage {
    pub fn new(duration: f64) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl Stage for SilenceStage {
    fn name(&self) -> &'static str {
        "Add silence"
    }

    fn label(&self) -> &'static str {
        "Adding silence"
    }

    fn done_label(&self) -> &'static str {
        "Silence added"
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> vs_core::Result<StageOutcome> {
        let tools = &ctx.services.tools;

        let source_audio = match probe_media(tools, ctx.input).await {
            Ok(probe) => probe.audio,
            Err(e) => {
                tracing::warn!("Could not probe audio of {:?}, assuming stereo 44.1 kHz: {e}", ctx.input);
                Some(AudioStream::default())
            }
        };

        let placement = SilencePlacement::random();
        ctx.progress.send(0.3);
        add_silence(
            tools,
            ctx.input,
            ctx.output,
            self.duration,
            placement,
            source_audio.as_ref(),
            ctx.services.stage_budget(),
        )
        .await?;

        Ok(StageOutcome::Completed)
    }
}
