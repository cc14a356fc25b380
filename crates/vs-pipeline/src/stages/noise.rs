//! Per-frame pixel noise.
//!
//! The video is decoded to raw RGB, perturbed batch by batch on the shared
//! worker pool, and re-encoded into a video-only scratch file. The original
//! audio is then muxed back in.

use async_trait::async_trait;
use vs_av::actions::reattach_audio;
use vs_av::probe::probe_media;
use vs_av::{DecodeWindow, EncodeSettings, FrameGeometry, FrameReader, FrameWriter};

use crate::context::StageContext;
use crate::stage::{Stage, StageOutcome};

/// Quality of the intermediate encode. Kept high because a re-encode stage
/// usually follows.
const NOISE_ENCODE_CRF: u8 = 16;

/// Frame rate assumed when the source does not report one.
const FALLBACK_FPS: f64 = 30.0;

/// Add sparse, color-neutral noise to every frame.
#[derive(Debug)]
pub struct NoiseStage {
    intensity: u8,
}

impl NoiseStage {
    pub fn new(intensity: u8) -> Self {
        Self { intensity }
    }
}

#[async_trait]
impl Stage for NoiseStage {
    fn name(&self) -> &'static str {
        "Add noise"
    }

    fn label(&self) -> &'static str {
        "Adding noise"
    }

    fn done_label(&self) -> &'static str {
        "Noise added"
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> vs_core::Result<StageOutcome> {
        let services = ctx.services;
        let tools = &services.tools;
        let limits = &services.limits;

        let probe = probe_media(tools, ctx.input).await?;
        let video = probe
            .video
            .as_ref()
            .ok_or_else(|| vs_core::Error::Probe(format!("no video stream in {:?}", ctx.input)))?;
        // The decoder applies rotation side data, so frames arrive at the
        // display size and the output carries the picture upright.
        let (width, height) = video.display_size();
        let geometry = FrameGeometry::new(width, height);
        let batch_size = limits.noise_batch_size.max(1);

        let estimated = geometry.batch_bytes(batch_size);
        let ceiling = limits.memory_ceiling_bytes();
        if estimated > ceiling {
            let reason = format!(
                "{}x{} frames in batches of {batch_size} need ~{} MiB, limit is {} MiB",
                geometry.width,
                geometry.height,
                estimated / (1024 * 1024),
                ceiling / (1024 * 1024)
            );
            tracing::warn!("Skipping noise for {}: {reason}", ctx.original_name);
            tokio::fs::copy(ctx.input, ctx.output).await?;
            return Ok(StageOutcome::Skipped { reason });
        }

        let fps = [video.avg_fps, video.fps]
            .into_iter()
            .find(|r| *r > 0.0)
            .unwrap_or(FALLBACK_FPS);
        let expected_frames = video
            .nb_frames
            .or_else(|| probe.duration_secs().map(|d| (d * fps).round() as u64))
            .filter(|n| *n > 0);
        let color = services.colors.probe(tools, ctx.workspace.input()).await;

        let video_only = ctx.workspace.scratch_file("noise", "mp4");
        let settings = EncodeSettings {
            geometry,
            fps,
            crf: NOISE_ENCODE_CRF,
            color: color.clone(),
        };

        let mut reader =
            FrameReader::spawn(tools, ctx.input, geometry, Some(&color), DecodeWindow::All)?;
        let mut writer = match FrameWriter::spawn(tools, &video_only, &settings) {
            Ok(writer) => writer,
            Err(e) => {
                reader.abort(limits.kill_grace()).await;
                return Err(e);
            }
        };

        let timeout = limits.encode_timeout();
        let grace = limits.kill_grace();
        let pumped = tokio::time::timeout(
            timeout,
            self.pump(ctx, &mut reader, &mut writer, batch_size, expected_frames),
        )
        .await;

        let frames = match pumped {
            Ok(Ok(frames)) => {
                reader.finish(timeout, grace).await?;
                writer.finish(timeout, grace).await?;
                frames
            }
            Ok(Err(e)) => {
                reader.abort(grace).await;
                // A dead encoder shows up here as a broken pipe; its own exit
                // status carries the useful diagnostics.
                return Err(match writer.finish(grace, grace).await {
                    Err(encoder_error) => encoder_error,
                    Ok(()) => e,
                });
            }
            Err(_) => {
                reader.abort(grace).await;
                writer.abort(grace).await;
                return Err(vs_core::Error::ToolTimeout {
                    tool: "ffmpeg".into(),
                    after: timeout,
                });
            }
        };

        if frames == 0 {
            return Err(vs_core::Error::Probe(format!(
                "no frames decoded from {:?}",
                ctx.input
            )));
        }
        tracing::info!("Perturbed {frames} frames of {}", ctx.original_name);

        ctx.progress.send(0.95);
        reattach_audio(tools, &video_only, ctx.input, ctx.output, services.stage_budget()).await?;

        Ok(StageOutcome::Completed)
    }
}

impl NoiseStage {
    /// Move every frame from `reader` through the noise pool into `writer`.
    /// Returns the number of frames written.
    async fn pump(
        &self,
        ctx: &StageContext<'_>,
        reader: &mut FrameReader,
        writer: &mut FrameWriter,
        batch_size: usize,
        expected_frames: Option<u64>,
    ) -> vs_core::Result<u64> {
        let mut written: u64 = 0;
        loop {
            let batch = reader.read_batch(batch_size).await?;
            if batch.is_empty() {
                break;
            }

            let pool = ctx.services.pool.clone();
            let intensity = self.intensity;
            let noisy = tokio::task::spawn_blocking(move || {
                vs_noise::apply_parallel(&pool, batch, intensity)
            })
            .await
            .map_err(|e| vs_core::Error::Internal(format!("noise worker panicked: {e}")))?;

            for frame in &noisy {
                writer.write_frame(frame).await?;
            }
            written += noisy.len() as u64;

            if let Some(total) = expected_frames {
                let fraction = (written as f64 / total as f64).min(1.0);
                ctx.progress.send(0.1 + 0.8 * fraction);
            }
        }
        Ok(written)
    }
}
