//! Audio re-attachment after video-only processing.

use std::path::Path;

use super::{path_arg, Budget};
use crate::tools::ToolRegistry;

/// Mux the first video stream of `video` with the first audio stream of
/// `audio_source` (if it has one) into `output`, trimmed to the shorter of
/// the two. Both streams are copied.
pub async fn reattach_audio(
    tools: &ToolRegistry,
    video: &Path,
    audio_source: &Path,
    output: &Path,
    budget: Budget,
) -> vs_core::Result<()> {
    tracing::info!("reattach audio from {:?} onto {:?}", audio_source, video);

    let mut cmd = tools.command("ffmpeg")?;
    budget.apply(&mut cmd);
    cmd.args(["-y", "-i"]);
    cmd.arg(path_arg(video));
    cmd.arg("-i");
    cmd.arg(path_arg(audio_source));
    cmd.args(["-map", "0:v:0", "-map", "1:a:0?", "-c", "copy", "-shortest"]);
    cmd.arg(path_arg(output));
    cmd.execute().await?;

    Ok(())
}
