//! Container-level metadata removal by stream copy.

use std::path::Path;

use super::{path_arg, Budget};
use crate::tools::ToolRegistry;

/// Arguments that copy every stream while dropping global metadata and
/// chapters, with bit-exact muxing.
pub fn strip_metadata_args(input: &Path, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into(), "-i".into(), path_arg(input)];
    args.extend(
        [
            "-map",
            "0",
            "-map_metadata",
            "-1",
            "-map_chapters",
            "-1",
            "-c",
            "copy",
            "-fflags",
            "+bitexact",
        ]
        .map(String::from),
    );
    args.push(path_arg(output));
    args
}

/// Strip metadata from `input` into `output`.
///
/// A stream copy gives no useful progress signal, so `on_progress` sees 0.3
/// once the copy starts and 1.0 when it finishes.
pub async fn strip_metadata(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    budget: Budget,
    mut on_progress: impl FnMut(f64),
) -> vs_core::Result<()> {
    tracing::info!("strip metadata {:?} -> {:?}", input, output);

    let mut cmd = tools.command("ffmpeg")?;
    budget.apply(&mut cmd);
    cmd.args(strip_metadata_args(input, output));

    on_progress(0.3);
    cmd.execute().await?;
    on_progress(1.0);

    Ok(())
}
