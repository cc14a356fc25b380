//! Near-invisible single-pixel overlay in a random corner.

use std::path::Path;

use image::{Rgba, RgbaImage};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;

use super::{path_arg, Budget};
use crate::probe::ColorProperties;
use crate::tools::ToolRegistry;

/// Overlay positions as `x:y` expressions, one per corner.
pub const OVERLAY_POSITIONS: [&str; 4] = [
    "10:10",
    "10:main_h-20",
    "main_w-20:10",
    "main_w-20:main_h-20",
];

/// White at alpha 1/255.
const OVERLAY_PIXEL: Rgba<u8> = Rgba([255, 255, 255, 1]);

/// Quality of the overlay encode; the stage touches a single pixel, so it
/// stays close to lossless.
const OVERLAY_CRF: u8 = 18;

pub fn random_position() -> &'static str {
    OVERLAY_POSITIONS
        .choose(&mut OsRng)
        .copied()
        .unwrap_or(OVERLAY_POSITIONS[0])
}

/// Write the 1×1 overlay image to `path` as PNG.
pub fn write_overlay_png(path: &Path) -> vs_core::Result<()> {
    RgbaImage::from_pixel(1, 1, OVERLAY_PIXEL)
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| vs_core::Error::Internal(format!("failed to write overlay image: {e}")))
}

pub fn overlay_args(
    input: &Path,
    png: &Path,
    output: &Path,
    position: &str,
    color: &ColorProperties,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-i".into(),
        path_arg(input),
        "-i".into(),
        path_arg(png),
        "-filter_complex".into(),
        format!("[1:v]scale=1:1[ovr];[0:v][ovr]overlay={position}[v]"),
        "-map".into(),
        "[v]".into(),
        "-map".into(),
        "0:a?".into(),
        "-c:v".into(),
        "libx264".into(),
        "-crf".into(),
        OVERLAY_CRF.to_string(),
        "-preset".into(),
        "medium".into(),
    ];
    args.extend(color.encoder_args());
    args.extend(["-c:a".into(), "copy".into(), path_arg(output)]);
    args
}

/// Composite the overlay at `position` onto every frame of `input`.
///
/// `png` must point at a file written by [`write_overlay_png`]. Audio is
/// copied unchanged.
pub async fn add_overlay(
    tools: &ToolRegistry,
    input: &Path,
    png: &Path,
    output: &Path,
    position: &str,
    color: &ColorProperties,
    budget: Budget,
) -> vs_core::Result<()> {
    tracing::info!("overlay pixel at {position}: {:?} -> {:?}", input, output);

    let mut cmd = tools.command("ffmpeg")?;
    budget.apply(&mut cmd);
    cmd.args(overlay_args(input, png, output, position, color));
    cmd.execute().await?;

    Ok(())
}
