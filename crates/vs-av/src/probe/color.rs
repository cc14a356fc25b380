//! Color profile detection with a per-path cache.
//!
//! Encoders left to pick color tags on their own may shift them and tint the
//! output, so every re-encode forces the tags detected here. Each field falls
//! back to its own default independently; probing never fails.

use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::ffprobe::{probe_media, VideoStream};
use crate::tools::ToolRegistry;

pub const DEFAULT_PRIMARIES: &str = "bt709";
pub const DEFAULT_TRANSFER: &str = "bt709";
pub const DEFAULT_MATRIX: &str = "bt709";
pub const DEFAULT_RANGE: &str = "tv";
pub const DEFAULT_PIX_FMT: &str = "yuv420p";

/// Color tags of a video stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorProperties {
    pub primaries: String,
    pub transfer: String,
    pub matrix: String,
    /// `tv` (studio swing) or `pc` (full range).
    pub range: String,
    pub pix_fmt: String,
    /// Whether at least one field came from the file rather than a default.
    pub detected: bool,
}

impl Default for ColorProperties {
    fn default() -> Self {
        Self {
            primaries: DEFAULT_PRIMARIES.into(),
            transfer: DEFAULT_TRANSFER.into(),
            matrix: DEFAULT_MATRIX.into(),
            range: DEFAULT_RANGE.into(),
            pix_fmt: DEFAULT_PIX_FMT.into(),
            detected: false,
        }
    }
}

fn usable(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("unknown") && *v != "N/A")
}

impl ColorProperties {
    /// Build from a probed video stream, defaulting each missing field.
    pub fn from_stream(stream: &VideoStream) -> Self {
        let mut detected = false;
        let mut pick = |value: Option<&String>, default: &str| -> String {
            match usable(value.map(String::as_str)) {
                Some(v) => {
                    detected = true;
                    v.to_string()
                }
                None => default.to_string(),
            }
        };

        let primaries = pick(stream.color_primaries.as_ref(), DEFAULT_PRIMARIES);
        let transfer = pick(stream.color_transfer.as_ref(), DEFAULT_TRANSFER);
        let matrix = pick(stream.color_space.as_ref(), DEFAULT_MATRIX);
        let range = pick(stream.color_range.as_ref(), DEFAULT_RANGE);
        let pix_fmt = pick(stream.pix_fmt.as_ref(), DEFAULT_PIX_FMT);

        Self {
            primaries,
            transfer,
            matrix,
            range,
            pix_fmt,
            detected,
        }
    }

    /// Pixel format to encode with: the detected one when it is a 4:2:0
    /// layout H.264 players accept, `yuv420p` otherwise.
    pub fn encode_pix_fmt(&self) -> &str {
        if self.pix_fmt.starts_with("yuv420") || self.pix_fmt == "nv12" {
            &self.pix_fmt
        } else {
            DEFAULT_PIX_FMT
        }
    }

    /// Encoder arguments that pin pixel format and all four color tags.
    pub fn encoder_args(&self) -> Vec<String> {
        vec![
            "-pix_fmt".into(),
            self.encode_pix_fmt().to_string(),
            "-color_primaries".into(),
            self.primaries.clone(),
            "-color_trc".into(),
            self.transfer.clone(),
            "-colorspace".into(),
            self.matrix.clone(),
            "-color_range".into(),
            self.range.clone(),
        ]
    }

    /// Matrix name understood by the `scale` filter's
    /// `in_color_matrix`/`out_color_matrix` options.
    pub fn swscale_matrix(&self) -> &'static str {
        match self.matrix.as_str() {
            "smpte170m" => "smpte170m",
            "bt470bg" => "bt470",
            "bt2020nc" | "bt2020c" => "bt2020",
            "smpte240m" => "smpte240m",
            "fcc" => "fcc",
            _ => "bt709",
        }
    }

    /// Range name understood by the `scale` filter.
    pub fn swscale_range(&self) -> &'static str {
        match self.range.as_str() {
            "pc" | "jpeg" | "full" => "pc",
            _ => "tv",
        }
    }
}

/// Detects [`ColorProperties`] and memoizes them per input path.
///
/// The cache belongs to whoever owns the probe (one per processor); it is
/// never shared process-wide.
#[derive(Debug, Default)]
pub struct ColorProfileProbe {
    cache: DashMap<PathBuf, ColorProperties>,
}

impl ColorProfileProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Color properties of `path`. Never fails: any probe error yields the
    /// defaults, logged at `warn`.
    pub async fn probe(&self, tools: &ToolRegistry, path: &Path) -> ColorProperties {
        if let Some(hit) = self.cache.get(path) {
            return hit.clone();
        }

        let props = match probe_media(tools, path).await {
            Ok(probe) => match probe.video {
                Some(stream) => ColorProperties::from_stream(&stream),
                None => {
                    tracing::warn!("No video stream in {}; using default colors", path.display());
                    ColorProperties::default()
                }
            },
            Err(e) => {
                tracing::warn!("Color probe failed ({e}); using default colors");
                ColorProperties::default()
            }
        };

        tracing::debug!(
            "Color profile for {}: {}/{}/{} range={} pix_fmt={} detected={}",
            path.display(),
            props.primaries,
            props.transfer,
            props.matrix,
            props.range,
            props.pix_fmt,
            props.detected
        );
        self.cache.insert(path.to_path_buf(), props.clone());
        props
    }

    /// Seed the cache, e.g. for a path whose colors are already known.
    pub fn insert(&self, path: &Path, props: ColorProperties) {
        self.cache.insert(path.to_path_buf(), props);
    }

    pub fn cached(&self, path: &Path) -> Option<ColorProperties> {
        self.cache.get(path).map(|p| p.clone())
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
