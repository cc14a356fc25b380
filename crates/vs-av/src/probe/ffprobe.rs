//! `ffprobe` invocation and JSON parsing.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format
//! -show_streams` and maps the output into [`MediaProbe`]. The raw JSON is
//! also exposed for callers that compare whole metadata blocks.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::tools::ToolRegistry;

/// Budget for a single ffprobe call.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Stream and container facts used by the pipeline and the verifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaProbe {
    /// Container duration in seconds.
    pub duration: Option<f64>,
    /// First video stream, if any.
    pub video: Option<VideoStream>,
    /// First audio stream, if any.
    pub audio: Option<AudioStream>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoStream {
    pub width: u32,
    pub height: u32,
    /// Frames per second from `r_frame_rate` (falls back to
    /// `avg_frame_rate`); 0 when unknown.
    pub fps: f64,
    /// `avg_frame_rate` (falls back to `r_frame_rate`); 0 when unknown.
    /// Differs from `fps` on variable-frame-rate sources.
    pub avg_fps: f64,
    /// Clockwise display rotation in degrees: 0, 90, 180 or 270.
    pub rotation: u16,
    pub nb_frames: Option<u64>,
    pub duration: Option<f64>,
    pub pix_fmt: Option<String>,
    pub color_primaries: Option<String>,
    pub color_transfer: Option<String>,
    pub color_space: Option<String>,
    pub color_range: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioStream {
    pub sample_rate: Option<u32>,
    pub channel_layout: Option<String>,
    pub channels: Option<u32>,
}

impl VideoStream {
    /// Width and height as displayed, i.e. after applying the rotation.
    /// ffmpeg decodes to this size unless autorotation is disabled.
    pub fn display_size(&self) -> (u32, u32) {
        if self.rotation % 180 == 90 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

impl MediaProbe {
    /// Best-known duration: container first, then the video stream.
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration
            .or_else(|| self.video.as_ref().and_then(|v| v.duration))
            .filter(|d| *d > 0.0)
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

/// Run ffprobe and return its JSON document unparsed.
pub async fn probe_json(tools: &ToolRegistry, path: &Path) -> vs_core::Result<String> {
    let mut cmd = tools.command("ffprobe")?;
    cmd.timeout(PROBE_TIMEOUT);
    cmd.args([
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ]);
    cmd.arg(path.to_string_lossy().as_ref());

    let output = cmd.execute().await?;
    Ok(output.stdout)
}

/// Probe `path` and parse the first video and audio streams.
pub async fn probe_media(tools: &ToolRegistry, path: &Path) -> vs_core::Result<MediaProbe> {
    let json = probe_json(tools, path).await.map_err(|e| {
        vs_core::Error::Probe(format!("ffprobe failed for {}: {e}", path.display()))
    })?;
    parse_probe_output(&json)
}

/// Parse an ffprobe JSON document.
pub fn parse_probe_output(json: &str) -> vs_core::Result<MediaProbe> {
    let ff: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| vs_core::Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let mut probe = MediaProbe {
        duration: ff.format.and_then(|f| f.duration).and_then(|s| s.parse().ok()),
        ..Default::default()
    };

    for stream in ff.streams {
        match stream.codec_type.as_deref() {
            Some("video") if probe.video.is_none() => {
                let r_rate = stream.r_frame_rate.as_deref().and_then(parse_frame_rate);
                let avg_rate = stream.avg_frame_rate.as_deref().and_then(parse_frame_rate);
                let rotation = stream_rotation(&stream);
                probe.video = Some(VideoStream {
                    width: stream.width.unwrap_or(0),
                    height: stream.height.unwrap_or(0),
                    fps: r_rate.or(avg_rate).unwrap_or(0.0),
                    avg_fps: avg_rate.or(r_rate).unwrap_or(0.0),
                    rotation,
                    nb_frames: stream.nb_frames.and_then(|s| s.parse().ok()),
                    duration: stream.duration.and_then(|s| s.parse().ok()),
                    pix_fmt: stream.pix_fmt,
                    color_primaries: stream.color_primaries,
                    color_transfer: stream.color_transfer,
                    color_space: stream.color_space,
                    color_range: stream.color_range,
                });
            }
            Some("audio") if probe.audio.is_none() => {
                probe.audio = Some(AudioStream {
                    sample_rate: stream.sample_rate.and_then(|s| s.parse().ok()),
                    channel_layout: stream.channel_layout.filter(|l| !l.is_empty()),
                    channels: stream.channels,
                });
            }
            _ => {}
        }
    }

    Ok(probe)
}

/// Display rotation from the display-matrix side data, or the legacy
/// `rotate` tag written by older muxers.
///
/// ffprobe reports the matrix angle counter-clockwise (`-90` for a portrait
/// phone clip); the result is normalized to clockwise degrees in `0..360`.
fn stream_rotation(stream: &FfprobeStream) -> u16 {
    let from_matrix = stream
        .side_data_list
        .iter()
        .find_map(|sd| sd.rotation)
        .map(|r| -r);
    let from_tag = || {
        stream
            .tags
            .as_ref()
            .and_then(|t| t.rotate.as_deref())
            .and_then(|r| r.trim().parse::<f64>().ok())
    };
    let degrees = from_matrix.or_else(from_tag).unwrap_or(0.0);
    let quarter_turns = (degrees / 90.0).round() as i64;
    (quarter_turns.rem_euclid(4) * 90) as u16
}

/// Parse `"30000/1001"`, `"30/1"` or `"25"` into frames per second.
pub fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    if let Some((num, den)) = rate_str.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        return (den != 0.0 && num > 0.0).then(|| num / den);
    }
    rate_str.parse().ok().filter(|r: &f64| *r > 0.0)
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    pix_fmt: Option<String>,
    color_primaries: Option<String>,
    color_transfer: Option<String>,
    color_space: Option<String>,
    color_range: Option<String>,
    sample_rate: Option<String>,
    channel_layout: Option<String>,
    channels: Option<u32>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
    tags: Option<FfprobeTags>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}
