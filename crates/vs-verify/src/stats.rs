//! Structural statistics of a video: geometry, timing, boundary frames, and
//! container metadata.
//!
//! Nothing here fails on an unreadable video; missing facts come back as
//! zeros, `None`, or an empty JSON object, with a warning logged.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vs_av::probe::{probe_json, probe_media, MediaProbe};
use vs_av::{DecodeWindow, FrameGeometry, FrameReader, ToolRegistry};

use crate::hash::bytes_hash;

/// Seconds before the end decoded when looking for the last frame.
const TAIL_WINDOW_SECS: f64 = 3.0;

/// Grace period for decoders that must be stopped early.
const DECODE_GRACE: std::time::Duration = std::time::Duration::from_secs(2);

const DECODE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoStats {
    pub file_path: PathBuf,
    pub frame_count: u64,
    pub fps: f64,
    /// Display width, after any rotation side data is applied.
    pub width: u32,
    /// Display height, after any rotation side data is applied.
    pub height: u32,
    /// `frame_count / fps`, or 0 when the frame rate is unknown.
    pub duration: f64,
    /// SHA-256 of the first decoded RGB frame.
    pub first_frame_hash: Option<String>,
    /// SHA-256 of the last decoded RGB frame; only computed when there is
    /// more than one frame.
    pub last_frame_hash: Option<String>,
}

impl VideoStats {
    /// Geometry and timing from a probe result. Frame hashes are left empty.
    pub fn from_probe(path: &Path, probe: &MediaProbe) -> Self {
        let Some(video) = probe.video.as_ref() else {
            return Self {
                file_path: path.to_path_buf(),
                ..Default::default()
            };
        };
        let fps = video.fps.max(0.0);
        let (width, height) = video.display_size();
        let frame_count = video.nb_frames.filter(|n| *n > 0).unwrap_or_else(|| {
            probe
                .duration_secs()
                .map(|d| (d * fps).round().max(0.0) as u64)
                .unwrap_or(0)
        });
        let duration = if fps > 0.0 {
            frame_count as f64 / fps
        } else {
            0.0
        };
        Self {
            file_path: path.to_path_buf(),
            frame_count,
            fps,
            width,
            height,
            duration,
            first_frame_hash: None,
            last_frame_hash: None,
        }
    }
}

/// Collect [`VideoStats`] for `path`.
pub async fn video_stats(tools: &ToolRegistry, path: &Path) -> VideoStats {
    let probe = match probe_media(tools, path).await {
        Ok(probe) => probe,
        Err(e) => {
            tracing::warn!("Could not probe {}: {e}", path.display());
            return VideoStats {
                file_path: path.to_path_buf(),
                ..Default::default()
            };
        }
    };

    let mut stats = VideoStats::from_probe(path, &probe);
    if stats.width == 0 || stats.height == 0 {
        return stats;
    }
    let geometry = FrameGeometry::new(stats.width, stats.height);

    stats.first_frame_hash = boundary_frame_hash(tools, path, geometry, DecodeWindow::First(1)).await;
    if stats.frame_count > 1 {
        stats.last_frame_hash =
            boundary_frame_hash(tools, path, geometry, DecodeWindow::Tail(TAIL_WINDOW_SECS)).await;
    }
    stats
}

/// Hash of the last frame decoded within `window`.
async fn boundary_frame_hash(
    tools: &ToolRegistry,
    path: &Path,
    geometry: FrameGeometry,
    window: DecodeWindow,
) -> Option<String> {
    let mut reader = match FrameReader::spawn(tools, path, geometry, None, window) {
        Ok(reader) => reader,
        Err(e) => {
            tracing::warn!("Could not decode {}: {e}", path.display());
            return None;
        }
    };

    let mut last = None;
    loop {
        match reader.read_frame().await {
            Ok(Some(frame)) => last = Some(frame),
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Decoding {} failed: {e}", path.display());
                reader.abort(DECODE_GRACE).await;
                return None;
            }
        }
    }
    if let Err(e) = reader.finish(DECODE_TIMEOUT, DECODE_GRACE).await {
        tracing::warn!("Decoder for {} exited badly: {e}", path.display());
    }

    last.map(|frame| bytes_hash(frame.as_raw()))
}

/// Drop the fields of an ffprobe document that describe where the file
/// lives rather than what it contains (`format.filename`).
pub fn comparable_metadata(mut value: serde_json::Value) -> serde_json::Value {
    if let Some(format) = value.get_mut("format").and_then(|f| f.as_object_mut()) {
        format.remove("filename");
    }
    value
}

/// ffprobe's format and stream description of `path`, or `{}` when it
/// cannot be read.
///
/// `format.filename` is dropped so that two copies of the same file compare
/// equal.
pub async fn metadata(tools: &ToolRegistry, path: &Path) -> serde_json::Value {
    let empty = || serde_json::Value::Object(serde_json::Map::new());
    match probe_json(tools, path).await {
        Ok(json) => match serde_json::from_str::<serde_json::Value>(&json) {
            Ok(value) => comparable_metadata(value),
            Err(e) => {
                tracing::warn!("Unparseable ffprobe output for {}: {e}", path.display());
                empty()
            }
        },
        Err(e) => {
            tracing::warn!("Could not read metadata of {}: {e}", path.display());
            empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vs_av::probe::parse_probe_output;

    fn probe_of(json: &str) -> MediaProbe {
        parse_probe_output(json).unwrap()
    }

    #[test]
    fn stats_from_counted_frames() {
        let probe = probe_of(
            r#"{"streams":[{"codec_type":"video","width":640,"height":360,
                "r_frame_rate":"25/1","nb_frames":"50"}],
               "format":{"duration":"2.04"}}"#,
        );
        let stats = VideoStats::from_probe(Path::new("a.mp4"), &probe);
        assert_eq!(stats.frame_count, 50);
        assert_eq!(stats.fps, 25.0);
        assert_eq!((stats.width, stats.height), (640, 360));
        assert_eq!(stats.duration, 2.0);
    }

    #[test]
    fn rotated_stream_reports_display_size() {
        let probe = probe_of(
            r#"{"streams":[{"codec_type":"video","width":1920,"height":1080,
                "r_frame_rate":"30/1","nb_frames":"30",
                "side_data_list":[{"side_data_type":"Display Matrix","rotation":-90}]}]}"#,
        );
        let stats = VideoStats::from_probe(Path::new("portrait.mp4"), &probe);
        assert_eq!((stats.width, stats.height), (1080, 1920));
    }

    #[test]
    fn frame_count_falls_back_to_duration() {
        let probe = probe_of(
            r#"{"streams":[{"codec_type":"video","width":320,"height":240,
                "r_frame_rate":"30/1"}],
               "format":{"duration":"1.5"}}"#,
        );
        let stats = VideoStats::from_probe(Path::new("b.webm"), &probe);
        assert_eq!(stats.frame_count, 45);
        assert_eq!(stats.duration, 1.5);
    }

    #[test]
    fn unknown_fps_gives_zero_duration() {
        let probe = probe_of(
            r#"{"streams":[{"codec_type":"video","width":320,"height":240,
                "r_frame_rate":"0/0","nb_frames":"10"}]}"#,
        );
        let stats = VideoStats::from_probe(Path::new("c.mp4"), &probe);
        assert_eq!(stats.frame_count, 10);
        assert_eq!(stats.duration, 0.0);
    }

    #[test]
    fn audio_only_has_empty_stats() {
        let probe = probe_of(r#"{"streams":[{"codec_type":"audio","sample_rate":"44100"}]}"#);
        let stats = VideoStats::from_probe(Path::new("d.mp4"), &probe);
        assert_eq!(stats.frame_count, 0);
        assert_eq!(stats.width, 0);
        assert_eq!(stats.file_path, PathBuf::from("d.mp4"));
    }

    #[test]
    fn metadata_ignores_file_location_only() {
        let at = |name: &str, title: &str| {
            serde_json::json!({
                "format": {"filename": name, "size": "10", "tags": {"title": title}},
                "streams": [{"codec_type": "video"}]
            })
        };
        assert_eq!(
            comparable_metadata(at("/in/a.mp4", "x")),
            comparable_metadata(at("/out/b.mp4", "x"))
        );
        assert_ne!(
            comparable_metadata(at("/in/a.mp4", "x")),
            comparable_metadata(at("/in/a.mp4", "y"))
        );
        assert_eq!(comparable_metadata(serde_json::json!({})), serde_json::json!({}));
    }

    #[tokio::test]
    async fn unreadable_video_degrades_gracefully() {
        let tools = ToolRegistry::from_paths("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        let stats = video_stats(&tools, Path::new("missing.mp4")).await;
        assert_eq!(stats.frame_count, 0);
        assert!(stats.first_frame_hash.is_none());
        assert_eq!(metadata(&tools, Path::new("missing.mp4")).await, serde_json::json!({}));
    }
}
