//! The verification report and the change flags it carries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stats::VideoStats;

/// Durations closer than this are considered equal.
pub const DURATION_TOLERANCE_SECS: f64 = 0.1;

/// How the original of a comparison was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// The caller named both files, or a run report mapped them.
    Exact,
    /// Chosen by timestamp proximity among retained scratch copies.
    Inferred,
    /// Newest file in the input directory; may be unrelated.
    Fallback,
}

/// The six structural differences between two videos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFlags {
    pub file_hash_changed: bool,
    pub first_frame_changed: bool,
    pub last_frame_changed: bool,
    /// Deep inequality of the ffprobe format and stream blocks, excluding
    /// `format.filename`: a copy at another path does not count as changed.
    pub metadata_changed: bool,
    /// Durations differ by more than 0.1 s.
    pub duration_changed: bool,
    /// Display width or height differ.
    pub resolution_changed: bool,
}

impl ChangeFlags {
    pub fn compute(
        original_hash: &str,
        processed_hash: &str,
        original: &VideoStats,
        processed: &VideoStats,
        original_metadata: &serde_json::Value,
        processed_metadata: &serde_json::Value,
    ) -> Self {
        Self {
            file_hash_changed: original_hash != processed_hash,
            first_frame_changed: original.first_frame_hash != processed.first_frame_hash,
            last_frame_changed: original.last_frame_hash != processed.last_frame_hash,
            metadata_changed: original_metadata != processed_metadata,
            duration_changed: (original.duration - processed.duration).abs()
                > DURATION_TOLERANCE_SECS,
            resolution_changed: original.width != processed.width
                || original.height != processed.height,
        }
    }

    /// Names of the flags that are set.
    pub fn changed(&self) -> Vec<&'static str> {
        [
            ("file hash", self.file_hash_changed),
            ("first frame", self.first_frame_changed),
            ("last frame", self.last_frame_changed),
            ("metadata", self.metadata_changed),
            ("duration", self.duration_changed),
            ("resolution", self.resolution_changed),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}

/// Result of comparing an original video with its processed counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub original_name: String,
    pub processed_name: String,
    pub original_hash: String,
    pub processed_hash: String,
    pub original_stats: VideoStats,
    pub processed_stats: VideoStats,
    pub original_metadata: serde_json::Value,
    pub processed_metadata: serde_json::Value,
    #[serde(flatten)]
    pub flags: ChangeFlags,
    pub match_kind: MatchKind,
    /// Set whenever the original was not known for certain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_warning: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl VerificationReport {
    /// The processed file is bit-distinct from the original.
    pub fn fingerprint_changed(&self) -> bool {
        self.flags.file_hash_changed
    }

    /// Resolution and duration survived processing.
    pub fn structure_preserved(&self) -> bool {
        !self.flags.resolution_changed && !self.flags.duration_changed
    }

    pub fn to_json_pretty(&self) -> vs_core::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| vs_core::Error::Internal(format!("failed to serialize report: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stats(w: u32, h: u32, duration: f64, first: &str, last: Option<&str>) -> VideoStats {
        VideoStats {
            width: w,
            height: h,
            duration,
            first_frame_hash: Some(first.into()),
            last_frame_hash: last.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn identical_inputs_change_nothing() {
        let s = stats(1920, 1080, 10.0, "aa", Some("bb"));
        let meta = json!({"format": {"duration": "10.0"}});
        let flags = ChangeFlags::compute("h", "h", &s, &s, &meta, &meta);
        assert_eq!(flags, ChangeFlags::default());
        assert!(flags.changed().is_empty());
    }

    #[test]
    fn flags_are_symmetric() {
        let a = stats(1920, 1080, 10.0, "aa", Some("bb"));
        let b = stats(1280, 720, 10.3, "aa", None);
        let ma = json!({"streams": [{"codec_name": "h264"}]});
        let mb = json!({"streams": [{"codec_name": "hevc"}]});

        let forward = ChangeFlags::compute("x", "y", &a, &b, &ma, &mb);
        let backward = ChangeFlags::compute("y", "x", &b, &a, &mb, &ma);
        assert_eq!(forward, backward);
        assert_eq!(
            forward.changed(),
            vec!["file hash", "last frame", "metadata", "duration", "resolution"]
        );
    }

    #[test]
    fn duration_tolerance() {
        let a = stats(10, 10, 5.0, "f", None);
        let close = stats(10, 10, 5.09, "f", None);
        let far = stats(10, 10, 5.2, "f", None);
        let m = json!({});
        assert!(!ChangeFlags::compute("h", "h", &a, &close, &m, &m).duration_changed);
        assert!(ChangeFlags::compute("h", "h", &a, &far, &m, &m).duration_changed);
    }

    #[test]
    fn metadata_comparison_is_deep() {
        let a = json!({"format": {"tags": {"title": "x"}}});
        let b = json!({"format": {"tags": {"title": "y"}}});
        let s = stats(1, 1, 1.0, "f", None);
        assert!(ChangeFlags::compute("h", "h", &s, &s, &a, &b).metadata_changed);
    }

    #[test]
    fn report_json_has_flat_flags_and_warning() {
        let s = stats(2, 2, 1.0, "f", None);
        let report = VerificationReport {
            original_name: "a.mp4".into(),
            processed_name: "vid_abcdefghijkl_123456.mp4".into(),
            original_hash: "h1".into(),
            processed_hash: "h2".into(),
            original_stats: s.clone(),
            processed_stats: s,
            original_metadata: json!({}),
            processed_metadata: json!({}),
            flags: ChangeFlags {
                file_hash_changed: true,
                ..Default::default()
            },
            match_kind: MatchKind::Fallback,
            verification_warning: Some("may not match".into()),
            generated_at: Utc::now(),
        };
        assert!(report.fingerprint_changed());
        assert!(report.structure_preserved());

        let value: serde_json::Value = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["file_hash_changed"], true);
        assert_eq!(value["resolution_changed"], false);
        assert_eq!(value["match_kind"], "fallback");
        assert_eq!(value["verification_warning"], "may not match");
    }
}
