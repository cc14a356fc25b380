//! Finding the original of the most recently processed video when no run
//! report is available.
//!
//! The pairing is a heuristic over modification times, so every match it
//! produces carries a warning.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use vs_core::layout::{STAGED_INPUT_PREFIX, VERIFICATION_PREFIX};
use vs_core::paths::display_name;
use vs_core::StorageLayout;

use crate::report::MatchKind;

/// Scratch copies further than this from the output's modification time are
/// not considered.
pub const MATCH_WINDOW: Duration = Duration::from_secs(3600);

/// An original/processed pair chosen for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedPair {
    pub original: PathBuf,
    pub processed: PathBuf,
    pub match_kind: MatchKind,
    pub warning: Option<String>,
}

/// Files in `dir` accepted by `keep`, with their modification times.
/// Unreadable entries are skipped.
fn list_files(dir: &Path, keep: impl Fn(&Path) -> bool) -> Vec<(PathBuf, SystemTime)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            let path = entry.path();
            if !keep(&path) {
                return None;
            }
            Some((path, meta.modified().ok()?))
        })
        .collect()
}

fn name_starts_with(path: &Path, prefix: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(prefix))
}

fn distance(a: SystemTime, b: SystemTime) -> Duration {
    a.duration_since(b).unwrap_or_else(|e| e.duration())
}

/// The most recently modified candidate.
pub fn newest(candidates: &[(PathBuf, SystemTime)]) -> Option<&(PathBuf, SystemTime)> {
    candidates.iter().max_by_key(|(_, t)| *t)
}

/// The candidate closest in time to `target`, if any lies within `window`.
pub fn closest_within(
    candidates: &[(PathBuf, SystemTime)],
    target: SystemTime,
    window: Duration,
) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|(path, t)| (path, distance(*t, target)))
        .filter(|(_, d)| *d < window)
        .min_by_key(|(_, d)| *d)
        .map(|(path, _)| path.clone())
}

/// Pair the newest `.mp4` in the output directory with its most plausible
/// original.
///
/// Preference order: a `verification_*` copy in the scratch directory, then a
/// staged `input_*` file, both within [`MATCH_WINDOW`] of the output; then
/// the newest file in the input directory.
pub fn locate_last_processed(layout: &StorageLayout) -> Option<LocatedPair> {
    let outputs = list_files(layout.output_dir(), |p| {
        p.extension().and_then(|e| e.to_str()) == Some("mp4")
    });
    let (processed, output_time) = newest(&outputs)?.clone();

    let verification = list_files(layout.temp_dir(), |p| name_starts_with(p, VERIFICATION_PREFIX));
    let staged = list_files(layout.temp_dir(), |p| name_starts_with(p, STAGED_INPUT_PREFIX));

    for candidates in [&verification, &staged] {
        if let Some(original) = closest_within(candidates, output_time, MATCH_WINDOW) {
            let warning = format!(
                "Matched {} to {} by modification time",
                display_name(&original),
                display_name(&processed)
            );
            return Some(LocatedPair {
                original,
                processed,
                match_kind: MatchKind::Inferred,
                warning: Some(warning),
            });
        }
    }

    let inputs = list_files(layout.input_dir(), |_| true);
    let (original, _) = newest(&inputs)?.clone();
    let warning = format!(
        "Using input file {} - may not match the processed output",
        display_name(&original)
    );
    Some(LocatedPair {
        original,
        processed,
        match_kind: MatchKind::Fallback,
        warning: Some(warning),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn closest_respects_window() {
        let candidates = vec![
            (PathBuf::from("far"), at(10_000)),
            (PathBuf::from("near"), at(5_100)),
            (PathBuf::from("nearer_after"), at(4_950)),
        ];
        assert_eq!(
            closest_within(&candidates, at(5_000), MATCH_WINDOW),
            Some(PathBuf::from("nearer_after"))
        );
        assert_eq!(closest_within(&candidates, at(100_000), MATCH_WINDOW), None);
        assert_eq!(closest_within(&[], at(0), MATCH_WINDOW), None);
    }

    #[test]
    fn newest_picks_latest() {
        let candidates = vec![(PathBuf::from("a"), at(1)), (PathBuf::from("b"), at(3))];
        assert_eq!(newest(&candidates).unwrap().0, PathBuf::from("b"));
    }

    fn setup(root: &Path) -> StorageLayout {
        let layout = StorageLayout::under(root);
        layout.ensure_dirs().unwrap();
        std::fs::write(layout.output_dir().join("vid_abcdefghijkl_123456.mp4"), b"out").unwrap();
        layout
    }

    #[test]
    fn nothing_processed_yet() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::under(dir.path());
        layout.ensure_dirs().unwrap();
        assert_eq!(locate_last_processed(&layout), None);
    }

    #[test]
    fn prefers_verification_copy() {
        let dir = tempfile::tempdir().unwrap();
        let layout = setup(dir.path());
        std::fs::write(layout.temp_dir().join("input_clip.mp4"), b"in").unwrap();
        std::fs::write(layout.temp_dir().join("verification_1700000000_clip.mp4"), b"in").unwrap();
        std::fs::write(layout.input_dir().join("other.mp4"), b"in").unwrap();

        let pair = locate_last_processed(&layout).unwrap();
        assert_eq!(display_name(&pair.original), "verification_1700000000_clip.mp4");
        assert_eq!(pair.match_kind, MatchKind::Inferred);
        assert!(pair.warning.is_some());
    }

    #[test]
    fn falls_back_to_staged_input() {
        let dir = tempfile::tempdir().unwrap();
        let layout = setup(dir.path());
        std::fs::write(layout.temp_dir().join("input_clip.mp4"), b"in").unwrap();
        std::fs::write(layout.temp_dir().join("step1_vid_x.mp4"), b"tmp").unwrap();

        let pair = locate_last_processed(&layout).unwrap();
        assert_eq!(display_name(&pair.original), "input_clip.mp4");
        assert_eq!(pair.match_kind, MatchKind::Inferred);
    }

    #[test]
    fn last_resort_uses_input_dir_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let layout = setup(dir.path());
        std::fs::write(layout.input_dir().join("raw.mov"), b"in").unwrap();

        let pair = locate_last_processed(&layout).unwrap();
        assert_eq!(display_name(&pair.original), "raw.mov");
        assert_eq!(pair.match_kind, MatchKind::Fallback);
        assert_eq!(
            pair.warning.as_deref(),
            Some("Using input file raw.mov - may not match the processed output")
        );
    }

    #[test]
    fn output_without_any_original() {
        let dir = tempfile::tempdir().unwrap();
        let layout = setup(dir.path());
        assert_eq!(locate_last_processed(&layout), None);
    }
}
