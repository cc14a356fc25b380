//! On-disk layout: input staging, output artifacts, and scratch space.
//!
//! Scratch files follow naming conventions that other components rely on:
//!
//! - `step<N>_<output name>`: per-stage artifacts of a single run.
//! - `input_<name>`: an input staged for processing.
//! - `verification_<unix ts>_<name>`: a retained copy of an input, used later
//!   to pair outputs with their originals.
//!
//! Stale scratch files are removed by [`StorageLayout::sweep_stale`]. The
//! sweep is best-effort hygiene: failures are logged and counted, never
//! returned.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::config::{HygieneConfig, PathsConfig};
use crate::error::Result;

/// Prefix of retained input copies in the scratch dir.
pub const VERIFICATION_PREFIX: &str = "verification_";

/// Prefix of staged inputs in the scratch dir.
pub const STAGED_INPUT_PREFIX: &str = "input_";

/// The three working directories used by a processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    input_dir: PathBuf,
    output_dir: PathBuf,
    temp_dir: PathBuf,
}

/// Outcome of a stale-file sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub removed: usize,
    pub failed: usize,
}

impl StorageLayout {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            temp_dir: temp_dir.into(),
        }
    }

    pub fn from_config(paths: &PathsConfig) -> Self {
        Self::new(&paths.input_dir, &paths.output_dir, &paths.temp_dir)
    }

    /// All three directories rooted under `root` (`input/`, `output/`,
    /// `temp/`).
    pub fn under(root: &Path) -> Self {
        Self::new(root.join("input"), root.join("output"), root.join("temp"))
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Create any missing directories.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.input_dir, &self.output_dir, &self.temp_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Scratch path for an input staged under its original name.
    pub fn staged_input_path(&self, original_name: &str) -> PathBuf {
        self.temp_dir
            .join(format!("{STAGED_INPUT_PREFIX}{original_name}"))
    }

    /// Scratch path for a retained verification copy created at `unix_ts`.
    pub fn verification_copy_path(&self, original_name: &str, unix_ts: u64) -> PathBuf {
        self.temp_dir
            .join(format!("{VERIFICATION_PREFIX}{unix_ts}_{original_name}"))
    }

    /// Delete stale scratch and staging files.
    ///
    /// Verification copies expire after `verification_retention`; every other
    /// scratch or staged-input file after `scratch_retention`. The output
    /// directory is never swept.
    pub fn sweep_stale(&self, hygiene: &HygieneConfig) -> SweepStats {
        self.sweep_stale_at(
            SystemTime::now(),
            hygiene.verification_retention(),
            hygiene.scratch_retention(),
        )
    }

    /// [`sweep_stale`](Self::sweep_stale) against an explicit clock.
    pub fn sweep_stale_at(
        &self,
        now: SystemTime,
        verification_retention: Duration,
        scratch_retention: Duration,
    ) -> SweepStats {
        let mut stats = SweepStats::default();

        for dir in [&self.temp_dir, &self.input_dir] {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!("Cannot sweep {}: {e}", dir.display());
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                let Ok(meta) = entry.metadata() else { continue };
                if !meta.is_file() {
                    continue;
                }
                let Ok(modified) = meta.modified() else { continue };
                let age = now.duration_since(modified).unwrap_or_default();

                let is_verification = entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(VERIFICATION_PREFIX);
                let retention = if is_verification {
                    verification_retention
                } else {
                    scratch_retention
                };

                if age <= retention {
                    continue;
                }

                match std::fs::remove_file(&path) {
                    Ok(()) => {
                        tracing::debug!("Swept stale file {}", path.display());
                        stats.removed += 1;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to sweep {}: {e}", path.display());
                        stats.failed += 1;
                    }
                }
            }
        }

        if stats.removed > 0 {
            tracing::info!("Removed {} stale file(s)", stats.removed);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const HOUR: Duration = Duration::from_secs(3600);

    fn layout() -> (tempfile::TempDir, StorageLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::under(dir.path());
        layout.ensure_dirs().unwrap();
        (dir, layout)
    }

    #[test]
    fn ensure_dirs_creates_all_three() {
        let (_dir, layout) = layout();
        assert!(layout.input_dir().is_dir());
        assert!(layout.output_dir().is_dir());
        assert!(layout.temp_dir().is_dir());
    }

    #[test]
    fn naming_conventions() {
        let layout = StorageLayout::new("in", "out", "tmp");
        assert_eq!(
            layout.verification_copy_path("clip.mp4", 1700000000),
            PathBuf::from("tmp/verification_1700000000_clip.mp4")
        );
        assert_eq!(
            layout.staged_input_path("clip.mp4"),
            PathBuf::from("tmp/input_clip.mp4")
        );
    }

    #[test]
    fn fresh_files_survive_sweep() {
        let (_dir, layout) = layout();
        let copy = layout.verification_copy_path("a.mp4", 1);
        fs::write(&copy, b"x").unwrap();

        let stats = layout.sweep_stale_at(SystemTime::now(), HOUR, 2 * HOUR);
        assert_eq!(stats, SweepStats::default());
        assert!(copy.exists());
    }

    #[test]
    fn verification_copies_expire_first() {
        let (_dir, layout) = layout();
        let copy = layout.verification_copy_path("a.mp4", 1);
        let scratch = layout.temp_dir().join("step1_vid_x.mp4");
        fs::write(&copy, b"x").unwrap();
        fs::write(&scratch, b"x").unwrap();

        let later = SystemTime::now() + HOUR + Duration::from_secs(60);
        let stats = layout.sweep_stale_at(later, HOUR, 2 * HOUR);
        assert_eq!(stats.removed, 1);
        assert!(!copy.exists());
        assert!(scratch.exists());

        let much_later = SystemTime::now() + 3 * HOUR;
        let stats = layout.sweep_stale_at(much_later, HOUR, 2 * HOUR);
        assert_eq!(stats.removed, 1);
        assert!(!scratch.exists());
    }

    #[test]
    fn outputs_are_never_swept() {
        let (_dir, layout) = layout();
        let out = layout.output_dir().join("vid_abc_123456.mp4");
        fs::write(&out, b"x").unwrap();

        layout.sweep_stale_at(SystemTime::now() + 100 * HOUR, HOUR, HOUR);
        assert!(out.exists());
    }

    #[test]
    fn sweep_tolerates_missing_dirs() {
        let layout = StorageLayout::new("/nonexistent/a", "/nonexistent/b", "/nonexistent/c");
        assert_eq!(
            layout.sweep_stale_at(SystemTime::now(), HOUR, HOUR),
            SweepStats::default()
        );
    }
}
