//! The [`FingerprintVerifier`]: proves that processing changed a file while
//! keeping its structure.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use vs_av::ToolRegistry;
use vs_core::paths::display_name;
use vs_core::StorageLayout;
use vs_pipeline::RunReport;

use crate::hash::file_hash;
use crate::locate::locate_last_processed;
use crate::report::{ChangeFlags, MatchKind, VerificationReport};
use crate::stats::{metadata, video_stats};

#[derive(Debug, Clone)]
pub struct FingerprintVerifier {
    tools: Arc<ToolRegistry>,
}

impl FingerprintVerifier {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }

    /// Compare two explicitly named files.
    pub async fn compare(
        &self,
        original: &Path,
        processed: &Path,
    ) -> vs_core::Result<VerificationReport> {
        self.compare_as(original, processed, MatchKind::Exact, None)
            .await
    }

    /// Compare the input and output recorded by a run.
    pub async fn verify_run(&self, run: &RunReport) -> vs_core::Result<VerificationReport> {
        self.compare(&run.input, &run.output_path).await
    }

    /// Verify the newest output in `layout`, guessing its original.
    ///
    /// Returns `Ok(None)` when there is no output, or no candidate original.
    pub async fn auto_verify_last_processed(
        &self,
        layout: &StorageLayout,
    ) -> vs_core::Result<Option<VerificationReport>> {
        let Some(pair) = locate_last_processed(layout) else {
            tracing::info!("No processed video with a candidate original found");
            return Ok(None);
        };
        if let Some(warning) = &pair.warning {
            tracing::warn!("{warning}");
        }
        let report = self
            .compare_as(&pair.original, &pair.processed, pair.match_kind, pair.warning)
            .await?;
        Ok(Some(report))
    }

    async fn compare_as(
        &self,
        original: &Path,
        processed: &Path,
        match_kind: MatchKind,
        warning: Option<String>,
    ) -> vs_core::Result<VerificationReport> {
        for path in [original, processed] {
            if !path.is_file() {
                return Err(vs_core::Error::Validation(format!(
                    "cannot verify, file not found: {}",
                    path.display()
                )));
            }
        }
        tracing::info!(
            "Verifying {} against {}",
            display_name(processed),
            display_name(original)
        );

        let (original_hash, processed_hash) =
            tokio::try_join!(hash_blocking(original), hash_blocking(processed))?;
        let tools = self.tools.as_ref();
        let (original_stats, processed_stats, original_metadata, processed_metadata) = tokio::join!(
            video_stats(tools, original),
            video_stats(tools, processed),
            metadata(tools, original),
            metadata(tools, processed),
        );

        let flags = ChangeFlags::compute(
            &original_hash,
            &processed_hash,
            &original_stats,
            &processed_stats,
            &original_metadata,
            &processed_metadata,
        );
        tracing::debug!("Changed: {:?}", flags.changed());

        Ok(VerificationReport {
            original_name: display_name(original),
            processed_name: display_name(processed),
            original_hash,
            processed_hash,
            original_stats,
            processed_stats,
            original_metadata,
            processed_metadata,
            flags,
            match_kind,
            verification_warning: warning,
            generated_at: chrono::Utc::now(),
        })
    }
}

async fn hash_blocking(path: &Path) -> vs_core::Result<String> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || file_hash(&path))
        .await
        .map_err(|e| vs_core::Error::Internal(format!("hashing task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> FingerprintVerifier {
        FingerprintVerifier::new(Arc::new(ToolRegistry::from_paths(
            "/nonexistent/ffmpeg",
            "/nonexistent/ffprobe",
        )))
    }

    #[tokio::test]
    async fn identical_files_report_no_hash_change() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();

        let report = verifier().compare(&a, &b).await.unwrap();
        assert!(!report.fingerprint_changed());
        assert_eq!(report.original_hash, report.processed_hash);
        assert_eq!(report.match_kind, MatchKind::Exact);
        assert!(report.verification_warning.is_none());
    }

    #[tokio::test]
    async fn swapping_arguments_keeps_flags() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        std::fs::write(&a, b"original").unwrap();
        std::fs::write(&b, b"processed").unwrap();

        let v = verifier();
        let forward = v.compare(&a, &b).await.unwrap();
        let backward = v.compare(&b, &a).await.unwrap();
        assert!(forward.fingerprint_changed());
        assert_eq!(forward.flags, backward.flags);
        assert_eq!(forward.original_hash, backward.processed_hash);
    }

    #[tokio::test]
    async fn missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        std::fs::write(&a, b"x").unwrap();
        let err = verifier()
            .compare(&a, &dir.path().join("gone.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, vs_core::Error::Validation(_)));
    }

    #[tokio::test]
    async fn auto_verify_carries_warning() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::under(dir.path());
        layout.ensure_dirs().unwrap();
        std::fs::write(layout.output_dir().join("vid_abcdefghijkl_123456.mp4"), b"out").unwrap();
        std::fs::write(layout.input_dir().join("raw.mp4"), b"in").unwrap();

        let report = verifier()
            .auto_verify_last_processed(&layout)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.match_kind, MatchKind::Fallback);
        assert!(report.verification_warning.is_some());
        assert!(report.fingerprint_changed());
    }

    #[tokio::test]
    async fn auto_verify_with_empty_layout() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::under(dir.path());
        assert!(verifier()
            .auto_verify_last_processed(&layout)
            .await
            .unwrap()
            .is_none());
    }
}
