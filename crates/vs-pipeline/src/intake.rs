//! Input acceptance checks and upload staging.
//!
//! Everything here runs before a file reaches the pipeline. Rejections are
//! [`vs_core::Error::Validation`].

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use vs_core::config::IntakeConfig;
use vs_core::paths::{display_name, has_extension};
use vs_core::StorageLayout;

/// An input copied into the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUpload {
    pub original_name: String,
    /// `input_<name>`: the copy handed to the pipeline.
    pub staged: PathBuf,
    /// `verification_<ts>_<name>`: kept for later fingerprint checks.
    pub verification_copy: PathBuf,
}

/// Check that `path` is a non-empty file of an accepted type and size.
///
/// Returns the file size in bytes.
pub fn validate_input(path: &Path, intake: &IntakeConfig) -> vs_core::Result<u64> {
    let name = display_name(path);
    let meta = std::fs::metadata(path)
        .map_err(|e| vs_core::Error::Validation(format!("cannot read {name}: {e}")))?;
    if !meta.is_file() {
        return Err(vs_core::Error::Validation(format!("{name} is not a file")));
    }

    if !has_extension(path, intake.extensions.as_slice()) {
        return Err(vs_core::Error::Validation(format!(
            "{name}: unsupported file type (accepted: {})",
            intake.extensions.join(", ")
        )));
    }

    let size = meta.len();
    if size == 0 {
        return Err(vs_core::Error::Validation(format!("{name} is empty")));
    }
    let limit = intake.max_file_size_bytes();
    if size > limit {
        return Err(vs_core::Error::Validation(format!(
            "{name} is {:.1} MiB, limit is {} MiB",
            size as f64 / (1024.0 * 1024.0),
            intake.max_file_size_mb
        )));
    }

    Ok(size)
}

/// Validate `source`, then copy it into the scratch directory as a staged
/// input plus a timestamped verification copy.
pub fn stage_upload(
    layout: &StorageLayout,
    source: &Path,
    intake: &IntakeConfig,
) -> vs_core::Result<StagedUpload> {
    validate_input(source, intake)?;
    layout.ensure_dirs()?;

    let original_name = display_name(source);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let staged = layout.staged_input_path(&original_name);
    std::fs::copy(source, &staged)?;
    let verification_copy = layout.verification_copy_path(&original_name, now);
    std::fs::copy(source, &verification_copy)?;

    tracing::info!(
        "Staged {original_name} as {} (verification copy {})",
        staged.display(),
        verification_copy.display()
    );

    Ok(StagedUpload {
        original_name,
        staged,
        verification_copy,
    })
}
