//! Unified error type for vidshift.
//!
//! All library crates funnel their failures into [`Error`]. Only
//! [`Error::Stage`] and [`Error::Timeout`] are meant to cross the pipeline
//! boundary as run failures; the tool-level variants are mapped into them by
//! the executor, and probe failures are absorbed locally.

use std::time::Duration;

/// Unified error type covering all failure modes in vidshift.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A pipeline stage failed (non-zero exit from the encoder, or any other
    /// error raised while the stage ran).
    #[error("Stage '{stage}' failed for {file}: {diagnostics}")]
    Stage {
        /// Stage name (e.g. "Re-encode").
        stage: String,
        /// Original input file name.
        file: String,
        /// Raw diagnostic text, usually the tail of the encoder's stderr.
        diagnostics: String,
    },

    /// A pipeline stage exceeded its wall-clock budget and was terminated.
    #[error("Stage '{stage}' timed out for {file} after {after:?}")]
    Timeout {
        /// Stage name.
        stage: String,
        /// Original input file name.
        file: String,
        /// The budget that was exceeded.
        after: Duration,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description, including captured stderr.
        message: String,
    },

    /// An external tool ran past its timeout and was killed.
    #[error("Tool error [{tool}]: timed out after {after:?}")]
    ToolTimeout {
        /// Name of the tool that was killed.
        tool: String,
        /// The timeout that expired.
        after: Duration,
    },

    /// Media probing failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Input or option validation failed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration could not be parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Stage`].
    pub fn stage(
        stage: impl Into<String>,
        file: impl Into<String>,
        diagnostics: impl Into<String>,
    ) -> Self {
        Error::Stage {
            stage: stage.into(),
            file: file.into(),
            diagnostics: diagnostics.into(),
        }
    }

    /// Re-tag an error raised inside a stage with the stage name and the
    /// original file name.
    ///
    /// Tool timeouts become [`Error::Timeout`]; everything else becomes
    /// [`Error::Stage`] carrying the original message as diagnostics.
    pub fn into_stage_failure(self, stage: &str, file: &str) -> Self {
        match self {
            Error::ToolTimeout { after, .. } => Error::Timeout {
                stage: stage.to_string(),
                file: file.to_string(),
                after,
            },
            already @ (Error::Stage { .. } | Error::Timeout { .. }) => already,
            Error::Tool { message, .. } => Error::stage(stage, file, message),
            other => Error::stage(stage, file, other.to_string()),
        }
    }

    /// Whether this error represents an expired timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::ToolTimeout { .. })
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_display() {
        let err = Error::stage("Strip metadata", "clip.mp4", "exit status 1");
        assert_eq!(
            err.to_string(),
            "Stage 'Strip metadata' failed for clip.mp4: exit status 1"
        );
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "exit code 1");
        assert_eq!(err.to_string(), "Tool error [ffmpeg]: exit code 1");
    }

    #[test]
    fn tool_timeout_maps_to_stage_timeout() {
        let err = Error::ToolTimeout {
            tool: "ffmpeg".into(),
            after: Duration::from_secs(5),
        }
        .into_stage_failure("Re-encode", "clip.mp4");

        assert!(err.is_timeout());
        match err {
            Error::Timeout { stage, file, after } => {
                assert_eq!(stage, "Re-encode");
                assert_eq!(file, "clip.mp4");
                assert_eq!(after, Duration::from_secs(5));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn tool_error_keeps_raw_diagnostics() {
        let err = Error::tool("ffmpeg", "Invalid data found when processing input")
            .into_stage_failure("Add overlay", "clip.mp4");
        match err {
            Error::Stage { diagnostics, .. } => {
                assert_eq!(diagnostics, "Invalid data found when processing input");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn stage_failure_is_not_retagged() {
        let err = Error::stage("Add noise", "a.mp4", "boom").into_stage_failure("Other", "b.mp4");
        assert_eq!(err.to_string(), "Stage 'Add noise' failed for a.mp4: boom");
    }

    #[test]
    fn timeout_message_is_distinct() {
        let err = Error::Timeout {
            stage: "Re-encode".into(),
            file: "clip.mp4".into(),
            after: Duration::from_secs(3600),
        };
        assert!(err.to_string().contains("timed out"));
        assert!(!err.to_string().contains("failed"));
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
    }
}
