//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries all
//! sub-configs. Every section defaults sensibly so an empty file is valid.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::options::ProcessingOptions;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub tools: ToolsConfig,
    pub processing: ProcessingOptions,
    pub limits: LimitsConfig,
    pub hygiene: HygieneConfig,
    pub intake: IntakeConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(e) = self.processing.validate() {
            warnings.push(format!("processing: {e}"));
        }

        let valid = ["auto", "none", "videotoolbox"];
        if !valid.contains(&self.tools.hw_accel.as_str()) {
            warnings.push(format!(
                "tools.hw_accel '{}' is not a recognized method (valid: {})",
                self.tools.hw_accel,
                valid.join(", ")
            ));
        }

        if self.limits.stage_timeout_secs == 0 {
            warnings.push("limits.stage_timeout_secs is 0; every stage will time out".into());
        }
        if self.limits.encode_timeout_secs == 0 {
            warnings.push("limits.encode_timeout_secs is 0; every encode will time out".into());
        }
        if self.limits.noise_batch_size == 0 {
            warnings.push("limits.noise_batch_size is 0; a batch size of 1 will be used".into());
        }
        if self.limits.max_workers == Some(0) {
            warnings.push("limits.max_workers is 0; one worker will be used".into());
        }

        if self.hygiene.verification_retention_mins > self.hygiene.scratch_retention_mins {
            warnings.push(
                "hygiene.verification_retention_mins exceeds scratch_retention_mins".into(),
            );
        }

        if self.intake.max_file_size_mb == 0 {
            warnings.push("intake.max_file_size_mb is 0; every upload will be rejected".into());
        }
        if self.intake.extensions.is_empty() {
            warnings.push("intake.extensions is empty; every upload will be rejected".into());
        }

        if self.paths.output_dir == self.paths.temp_dir {
            warnings.push(
                "paths.output_dir and paths.temp_dir are the same; stale sweeps will delete outputs"
                    .into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// The three working directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Staging area for inputs handed to the processor.
    pub input_dir: PathBuf,
    /// Final artifacts.
    pub output_dir: PathBuf,
    /// Scratch space for per-stage artifacts and verification copies.
    pub temp_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            temp_dir: PathBuf::from("temp"),
        }
    }
}

/// Paths to external CLI tools and encoder selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// `auto` probes ffmpeg's encoder list, `none` forces software encoding,
    /// `videotoolbox` forces the macOS hardware encoder.
    pub hw_accel: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            hw_accel: "auto".into(),
        }
    }
}

/// Timeouts and resource ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Budget for stream-copy and filter invocations.
    pub stage_timeout_secs: u64,
    /// Budget for full re-encodes (re-encode stage, noise encode).
    pub encode_timeout_secs: u64,
    /// How long a terminated encoder gets to exit before it is killed.
    pub kill_grace_secs: u64,
    /// Ceiling for frames held in memory by the noise stage.
    pub memory_ceiling_mb: u64,
    /// Worker threads for frame processing; `None` means `min(8, cpus)`.
    pub max_workers: Option<usize>,
    /// Frames per noise batch.
    pub noise_batch_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: 300,
            encode_timeout_secs: 3600,
            kill_grace_secs: 5,
            memory_ceiling_mb: 1536,
            max_workers: None,
            noise_batch_size: 30,
        }
    }
}

impl LimitsConfig {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    pub fn encode_timeout(&self) -> Duration {
        Duration::from_secs(self.encode_timeout_secs)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_secs)
    }

    pub fn memory_ceiling_bytes(&self) -> u64 {
        self.memory_ceiling_mb.saturating_mul(1024 * 1024)
    }
}

/// Retention windows for the opportunistic stale-file sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HygieneConfig {
    pub sweep_on_startup: bool,
    pub verification_retention_mins: u64,
    pub scratch_retention_mins: u64,
}

impl Default for HygieneConfig {
    fn default() -> Self {
        Self {
            sweep_on_startup: true,
            verification_retention_mins: 60,
            scratch_retention_mins: 120,
        }
    }
}

impl HygieneConfig {
    pub fn verification_retention(&self) -> Duration {
        Duration::from_secs(self.verification_retention_mins * 60)
    }

    pub fn scratch_retention(&self) -> Duration {
        Duration::from_secs(self.scratch_retention_mins * 60)
    }
}

/// Input acceptance rules applied before a file enters the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub max_file_size_mb: u64,
    /// Lower-case extensions without the dot.
    pub extensions: Vec<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 200,
            extensions: crate::paths::VIDEO_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl IntakeConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}
