//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of `ffmpeg` and
//! `ffprobe`, and resolves which H.264 encoder the re-encode stage should use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use vs_core::config::ToolsConfig;

use crate::command::ToolCommand;

/// Known tool names that the registry manages.
pub const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// A single discovered tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Human-readable tool name (e.g. "ffmpeg").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of `-version` output, if available.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// H.264 encoder used by the re-encode stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoEncoder {
    /// `libx264` with CRF quality control.
    Libx264,
    /// `h264_videotoolbox`, bitrate-targeted.
    VideoToolbox,
}

impl VideoEncoder {
    pub fn codec_name(self) -> &'static str {
        match self {
            VideoEncoder::Libx264 => "libx264",
            VideoEncoder::VideoToolbox => "h264_videotoolbox",
        }
    }

    pub fn is_hardware(self) -> bool {
        !matches!(self, VideoEncoder::Libx264)
    }
}

/// Registry holding discovered tool locations.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
    hw_accel: String,
    encoder: OnceLock<VideoEncoder>,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH` (or using overrides from config).
    ///
    /// A configured path is used when it exists; otherwise [`which::which`]
    /// looks the tool up on `PATH`. Tools that are not found are omitted.
    pub fn discover(tools_config: &ToolsConfig) -> Self {
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                "ffmpeg" => tools_config.ffmpeg_path.as_deref(),
                "ffprobe" => tools_config.ffprobe_path.as_deref(),
                _ => None,
            };

            let resolved = match custom_path {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(
                        "Configured {name} path {} does not exist; searching PATH",
                        p.display()
                    );
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            if let Some(path) = resolved {
                tracing::debug!("Found {name} at {}", path.display());
                tools.insert(
                    name.to_string(),
                    ToolConfig {
                        name: name.to_string(),
                        path,
                    },
                );
            }
        }

        Self {
            tools,
            hw_accel: tools_config.hw_accel.clone(),
            encoder: OnceLock::new(),
        }
    }

    /// Build a registry from explicit paths, bypassing discovery.
    pub fn from_paths(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        let mut tools = HashMap::new();
        for (name, path) in [("ffmpeg", ffmpeg.into()), ("ffprobe", ffprobe.into())] {
            tools.insert(
                name.to_string(),
                ToolConfig {
                    name: name.to_string(),
                    path,
                },
            );
        }
        Self {
            tools,
            hw_accel: "auto".into(),
            encoder: OnceLock::new(),
        }
    }

    /// A registry with no tools at all.
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
            hw_accel: "auto".into(),
            encoder: OnceLock::new(),
        }
    }

    /// Override the hardware acceleration preference (`auto`, `none`,
    /// `videotoolbox`).
    pub fn with_hw_accel(mut self, hw_accel: impl Into<String>) -> Self {
        self.hw_accel = hw_accel.into();
        self.encoder = OnceLock::new();
        self
    }

    /// Return the [`ToolConfig`] for the given tool, or an
    /// [`vs_core::Error::Tool`] if the tool was not found during discovery.
    pub fn require(&self, name: &str) -> vs_core::Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| {
            vs_core::Error::tool(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// Fail with a validation error unless every known tool was found.
    pub fn ensure_available(&self) -> vs_core::Result<()> {
        let missing: Vec<&str> = KNOWN_TOOLS
            .iter()
            .copied()
            .filter(|name| !self.tools.contains_key(*name))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(vs_core::Error::Validation(format!(
                "required tools not found: {}",
                missing.join(", ")
            )))
        }
    }

    /// Start a command for the named tool.
    pub fn command(&self, name: &str) -> vs_core::Result<ToolCommand> {
        Ok(ToolCommand::new(self.require(name)?.path.clone()))
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(cfg) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(&cfg.path),
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }

    /// The encoder the re-encode stage should use.
    ///
    /// Resolved once per registry. With `hw_accel = "auto"`, ffmpeg's encoder
    /// list is consulted and VideoToolbox is used when present.
    pub async fn video_encoder(&self) -> VideoEncoder {
        if let Some(encoder) = self.encoder.get() {
            return *encoder;
        }

        let resolved = match self.hw_accel.as_str() {
            "none" => VideoEncoder::Libx264,
            "videotoolbox" => VideoEncoder::VideoToolbox,
            _ => self.detect_hw_encoder().await,
        };
        tracing::info!("Using video encoder {}", resolved.codec_name());
        *self.encoder.get_or_init(|| resolved)
    }

    async fn detect_hw_encoder(&self) -> VideoEncoder {
        let Ok(mut cmd) = self.command("ffmpeg") else {
            return VideoEncoder::Libx264;
        };
        cmd.args(["-hide_banner", "-encoders"])
            .timeout(std::time::Duration::from_secs(10));

        match cmd.execute().await {
            Ok(output) if lists_encoder(&output.stdout, "h264_videotoolbox") => {
                VideoEncoder::VideoToolbox
            }
            Ok(_) => VideoEncoder::Libx264,
            Err(e) => {
                tracing::warn!("Could not list ffmpeg encoders ({e}); using libx264");
                VideoEncoder::Libx264
            }
        }
    }
}

/// Whether `ffmpeg -encoders` output lists the named encoder.
fn lists_encoder(listing: &str, encoder: &str) -> bool {
    listing
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(encoder))
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}

/// Whether a usable ffmpeg/ffprobe pair is on `PATH`.
pub fn ffmpeg_available() -> bool {
    KNOWN_TOOLS.iter().all(|name| which::which(name).is_ok())
}
