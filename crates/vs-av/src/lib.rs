//! # vs-av
//!
//! External tool plumbing for the vidshift pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find ffmpeg and ffprobe and
//!   pick the H.264 encoder.
//! - **Command execution** ([`ToolCommand`]) -- async builder with a timeout
//!   that terminates, then kills, an overrunning process.
//! - **Probing** ([`probe`]) -- ffprobe parsing and the cached
//!   [`ColorProfileProbe`].
//! - **Frame pipes** ([`frames`]) -- raw RGB frames out of a decoder and into
//!   an encoder.
//! - **Actions** ([`actions`]) -- the ffmpeg invocations behind each stage.
//! - **Workspace** ([`Workspace`]) -- per-run scratch artifacts, purged on
//!   drop.

pub mod actions;
pub mod command;
pub mod frames;
pub mod probe;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use actions::Budget;
pub use command::{ToolCommand, ToolOutput};
pub use frames::{DecodeWindow, EncodeSettings, FrameGeometry, FrameReader, FrameWriter};
pub use probe::{ColorProfileProbe, ColorProperties, MediaProbe};
pub use tools::{ffmpeg_available, ToolConfig, ToolInfo, ToolRegistry, VideoEncoder};
pub use workspace::Workspace;
