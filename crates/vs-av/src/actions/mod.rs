//! ffmpeg invocations behind the pipeline stages: metadata strip, re-encode,
//! silence padding, pixel overlay, and audio re-attach.
//!
//! Each action reads one file and writes another. A non-zero ffmpeg exit
//! surfaces as [`vs_core::Error::Tool`] carrying the tail of stderr; an
//! expired [`Budget`] as [`vs_core::Error::ToolTimeout`].

mod overlay;
mod reencode;
mod remux;
mod silence;
mod strip;

use std::time::Duration;

use crate::command::{ToolCommand, DEFAULT_KILL_GRACE};

pub use overlay::{add_overlay, overlay_args, random_position, write_overlay_png, OVERLAY_POSITIONS};
pub use reencode::{crf_to_bitrate_kbps, parse_progress_line, re_encode, re_encode_args, ReEncodeParams};
pub use remux::reattach_audio;
pub use silence::{add_silence, silence_args, AudioFormat, SilencePlacement};
pub use strip::{strip_metadata, strip_metadata_args};

/// Wall-clock budget for one ffmpeg invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub timeout: Duration,
    /// Time between SIGTERM and kill once the timeout fires.
    pub kill_grace: Duration,
}

impl Budget {
    pub fn new(timeout: Duration, kill_grace: Duration) -> Self {
        Self {
            timeout,
            kill_grace,
        }
    }

    pub(crate) fn apply(&self, cmd: &mut ToolCommand) {
        cmd.timeout(self.timeout).kill_grace(self.kill_grace);
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::new(Duration::from_secs(300), DEFAULT_KILL_GRACE)
    }
}

pub(crate) fn path_arg(path: &std::path::Path) -> String {
    path.to_string_lossy().to_string()
}
