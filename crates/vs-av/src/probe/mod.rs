//! Media probing backed by `ffprobe`.
//!
//! [`ffprobe`] parses stream and container facts; [`color`] turns them into
//! the color tags every encode must carry.

pub mod color;
pub mod ffprobe;

pub use self::color::{ColorProfileProbe, ColorProperties};
pub use self::ffprobe::{
    parse_frame_rate, parse_probe_output, probe_json, probe_media, AudioStream, MediaProbe,
    VideoStream,
};
