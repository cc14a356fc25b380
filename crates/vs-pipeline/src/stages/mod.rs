//! Built-in pipeline stages.
//!
//! Each stage wraps the corresponding [`vs_av::actions`] invocation (or, for
//! noise, the frame pipes plus [`vs_noise`]) behind the [`Stage`](crate::stage::Stage)
//! trait.

mod noise;
mod overlay;
mod reencode;
mod silence;
mod strip;

pub use noise::NoiseStage;
pub use overlay::OverlayStage;
pub use reencode::ReEncodeStage;
pub use silence::SilenceStage;
pub use strip::StripMetadataStage;
