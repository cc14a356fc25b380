//! # vs-verify
//!
//! Structural comparison of an original video with its processed output.
//!
//! A [`VerificationReport`] records content hashes, per-file [`VideoStats`]
//! (geometry, timing, first and last frame hashes), ffprobe metadata, and six
//! change flags. The original is either named explicitly, taken from a
//! [`RunReport`](vs_pipeline::RunReport), or located heuristically by
//! [`FingerprintVerifier::auto_verify_last_processed`], in which case the
//! report carries a warning.
//!
//! This is not a perceptual similarity score.

pub mod hash;
pub mod locate;
pub mod report;
pub mod stats;
pub mod verifier;

pub use hash::file_hash;
pub use locate::{locate_last_processed, LocatedPair};
pub use report::{ChangeFlags, MatchKind, VerificationReport};
pub use stats::{metadata, video_stats, VideoStats};
pub use verifier::FingerprintVerifier;
