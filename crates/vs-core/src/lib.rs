//! vs-core: shared error type, configuration, processing options, and the
//! on-disk storage layout.
//!
//! This crate is the foundational dependency for all other vs-* crates.

pub mod config;
pub mod error;
pub mod layout;
pub mod options;
pub mod paths;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use layout::{StorageLayout, SweepStats};
pub use options::ProcessingOptions;
