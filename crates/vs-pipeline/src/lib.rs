//! # vs-pipeline
//!
//! Orchestration of the fingerprint-altering pipeline.
//!
//! This crate provides:
//!
//! - **[`Stage`]** trait -- a single pipeline step with validate / execute
//!   semantics.
//! - **[`StageContext`]** and **[`Services`]** -- per-stage and per-processor
//!   execution context (tools, color cache, worker pool, progress).
//! - **Built-in stages** ([`stages`]) -- metadata strip, noise, re-encode,
//!   silence, overlay.
//! - **[`PipelineExecutor`]** -- runs stages in order, tracks progress, and
//!   purges scratch files on failure.
//! - **[`Processor`]** -- one-call entry point producing a [`RunReport`].
//! - **[`BatchRunner`]** -- sequential processing of many inputs.
//! - **[`intake`]** -- input acceptance and upload staging.

pub mod batch;
pub mod context;
pub mod executor;
pub mod factory;
pub mod intake;
pub mod naming;
pub mod processor;
pub mod report;
pub mod stage;
pub mod stages;

// Re-export key types at the crate root.
pub use batch::{find_video_files, BatchItem, BatchProgressFn, BatchRunner, BatchSummary};
pub use context::{ProgressFn, ProgressSender, ProgressTracker, Services, StageContext};
pub use executor::{PipelineExecutor, StageReport};
pub use factory::create_stages;
pub use naming::{generate_output_name, is_generated_name};
pub use processor::Processor;
pub use report::RunReport;
pub use stage::{Stage, StageOutcome};
