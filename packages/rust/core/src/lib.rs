//! Core ingestion logic for jobdigest.
//!
//! This crate ties together fetching, extraction, date windowing,
//! de-duplication and message batching into per-room runs, and runs many of
//! them concurrently.
//!
//! - [`window`]: rolling window over year-less `"Mon D"` dates
//! - [`dedup`]: per-room sent records
//! - [`batcher`]: header-prefixed message pages
//! - [`pipeline`]: one source, one room, end to end
//! - [`harvest`]: every source for every room, bounded and key-locked

pub mod batcher;
pub mod dedup;
pub mod harvest;
pub mod pipeline;
pub mod window;

pub use batcher::MessageBatcher;
pub use dedup::{DedupStore, Reconciliation, WriteStatus};
pub use harvest::{HarvestOutcome, Harvester, KeyLocks};
pub use pipeline::{
    IngestReport, IngestionPipeline, PipelineSettings, ProgressReporter, SilentProgress, Stage,
};
pub use window::{DateWindowFilter, WindowResult, resolve_posted_date};
