//! Collection run
//!
//! # Modules
//!
//! - [`consumer`]: State machine driving one run from checkpoint to rotated shards
//! - [`session`]: Folds change events into the event log and checkpoint
//! - [`progress`]: Percent and ETA reporting over the sequence span

pub mod consumer;
pub mod progress;
pub mod session;

pub use consumer::{FeedConsumer, RunState, RunSummary};
pub use session::RunStats;
