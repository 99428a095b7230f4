//! Dependency event log
//!
//! # Modules
//!
//! - [`record`]: Six-column record format
//! - [`writer`]: Appends records for a version diff to the active log
//! - [`shards`]: Active log and shard naming, discovery, last event date
//! - [`rotate`]: Sorting and splitting a finished log into shards

pub mod record;
pub mod rotate;
pub mod shards;
pub mod writer;
