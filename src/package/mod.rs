//! Package document layer
//!
//! Turns raw registry documents into ordered version histories and the
//! dependency changes between consecutive versions.
//!
//! # Modules
//!
//! - [`document`]: Feed document model and package detection
//! - [`name`]: Package name validation
//! - [`history`]: Release-ordered, resumable version selection
//! - [`diff`]: Dependency set differences between two versions

pub mod diff;
pub mod document;
pub mod history;
pub mod name;
