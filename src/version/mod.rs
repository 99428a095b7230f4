//! Version handling for registry documents
//!
//! Registry documents carry raw version keys and raw dependency range
//! specifiers. This module turns both into something the collector can trust.
//!
//! # Modules
//!
//! - [`semver`]: Cleans raw version strings into comparable semantic versions
//! - [`range`]: Validates npm dependency range specifiers

pub mod range;
pub mod semver;
