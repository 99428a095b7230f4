//! Ordered version history of a package document
//!
//! Selects which versions of a document still need to be diffed, in release
//! order, given how far earlier runs already got for the same package.

use semver::Version;

use crate::package::diff::DependencySet;
use crate::package::document::PackageDocument;
use crate::version::semver::clean_version;

/// A version that survived validation, with its release time and dependencies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedVersion {
    pub version: Version,
    /// ISO-8601 release timestamp, as recorded in the document
    pub date: String,
    pub dependencies: DependencySet,
}

/// Select the versions of `doc` to emit events for.
///
/// Versions without a release time or without a parseable version are dropped.
/// The rest are walked in release order (ties broken by version) against a
/// cursor starting at `last_known` (`0.0.0` when the package was never seen):
/// a version at or below the cursor was already processed, and a newer version
/// released before `last_processed_date` was already committed by an earlier
/// run. Every kept version advances the cursor, so the result is strictly
/// increasing in version order and its last element is the new cursor.
pub fn select_versions(
    doc: &PackageDocument,
    last_known: Option<&Version>,
    last_processed_date: Option<&str>,
) -> Vec<ProcessedVersion> {
    let Some(versions) = doc.versions.as_ref() else {
        return Vec::new();
    };

    let mut candidates: Vec<_> = versions
        .iter()
        .filter_map(|(raw, record)| {
            let date = doc.release_time(raw)?;
            let version = clean_version(raw)?;
            Some((date, version, record))
        })
        .collect();

    // ISO-8601 timestamps of one format order correctly as strings
    candidates.sort_by(|(a_date, a_version, _), (b_date, b_version, _)| {
        a_date.cmp(b_date).then_with(|| a_version.cmp(b_version))
    });

    let initial = Version::new(0, 0, 0);
    let mut cursor = last_known.unwrap_or(&initial).clone();
    let mut selected = Vec::new();

    for (date, version, record) in candidates {
        if version <= cursor {
            continue;
        }

        if last_processed_date.is_some_and(|last| date < last) {
            continue;
        }

        cursor = version.clone();
        selected.push(ProcessedVersion {
            version,
            date: date.to_string(),
            dependencies: DependencySet::from_record(record),
        });
    }

    selected
}

/// Dependencies of the version the cursor points at, if the document still has it
///
/// A package seen by an earlier run diffs its first new version against this
/// set instead of an empty one, so dependencies that were already added are
/// not reported again.
pub fn baseline_dependencies(
    doc: &PackageDocument,
    last_known: Option<&Version>,
) -> Option<DependencySet> {
    let last_known = last_known?;
    doc.versions
        .as_ref()?
        .iter()
        .find(|(raw, _)| clean_version(raw).as_ref() == Some(last_known))
        .map(|(_, record)| DependencySet::from_record(record))
}
