//! Append-only event log writer

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use semver::Version;

use crate::events::record::clean_field;
use crate::package::diff::VersionDiff;

/// Writes one record per dependency change to the active log
///
/// Records are buffered; nothing is durable until [`EventWriter::finish`].
pub struct EventWriter<W: Write> {
    out: BufWriter<W>,
}

impl EventWriter<File> {
    /// Create the active log, discarding whatever a crashed run left under the same name
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> EventWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            out: BufWriter::new(inner),
        }
    }

    /// Append the records for one version's changes, returning how many were written
    pub fn write(
        &mut self,
        package: &str,
        version: &Version,
        date: &str,
        diff: &VersionDiff,
    ) -> io::Result<usize> {
        let mut count = 0;
        for (class, kind, dependency) in diff.changes() {
            writeln!(
                self.out,
                "{},{},{},{},{},{}",
                package,
                version,
                date,
                kind.as_str(),
                class.as_str(),
                clean_field(dependency)
            )?;
            count += 1;
        }

        Ok(count)
    }

    /// Flush buffered records and hand back the underlying stream
    pub fn finish(self) -> io::Result<W> {
        self.out.into_inner().map_err(|e| e.into_error())
    }
}
