//! Per-run processing state
//!
//! [`RunSession`] owns everything a run folds documents into: the checkpoint
//! being advanced, the active log writer and the `lastProcessedDate` bound.
//! Documents are applied strictly one at a time.

use std::io::{self, Write};

use tracing::debug;

use crate::checkpoint::CheckpointStore;
use crate::events::writer::EventWriter;
use crate::feed::ChangeEvent;
use crate::package::diff::diff;
use crate::package::document::PackageDocument;
use crate::package::history::{baseline_dependencies, select_versions};

/// Counters reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Change events acknowledged
    pub changes: u64,
    /// Changes that were not a live package document
    pub skipped: u64,
    /// Versions diffed
    pub versions: u64,
    /// Records appended to the active log
    pub events: u64,
}

pub struct RunSession<W: Write> {
    store: CheckpointStore,
    writer: EventWriter<W>,
    last_processed_date: Option<String>,
    stats: RunStats,
}

impl<W: Write> RunSession<W> {
    pub fn new(
        store: CheckpointStore,
        writer: EventWriter<W>,
        last_processed_date: Option<String>,
    ) -> Self {
        Self {
            store,
            writer,
            last_processed_date,
            stats: RunStats::default(),
        }
    }

    /// Apply one change and acknowledge its sequence, returning the records written
    pub fn process_change(&mut self, change: ChangeEvent) -> io::Result<usize> {
        let written = match change.doc {
            Some(doc) if !change.deleted => self.process_document(doc)?,
            _ => {
                debug!(
                    "Change {} ({}) is a deletion or carries no document",
                    change.seq, change.id
                );
                self.stats.skipped += 1;
                0
            }
        };

        self.store.advance_sequence(change.seq);
        self.stats.changes += 1;
        Ok(written)
    }

    fn process_document(&mut self, doc: serde_json::Value) -> io::Result<usize> {
        let Some(package) = PackageDocument::from_value(doc).filter(PackageDocument::is_package)
        else {
            self.stats.skipped += 1;
            return Ok(0);
        };
        let Some(name) = package.name.as_deref() else {
            self.stats.skipped += 1;
            return Ok(0);
        };

        let last_known = self.store.last_version(name);
        let selected = select_versions(&package, last_known, self.last_processed_date.as_deref());
        if selected.is_empty() {
            debug!("{}: no new versions", name);
            return Ok(0);
        }

        let mut previous = baseline_dependencies(&package, last_known);
        let mut written = 0;
        for version in &selected {
            let changes = diff(&version.dependencies, previous.as_ref());
            written += self
                .writer
                .write(name, &version.version, &version.date, &changes)?;
            previous = Some(version.dependencies.clone());
        }

        let last = &selected[selected.len() - 1].version;
        debug!(
            "{}: {} new versions up to {}, {} events",
            name,
            selected.len(),
            last,
            written
        );
        self.store.record_version(name, last.clone());

        self.stats.versions += selected.len() as u64;
        self.stats.events += written as u64;
        Ok(written)
    }

    pub fn sequence(&self) -> u64 {
        self.store.sequence()
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Split back into the checkpoint and the writer for finalizing
    pub fn into_parts(self) -> (CheckpointStore, EventWriter<W>, RunStats) {
        (self.store, self.writer, self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataPaths;
    use semver::Version;
    use serde_json::json;
    use tempfile::TempDir;

    fn session(dir: &TempDir, last_processed_date: Option<&str>) -> RunSession<Vec<u8>> {
        let store = CheckpointStore::load(&DataPaths::new(dir.path())).unwrap();
        RunSession::new(
            store,
            EventWriter::new(Vec::new()),
            last_processed_date.map(str::to_string),
        )
    }

    fn change(seq: u64, doc: Option<serde_json::Value>) -> ChangeEvent {
        ChangeEvent {
            seq,
            id: "x".to_string(),
            deleted: false,
            doc,
        }
    }

    fn output(session: RunSession<Vec<u8>>) -> (CheckpointStore, String) {
        let (store, writer, _) = session.into_parts();
        (store, String::from_utf8(writer.finish().unwrap()).unwrap())
    }

    fn package_x() -> serde_json::Value {
        json!({
            "_id": "x",
            "name": "x",
            "time": {
                "created": "2019-12-31T00:00:00Z",
                "1.0.0": "2020-01-01T00:00:00Z",
                "1.1.0": "2020-02-01T00:00:00Z"
            },
            "versions": {
                "1.0.0": { "dependencies": { "a": "^1.0.0" } },
                "1.1.0": { "dependencies": { "a": "^1.0.0", "b": "^2.0.0" } }
            }
        })
    }

    #[test]
    fn process_change_writes_one_record_per_dependency_change() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir, None);

        let written = session.process_change(change(1, Some(package_x()))).unwrap();

        assert_eq!(written, 2);
        assert_eq!(
            session.stats(),
            RunStats {
                changes: 1,
                skipped: 0,
                versions: 2,
                events: 2,
            }
        );
        let (store, log) = output(session);
        assert_eq!(
            log,
            "x,1.0.0,2020-01-01T00:00:00Z,add,prod,a\n\
             x,1.1.0,2020-02-01T00:00:00Z,add,prod,b\n"
        );
        assert_eq!(store.last_version("x"), Some(&Version::new(1, 1, 0)));
        assert_eq!(store.sequence(), 1);
    }

    #[test]
    fn process_change_is_idempotent_for_a_redelivered_document() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir, None);

        session.process_change(change(1, Some(package_x()))).unwrap();
        let written = session.process_change(change(2, Some(package_x()))).unwrap();

        assert_eq!(written, 0);
        assert_eq!(session.sequence(), 2);
    }

    #[test]
    fn process_change_diffs_new_versions_against_the_cached_version() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("last_versions.csv"), "x,1.0.0\n").unwrap();
        let mut session = session(&dir, None);

        session.process_change(change(9, Some(package_x()))).unwrap();

        let (_, log) = output(session);
        assert_eq!(log, "x,1.1.0,2020-02-01T00:00:00Z,add,prod,b\n");
    }

    #[test]
    fn process_change_reports_removed_dependencies() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir, None);
        let doc = json!({
            "_id": "y",
            "name": "y",
            "time": {
                "1.0.0": "2020-01-01T00:00:00Z",
                "2.0.0": "2020-02-01T00:00:00Z"
            },
            "versions": {
                "1.0.0": { "devDependencies": { "jest": "^29.0.0" } },
                "2.0.0": { "devDependencies": { "vitest": "^1.0.0" } }
            }
        });

        session.process_change(change(1, Some(doc))).unwrap();

        let (_, log) = output(session);
        assert_eq!(
            log,
            "y,1.0.0,2020-01-01T00:00:00Z,add,dev,jest\n\
             y,2.0.0,2020-02-01T00:00:00Z,add,dev,vitest\n\
             y,2.0.0,2020-02-01T00:00:00Z,delete,dev,jest\n"
        );
    }

    #[test]
    fn process_change_skips_non_package_documents_but_acknowledges_them() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir, None);

        session
            .process_change(change(3, Some(json!({ "_id": "_design/app", "views": {} }))))
            .unwrap();
        session
            .process_change(change(4, Some(json!({ "_id": "gone", "_deleted": true }))))
            .unwrap();
        session.process_change(change(5, None)).unwrap();
        session
            .process_change(change(6, Some(json!(["not", "an", "object"]))))
            .unwrap();

        assert_eq!(session.sequence(), 6);
        assert_eq!(session.stats().changes, 4);
        assert_eq!(session.stats().skipped, 4);
        let (store, log) = output(session);
        assert!(log.is_empty());
        assert_eq!(store.tracked_packages(), 0);
    }

    #[test]
    fn process_change_honors_last_processed_date() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir, Some("2020-01-15T00:00:00Z"));

        session.process_change(change(1, Some(package_x()))).unwrap();

        let (store, log) = output(session);
        assert_eq!(log, "x,1.1.0,2020-02-01T00:00:00Z,add,prod,a\nx,1.1.0,2020-02-01T00:00:00Z,add,prod,b\n");
        assert_eq!(store.last_version("x"), Some(&Version::new(1, 1, 0)));
    }

    #[test]
    fn process_change_keeps_valid_versions_next_to_unreadable_ones() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir, None);
        let doc = json!({
            "_id": "x",
            "name": "x",
            "time": {
                "1.0.0": "2020-01-01T00:00:00Z",
                "1.0.1": "2020-01-02T00:00:00Z"
            },
            "versions": {
                "1.0.0": { "dependencies": { "a": "^1.0.0" } },
                "1.0.1": "garbage"
            }
        });

        let written = session.process_change(change(1, Some(doc))).unwrap();

        assert_eq!(written, 1);
        assert_eq!(session.stats().skipped, 0);
        let (store, log) = output(session);
        assert_eq!(log, "x,1.0.0,2020-01-01T00:00:00Z,add,prod,a\n");
        assert_eq!(store.last_version("x"), Some(&Version::new(1, 0, 0)));
    }

    #[test]
    fn process_change_skips_deleted_changes_without_reading_the_document() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir, None);
        let mut deleted = change(7, Some(package_x()));
        deleted.deleted = true;

        let written = session.process_change(deleted).unwrap();

        assert_eq!(written, 0);
        assert_eq!(session.stats().skipped, 1);
        assert_eq!(session.sequence(), 7);
    }
}
