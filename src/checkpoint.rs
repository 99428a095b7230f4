//! Durable run checkpoint
//!
//! Two files make up the checkpoint:
//!
//! ```text
//! sequence           <- decimal feed sequence the event log is complete through
//! last_versions.csv  <- `name,version` per line, highest version processed per package
//! ```
//!
//! Both are read once when a run starts and rewritten once when it finishes.
//! A run that dies in between leaves the previous checkpoint untouched.
//!
//! A third file, `pending_rotation`, exists only while a finished log is
//! waiting to be rotated. See [`PendingRotation`].

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use semver::Version;
use tracing::{debug, info, warn};

use crate::config::DataPaths;
use crate::error::CheckpointError;
use crate::version::semver::clean_version;

pub struct CheckpointStore {
    sequence_path: PathBuf,
    last_versions_path: PathBuf,
    sequence: u64,
    last_versions: BTreeMap<String, Version>,
}

impl CheckpointStore {
    /// Load the checkpoint; missing files mean a first run
    pub fn load(paths: &DataPaths) -> Result<Self, CheckpointError> {
        let sequence_path = paths.sequence_path();
        let last_versions_path = paths.last_versions_path();

        let sequence = read_sequence(&sequence_path)?;
        let last_versions = read_last_versions(&last_versions_path)?;

        info!(
            "Loaded checkpoint: sequence {}, {} known packages",
            sequence,
            last_versions.len()
        );

        Ok(Self {
            sequence_path,
            last_versions_path,
            sequence,
            last_versions,
        })
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn last_version(&self, package: &str) -> Option<&Version> {
        self.last_versions.get(package)
    }

    pub fn tracked_packages(&self) -> usize {
        self.last_versions.len()
    }

    /// Record a processed version; versions never move backwards
    pub fn record_version(&mut self, package: &str, version: Version) {
        match self.last_versions.get_mut(package) {
            Some(current) if *current >= version => {}
            Some(current) => *current = version,
            None => {
                self.last_versions.insert(package.to_string(), version);
            }
        }
    }

    /// Move the sequence cursor forward; earlier sequences are ignored
    pub fn advance_sequence(&mut self, sequence: u64) {
        self.sequence = self.sequence.max(sequence);
    }

    /// Rewrite both checkpoint files atomically
    ///
    /// The sequence file is written last so a checkpoint never claims more
    /// progress than the last-versions file reflects.
    pub fn persist(&self) -> Result<(), CheckpointError> {
        write_atomic(&self.last_versions_path, |out| {
            for (package, version) in &self.last_versions {
                writeln!(out, "{},{}", package, version)?;
            }
            Ok(())
        })?;

        write_atomic(&self.sequence_path, |out| write!(out, "{}", self.sequence))?;

        info!(
            "Persisted checkpoint: sequence {}, {} known packages",
            self.sequence,
            self.last_versions.len()
        );
        Ok(())
    }
}

/// Marks an active log whose events the saved checkpoint already covers
///
/// Written before the checkpoint is persisted and removed once the log is
/// rotated. The file holds `<log number>,<sequence>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRotation {
    /// Number of the active log waiting for rotation
    pub log_number: u64,
    /// Checkpoint sequence the log is complete through
    pub sequence: u64,
}

impl PendingRotation {
    pub fn write(&self, paths: &DataPaths) -> Result<(), CheckpointError> {
        write_atomic(&paths.pending_rotation_path(), |out| {
            write!(out, "{},{}", self.log_number, self.sequence)
        })
    }

    /// Read the marker; a malformed one is reported and treated as absent
    pub fn read(paths: &DataPaths) -> Result<Option<Self>, CheckpointError> {
        let path = paths.pending_rotation_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CheckpointError::Io { path, source }),
        };

        let parsed = content.trim().split_once(',').and_then(|(number, sequence)| {
            Some(Self {
                log_number: number.parse().ok()?,
                sequence: sequence.parse().ok()?,
            })
        });
        if parsed.is_none() {
            warn!("Ignoring malformed rotation marker {:?}: {:?}", path, content);
        }
        Ok(parsed)
    }

    pub fn clear(paths: &DataPaths) -> Result<(), CheckpointError> {
        let path = paths.pending_rotation_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CheckpointError::Io { path, source }),
        }
    }
}

fn read_sequence(path: &Path) -> Result<u64, CheckpointError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No sequence file at {:?}, starting from 0", path);
            return Ok(0);
        }
        Err(source) => {
            return Err(CheckpointError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let value = content.trim();
    if value.is_empty() {
        return Ok(0);
    }

    value.parse().map_err(|_| CheckpointError::CorruptSequence {
        path: path.to_path_buf(),
        value: value.to_string(),
    })
}

fn read_last_versions(path: &Path) -> Result<BTreeMap<String, Version>, CheckpointError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No last versions file at {:?}", path);
            return Ok(BTreeMap::new());
        }
        Err(source) => {
            return Err(CheckpointError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut last_versions = BTreeMap::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let parsed = line
            .split_once(',')
            .filter(|(name, _)| !name.is_empty())
            .and_then(|(name, version)| clean_version(version).map(|v| (name, v)));

        match parsed {
            Some((name, version)) => {
                last_versions.insert(name.to_string(), version);
            }
            None => warn!(
                "Skipping malformed line {} in {:?}: {:?}",
                index + 1,
                path,
                line
            ),
        }
    }

    Ok(last_versions)
}

/// Write to a temporary sibling, fsync, then rename over `path`
fn write_atomic<F>(path: &Path, write: F) -> Result<(), CheckpointError>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let temp_path = path.with_extension("tmp");
    let io_error = |source: io::Error| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    };

    let result = (|| {
        let mut out = BufWriter::new(File::create(&temp_path)?);
        write(&mut out)?;
        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(io_error(e));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        io_error(e)
    })
}
