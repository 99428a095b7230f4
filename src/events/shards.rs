//! Event log file naming and discovery
//!
//! ```text
//! events/
//!   sorted_dependency_events_0.csv   <- rotated shards, date ordered
//!   sorted_dependency_events_1.csv
//!   dependency_events_2.csv          <- active log of the current run
//! ```

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::events::record::EventRecord;

pub const ACTIVE_PREFIX: &str = "dependency_events_";
pub const SHARD_PREFIX: &str = "sorted_dependency_events_";
pub const SUFFIX: &str = ".csv";

/// Bytes read per step when scanning a shard backwards for its last line
const TAIL_CHUNK: u64 = 8 * 1024;

fn number_with_prefix(file_name: &str, prefix: &str) -> Option<u64> {
    file_name
        .strip_prefix(prefix)?
        .strip_suffix(SUFFIX)?
        .parse()
        .ok()
}

/// Number of a rotated shard file name
pub fn shard_number(file_name: &str) -> Option<u64> {
    number_with_prefix(file_name, SHARD_PREFIX)
}

/// Number of an active log path
pub fn active_log_number(path: &Path) -> Option<u64> {
    number_with_prefix(path.file_name()?.to_str()?, ACTIVE_PREFIX)
}

pub fn shard_path(events_dir: &Path, number: u64) -> PathBuf {
    events_dir.join(format!("{SHARD_PREFIX}{number}{SUFFIX}"))
}

pub fn active_log_path(events_dir: &Path, number: u64) -> PathBuf {
    events_dir.join(format!("{ACTIVE_PREFIX}{number}{SUFFIX}"))
}

/// Highest shard number present in `events_dir`
pub fn latest_shard(events_dir: &Path) -> io::Result<Option<u64>> {
    let mut latest = None;
    for entry in std::fs::read_dir(events_dir)? {
        let entry = entry?;
        if let Some(number) = entry.file_name().to_str().and_then(shard_number) {
            latest = latest.max(Some(number));
        }
    }
    Ok(latest)
}

/// Number the next active log gets: one past the latest shard, or 0
pub fn next_log_number(events_dir: &Path) -> io::Result<u64> {
    Ok(latest_shard(events_dir)?.map_or(0, |n| n + 1))
}

/// Date of the last record of the latest shard, if any shard has one
pub fn last_event_date(events_dir: &Path) -> io::Result<Option<String>> {
    let Some(number) = latest_shard(events_dir)? else {
        return Ok(None);
    };

    let last_line = read_last_line(&shard_path(events_dir, number))?;
    Ok(last_line
        .as_deref()
        .and_then(EventRecord::parse)
        .map(|record| record.date))
}

/// Last non-empty line of a file, read backwards in chunks
fn read_last_line(path: &Path) -> io::Result<Option<String>> {
    let mut file = File::open(path)?;
    let mut end = file.metadata()?.len();
    let mut tail: Vec<u8> = Vec::new();

    while end > 0 {
        let start = end.saturating_sub(TAIL_CHUNK);
        let mut chunk = vec![0; (end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&tail);
        tail = chunk;
        end = start;

        let content = trim_line_endings(&tail);
        if let Some(pos) = content.iter().rposition(|&b| b == b'\n') {
            return Ok(Some(String::from_utf8_lossy(&content[pos + 1..]).into_owned()));
        }
    }

    let content = trim_line_endings(&tail);
    Ok((!content.is_empty()).then(|| String::from_utf8_lossy(content).into_owned()))
}

fn trim_line_endings(bytes: &[u8]) -> &[u8] {
    let len = bytes
        .iter()
        .rposition(|&b| b != b'\n' && b != b'\r')
        .map_or(0, |pos| pos + 1);
    &bytes[..len]
}
