//! Post-processing of a finished event log
//!
//! Events are appended in feed order, which is not date order. Once a run is
//! done its active log is sorted by date into a shard, and a shard that grew
//! past the size threshold is split into fixed line-count shards.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

#[cfg(test)]
use mockall::automock;
use tracing::{debug, info};

use crate::config::RotationConfig;
use crate::error::RotateError;
use crate::events::record::date_field;
use crate::events::shards::{active_log_number, shard_path};

/// Turns a finished active log into date-ordered shards
#[cfg_attr(test, automock)]
pub trait LogRotator: Send + Sync {
    /// Sort `active` by date into its shard, delete `active`, and split the
    /// shard when it is too large. Returns the resulting shards in order.
    fn rotate(&self, active: &Path) -> Result<Vec<PathBuf>, RotateError>;
}

/// Rotator that sorts and splits without external tools
///
/// Sorting is a stable external merge sort: chunks of `sort_chunk_lines`
/// records are sorted in memory and spilled to run files, which are then
/// k-way merged. Records with equal dates keep their log order.
pub struct InProcessRotator {
    size_threshold: u64,
    shard_lines: usize,
    sort_chunk_lines: usize,
}

impl InProcessRotator {
    pub fn new(config: &RotationConfig) -> Self {
        Self {
            size_threshold: config.size_threshold_bytes,
            shard_lines: config.shard_lines.max(1),
            sort_chunk_lines: config.sort_chunk_lines.max(1),
        }
    }

    fn sort_by_date(&self, input: &Path, output: &Path) -> Result<(), RotateError> {
        let reader = BufReader::new(File::open(input).map_err(io_error(input))?);
        let mut runs = Vec::new();
        let mut chunk = Vec::new();

        for line in reader.lines() {
            let line = line.map_err(io_error(input))?;
            if line.is_empty() {
                continue;
            }
            chunk.push(line);
            if chunk.len() >= self.sort_chunk_lines {
                runs.push(spill_run(&mut chunk, output, runs.len())?);
            }
        }

        let tmp = tmp_path(output);
        if runs.is_empty() {
            sort_lines(&mut chunk);
            let mut writer = SyncedWriter::create(&tmp)?;
            for line in &chunk {
                writer.write_line(line)?;
            }
            writer.finish()?;
        } else {
            if !chunk.is_empty() {
                runs.push(spill_run(&mut chunk, output, runs.len())?);
            }
            debug!("Merging {} sorted runs into {:?}", runs.len(), output);
            let merged = merge_runs(&runs, &tmp);
            for run in &runs {
                let _ = fs::remove_file(run);
            }
            merged?;
        }

        fs::rename(&tmp, output).map_err(io_error(output))
    }

    fn split(&self, sorted: &Path, events_dir: &Path, first: u64) -> Result<Vec<PathBuf>, RotateError> {
        // The first shard takes the sorted file's name, so read from a side copy
        let source = sorted.with_extension("csv.splitting");
        fs::rename(sorted, &source).map_err(io_error(sorted))?;

        let reader = BufReader::new(File::open(&source).map_err(io_error(&source))?);
        let mut lines = reader.lines().peekable();
        let mut number = first;
        let mut shards = Vec::new();

        while lines.peek().is_some() {
            let target = shard_path(events_dir, number);
            let tmp = tmp_path(&target);
            let mut writer = SyncedWriter::create(&tmp)?;
            for line in lines.by_ref().take(self.shard_lines) {
                writer.write_line(&line.map_err(io_error(&source))?)?;
            }
            writer.finish()?;
            fs::rename(&tmp, &target).map_err(io_error(&target))?;

            debug!("Wrote shard {:?}", target);
            shards.push(target);
            number += 1;
        }

        fs::remove_file(&source).map_err(io_error(&source))?;
        Ok(shards)
    }
}

impl LogRotator for InProcessRotator {
    fn rotate(&self, active: &Path) -> Result<Vec<PathBuf>, RotateError> {
        let number = active_log_number(active)
            .ok_or_else(|| RotateError::UnexpectedName(active.to_path_buf()))?;
        let events_dir = active.parent().unwrap_or_else(|| Path::new(""));
        let sorted = shard_path(events_dir, number);

        info!("Sorting events by date into {:?}", sorted);
        self.sort_by_date(active, &sorted)?;

        info!("Deleting the unsorted file {:?}", active);
        fs::remove_file(active).map_err(io_error(active))?;

        let size = fs::metadata(&sorted).map_err(io_error(&sorted))?.len();
        if size <= self.size_threshold {
            return Ok(vec![sorted]);
        }

        info!(
            "Splitting {:?} ({} bytes) into shards of {} records",
            sorted, size, self.shard_lines
        );
        self.split(&sorted, events_dir, number)
    }
}

fn sort_lines(lines: &mut [String]) {
    lines.sort_by(|a, b| date_field(a).cmp(date_field(b)));
}

fn spill_run(chunk: &mut Vec<String>, output: &Path, index: usize) -> Result<PathBuf, RotateError> {
    sort_lines(chunk);
    let path = output.with_extension(format!("csv.run{index}"));
    let mut writer = SyncedWriter::create(&path)?;
    for line in chunk.iter() {
        writer.write_line(line)?;
    }
    writer.finish()?;
    chunk.clear();
    Ok(path)
}

fn merge_runs(runs: &[PathBuf], output: &Path) -> Result<(), RotateError> {
    let mut readers = runs
        .iter()
        .map(|path| {
            File::open(path)
                .map(|file| BufReader::new(file).lines())
                .map_err(io_error(path))
        })
        .collect::<Result<Vec<Lines<BufReader<File>>>, _>>()?;

    // Ties on date pop the lowest run first, which keeps the sort stable
    let mut heap = BinaryHeap::new();
    for (run, reader) in readers.iter_mut().enumerate() {
        if let Some(line) = reader.next() {
            let line = line.map_err(io_error(&runs[run]))?;
            heap.push(Reverse((date_field(&line).to_string(), run, line)));
        }
    }

    let mut writer = SyncedWriter::create(output)?;
    while let Some(Reverse((_, run, line))) = heap.pop() {
        writer.write_line(&line)?;
        if let Some(next) = readers[run].next() {
            let next = next.map_err(io_error(&runs[run]))?;
            heap.push(Reverse((date_field(&next).to_string(), run, next)));
        }
    }
    writer.finish()
}

/// Buffered line writer that fsyncs on finish
struct SyncedWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl SyncedWriter {
    fn create(path: &Path) -> Result<Self, RotateError> {
        let file = File::create(path).map_err(io_error(path))?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }

    fn write_line(&mut self, line: &str) -> Result<(), RotateError> {
        writeln!(self.out, "{}", line).map_err(io_error(&self.path))
    }

    fn finish(self) -> Result<(), RotateError> {
        let file = self
            .out
            .into_inner()
            .map_err(|e| e.into_error())
            .map_err(io_error(&self.path))?;
        file.sync_all().map_err(io_error(&self.path))
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    path.with_extension("csv.tmp")
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> RotateError {
    let path = path.to_path_buf();
    move |source| RotateError::Io { path, source }
}
