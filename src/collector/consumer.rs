//! Run state machine
//!
//! ```text
//! Starting -> Streaming -> Finalizing -> Done
//!                 \
//!                  +-> Failed
//! ```
//!
//! The checkpoint is only written in `Finalizing`. A run that fails before
//! that leaves the previous checkpoint in place and its partial active log is
//! truncated by the next run, which reopens the same file name.
//!
//! A log the saved checkpoint already covers is never truncated. Finalizing
//! leaves a [`PendingRotation`] marker next to the checkpoint, and `Starting`
//! rotates the log it names when the previous run did not get that far.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::checkpoint::{CheckpointStore, PendingRotation};
use crate::collector::progress::Progress;
use crate::collector::session::{RunSession, RunStats};
use crate::config::{CollectorConfig, DataPaths};
use crate::error::{CollectError, FeedError};
use crate::events::rotate::LogRotator;
use crate::events::shards::{active_log_path, last_event_date, next_log_number};
use crate::events::writer::EventWriter;
use crate::feed::ChangeFeed;
use crate::feed::subscription::{FeedMessage, FeedOptions, FeedSubscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Starting,
    Streaming,
    Finalizing,
    Done,
    Failed,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Sequence loaded from the checkpoint
    pub start_sequence: u64,
    /// Exclusive upper bound the run streamed towards
    pub end_sequence: u64,
    /// Sequence persisted to the checkpoint
    pub sequence: u64,
    pub stats: RunStats,
    /// Shards produced by rotation; empty when the run wrote no events
    pub shards: Vec<PathBuf>,
}

/// Drives one collection run from checkpoint to rotated shards
pub struct FeedConsumer {
    feed: Arc<dyn ChangeFeed>,
    rotator: Box<dyn LogRotator>,
    paths: DataPaths,
    options: FeedOptions,
    end_sequence: Option<u64>,
    state: RunState,
}

impl FeedConsumer {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        rotator: Box<dyn LogRotator>,
        paths: DataPaths,
        config: &CollectorConfig,
    ) -> Self {
        Self {
            feed,
            rotator,
            paths,
            options: FeedOptions::from(&config.registry),
            end_sequence: config.end_sequence,
            state: RunState::Starting,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run until the end sequence is reached, then persist and rotate
    pub async fn run(&mut self) -> Result<RunSummary, CollectError> {
        let result = self.collect().await;
        if let Err(e) = &result {
            error!("Run failed in state {:?}: {}", self.state, e);
            self.transition(RunState::Failed);
        }
        result
    }

    async fn collect(&mut self) -> Result<RunSummary, CollectError> {
        self.transition(RunState::Starting);

        let events_dir = self.paths.events_dir();
        fs::create_dir_all(&events_dir).map_err(log_error(&events_dir))?;

        let store = CheckpointStore::load(&self.paths)?;
        let start_sequence = store.sequence();
        self.finish_pending_rotation(&events_dir, start_sequence)?;
        let end_sequence = match self.end_sequence {
            Some(end) => end,
            None => self.feed.update_sequence().await?,
        };

        let last_processed_date = last_event_date(&events_dir).map_err(log_error(&events_dir))?;
        let number = next_log_number(&events_dir).map_err(log_error(&events_dir))?;
        let active = active_log_path(&events_dir, number);
        if fs::metadata(&active).is_ok_and(|meta| meta.len() > 0) {
            warn!(
                "Truncating partial event log {:?} left by an interrupted run",
                active
            );
        }
        let writer = EventWriter::create(&active).map_err(log_error(&active))?;

        info!(
            "Collecting changes after sequence {} before {} into {:?} (last event date: {:?})",
            start_sequence, end_sequence, active, last_processed_date
        );
        let mut session = RunSession::new(store, writer, last_processed_date);

        self.transition(RunState::Streaming);
        if start_sequence.saturating_add(1) < end_sequence {
            self.stream(&mut session, start_sequence, end_sequence, &active)
                .await?;
        } else {
            info!(
                "Nothing to collect: sequence {} is already at end {}",
                start_sequence, end_sequence
            );
        }

        self.transition(RunState::Finalizing);
        let (store, writer, stats) = session.into_parts();
        let file = writer.finish().map_err(log_error(&active))?;
        file.sync_all().map_err(log_error(&active))?;
        drop(file);
        if stats.events > 0 {
            PendingRotation {
                log_number: number,
                sequence: store.sequence(),
            }
            .write(&self.paths)?;
        }
        store.persist()?;

        self.transition(RunState::Done);
        let shards = if stats.events == 0 {
            debug!("No events written, removing {:?}", active);
            fs::remove_file(&active).map_err(log_error(&active))?;
            Vec::new()
        } else {
            let shards = self.rotator.rotate(&active).inspect_err(|_| {
                error!(
                    "Checkpoint was saved but {:?} is not rotated; the next run rotates it first",
                    active
                )
            })?;
            PendingRotation::clear(&self.paths)?;
            shards
        };

        info!(
            "Run complete: {} changes, {} skipped, {} versions, {} events, sequence {}",
            stats.changes,
            stats.skipped,
            stats.versions,
            stats.events,
            store.sequence()
        );

        Ok(RunSummary {
            start_sequence,
            end_sequence,
            sequence: store.sequence(),
            stats,
            shards,
        })
    }

    /// Rotate the log a previous run committed but failed to rotate
    ///
    /// The marker only counts when the loaded checkpoint is the one it was
    /// written for. Otherwise that run died before persisting and its log is
    /// partial, so it is left to be truncated.
    fn finish_pending_rotation(
        &self,
        events_dir: &Path,
        sequence: u64,
    ) -> Result<(), CollectError> {
        let Some(pending) = PendingRotation::read(&self.paths)? else {
            return Ok(());
        };

        let active = active_log_path(events_dir, pending.log_number);
        if pending.sequence != sequence {
            debug!(
                "Discarding rotation marker for {:?}: written for sequence {}, checkpoint is at {}",
                active, pending.sequence, sequence
            );
        } else if active.exists() {
            warn!("Rotating {:?} left behind by the previous run", active);
            let shards = self.rotator.rotate(&active)?;
            info!("Rotated {:?} into {:?}", active, shards);
        } else {
            warn!("Rotation marker names {:?} but the file is gone", active);
        }

        PendingRotation::clear(&self.paths)?;
        Ok(())
    }

    async fn stream<W: Write>(
        &self,
        session: &mut RunSession<W>,
        start: u64,
        end: u64,
        active: &Path,
    ) -> Result<(), CollectError> {
        let mut subscription =
            FeedSubscription::start(Arc::clone(&self.feed), start, self.options.clone());
        let mut progress = Progress::new(start, end);
        let mut previous = start;

        loop {
            let Some(message) = subscription.next().await else {
                return Err(FeedError::Closed.into());
            };

            match message? {
                FeedMessage::Idle { last_seq } => {
                    if last_seq.saturating_add(1) >= end {
                        info!("Change feed caught up at sequence {}", last_seq);
                        break;
                    }
                }
                FeedMessage::Change(change) => {
                    if change.seq <= previous {
                        warn!(
                            "Ignoring change {} ({}) delivered after sequence {}",
                            change.seq, change.id, previous
                        );
                        continue;
                    }
                    if change.seq >= end {
                        info!("Reached end sequence {} at change {}", end, change.seq);
                        break;
                    }

                    previous = change.seq;
                    progress.update(change.seq);
                    session
                        .process_change(change)
                        .map_err(log_error(active))?;
                }
            }
        }

        subscription.stop();
        Ok(())
    }

    fn transition(&mut self, next: RunState) {
        debug!("Run state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

fn log_error(path: &Path) -> impl FnOnce(io::Error) -> CollectError {
    let path = path.to_path_buf();
    move |source| CollectError::Log { path, source }
}
