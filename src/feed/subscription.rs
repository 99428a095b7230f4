//! Bounded prefetch between the feed transport and the consumer
//!
//! A spawned task pages through [`ChangeFeed::changes`] and pushes each event
//! into a channel whose capacity is the prefetch depth. The task blocks once
//! the channel is full, so the consumer pulling with [`FeedSubscription::next`]
//! is the only thing that lets the feed advance.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::RegistryConfig;
use crate::error::FeedError;
use crate::feed::{ChangeEvent, ChangeFeed};

/// Item delivered to the consumer
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Change(ChangeEvent),
    /// The feed returned an empty page; everything through `last_seq` has been delivered
    Idle { last_seq: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedOptions {
    pub prefetch: usize,
    pub batch_size: usize,
    pub poll_interval: Duration,
}

impl From<&RegistryConfig> for FeedOptions {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            prefetch: config.prefetch_concurrency,
            batch_size: config.batch_size,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// Live subscription to a change feed, starting after a given sequence
pub struct FeedSubscription {
    receiver: mpsc::Receiver<Result<FeedMessage, FeedError>>,
    task: JoinHandle<()>,
}

impl FeedSubscription {
    /// Start paging the feed after `since`
    pub fn start(feed: Arc<dyn ChangeFeed>, since: u64, options: FeedOptions) -> Self {
        let (sender, receiver) = mpsc::channel(options.prefetch.max(1));
        let task = tokio::spawn(pump(feed, since, options, sender));
        Self { receiver, task }
    }

    /// Next message, or `None` once the transport task has ended
    ///
    /// A transport error is delivered once and then the channel closes.
    pub async fn next(&mut self) -> Option<Result<FeedMessage, FeedError>> {
        self.receiver.recv().await
    }

    /// Stop the transport task; buffered messages are discarded
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn pump(
    feed: Arc<dyn ChangeFeed>,
    mut since: u64,
    options: FeedOptions,
    sender: mpsc::Sender<Result<FeedMessage, FeedError>>,
) {
    let batch_size = options.batch_size.max(1);

    loop {
        let page = match feed.changes(since, batch_size).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Change feed request after sequence {} failed: {}", since, e);
                let _ = sender.send(Err(e)).await;
                return;
            }
        };

        if page.results.is_empty() {
            let last_seq = page.last_seq.max(since);
            if sender
                .send(Ok(FeedMessage::Idle { last_seq }))
                .await
                .is_err()
            {
                return;
            }
            debug!("Change feed idle at sequence {}", last_seq);
            tokio::time::sleep(options.poll_interval).await;
            continue;
        }

        let page_end = page
            .results
            .iter()
            .map(|change| change.seq)
            .max()
            .unwrap_or(since)
            .max(page.last_seq);

        for change in page.results {
            if sender.send(Ok(FeedMessage::Change(change))).await.is_err() {
                return;
            }
        }

        since = since.max(page_end);
    }
}
