//! Registry change feed
//!
//! The registry's backing store publishes every document revision with a
//! monotonically increasing sequence number. [`ChangeFeed`] pages through it,
//! and [`subscription::FeedSubscription`] turns the pages into a bounded,
//! prefetching stream the collector pulls one event at a time.
//!
//! # Modules
//!
//! - [`couch`]: CouchDB `_changes` implementation over HTTP
//! - [`subscription`]: Bounded prefetch channel between transport and consumer

#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Deserializer, de::Error as _};

use crate::error::FeedError;

pub mod couch;
pub mod subscription;

/// One document revision notification
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChangeEvent {
    #[serde(deserialize_with = "deserialize_sequence")]
    pub seq: u64,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
    /// Full document, present when the feed is read with `include_docs`
    #[serde(default)]
    pub doc: Option<serde_json::Value>,
}

/// One page of the change feed
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChangesPage {
    pub results: Vec<ChangeEvent>,
    #[serde(deserialize_with = "deserialize_sequence")]
    pub last_seq: u64,
}

/// Trait for reading a registry change feed
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Sequence of the most recent change at the time of the call
    async fn update_sequence(&self) -> Result<u64, FeedError>;

    /// Up to `limit` changes with a sequence greater than `since`, in sequence order
    async fn changes(&self, since: u64, limit: usize) -> Result<ChangesPage, FeedError>;
}

/// Accepts a plain number or a CouchDB 2 style `"<n>-<opaque>"` string
pub(crate) fn deserialize_sequence<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSequence {
        Number(u64),
        Text(String),
    }

    match RawSequence::deserialize(deserializer)? {
        RawSequence::Number(n) => Ok(n),
        RawSequence::Text(text) => text
            .split('-')
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| D::Error::custom(format!("invalid sequence {text:?}"))),
    }
}
