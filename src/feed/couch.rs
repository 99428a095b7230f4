//! CouchDB replication endpoint implementation of the change feed

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::FeedError;
use crate::feed::{ChangeFeed, ChangesPage, deserialize_sequence};

/// Response from the database root
#[derive(Debug, Deserialize)]
struct DatabaseInfo {
    #[serde(deserialize_with = "deserialize_sequence")]
    update_seq: u64,
}

/// Change feed over a CouchDB-compatible `_changes` endpoint
pub struct CouchChangeFeed {
    client: reqwest::Client,
    base_url: String,
}

impl CouchChangeFeed {
    /// Creates a feed for the database at `base_url`
    pub fn new(base_url: &str) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .user_agent("npm-dep-events")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FeedError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Registry returned status {}: {}", status, url);
            return Err(FeedError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.json().await.map_err(|e| {
            warn!("Failed to parse registry response from {}: {}", url, e);
            FeedError::InvalidResponse(e.to_string())
        })
    }
}

#[async_trait::async_trait]
impl ChangeFeed for CouchChangeFeed {
    async fn update_sequence(&self) -> Result<u64, FeedError> {
        let info: DatabaseInfo = self.get_json(&self.base_url).await?;
        debug!("Registry update sequence: {}", info.update_seq);
        Ok(info.update_seq)
    }

    async fn changes(&self, since: u64, limit: usize) -> Result<ChangesPage, FeedError> {
        let url = format!(
            "{}/_changes?since={}&include_docs=true&limit={}",
            self.base_url, since, limit
        );

        let page: ChangesPage = self.get_json(&url).await?;
        debug!(
            "Fetched {} changes after sequence {} (last_seq {})",
            page.results.len(),
            since,
            page.last_seq
        );
        Ok(page)
    }
}
