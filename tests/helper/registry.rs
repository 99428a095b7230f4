//! CouchDB replication endpoint test server

use mockito::{Mock, ServerGuard};
use serde_json::{Value, json};

use npm_dep_events::config::DEFAULT_BATCH_SIZE;

/// Mock registry serving a database root and `_changes` pages
pub struct CouchServer {
    server: ServerGuard,
    mocks: Vec<Mock>,
}

impl CouchServer {
    pub async fn start() -> Self {
        Self {
            server: mockito::Server::new_async().await,
            mocks: Vec::new(),
        }
    }

    pub fn url(&self) -> String {
        self.server.url()
    }

    pub async fn with_update_seq(mut self, update_seq: u64) -> Self {
        let mock = self
            .server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "db_name": "registry", "update_seq": update_seq }).to_string())
            .create_async()
            .await;
        self.mocks.push(mock);
        self
    }

    /// Serve `results` for the page requested after `since`
    pub async fn with_changes(mut self, since: u64, results: Vec<Value>, last_seq: u64) -> Self {
        let mock = self
            .server
            .mock("GET", changes_path(since).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "results": results, "last_seq": last_seq }).to_string())
            .create_async()
            .await;
        self.mocks.push(mock);
        self
    }

    /// Fail the page requested after `since` with `status`
    pub async fn with_failure(mut self, since: u64, status: usize) -> Self {
        let mock = self
            .server
            .mock("GET", changes_path(since).as_str())
            .with_status(status)
            .create_async()
            .await;
        self.mocks.push(mock);
        self
    }
}

fn changes_path(since: u64) -> String {
    format!(
        "/_changes?since={}&include_docs=true&limit={}",
        since, DEFAULT_BATCH_SIZE
    )
}
