//! Shared fixtures for integration tests

#![allow(dead_code)]

mod registry;

use std::fs;
use std::path::Path;

use serde_json::{Map, Value, json};

use npm_dep_events::config::{CollectorConfig, RegistryConfig};

pub use registry::CouchServer;

/// One published version: `(version, release time, production dependencies)`
pub type Release<'a> = (&'a str, &'a str, &'a [&'a str]);

/// Package document shaped like a registry replication document
pub fn package_doc(name: &str, releases: &[Release]) -> Value {
    let mut time = Map::new();
    time.insert("created".to_string(), json!("2000-01-01T00:00:00.000Z"));
    let mut versions = Map::new();

    for (version, date, dependencies) in releases {
        time.insert(version.to_string(), json!(date));
        let dependencies: Map<String, Value> = dependencies
            .iter()
            .map(|dep| (dep.to_string(), json!("^1.0.0")))
            .collect();
        versions.insert(
            version.to_string(),
            json!({ "name": name, "version": version, "dependencies": dependencies }),
        );
    }

    json!({
        "_id": name,
        "_rev": "1-abc",
        "name": name,
        "time": time,
        "versions": versions
    })
}

/// `_changes` result entry carrying a document
pub fn change(seq: u64, doc: Value) -> Value {
    let id = doc.get("_id").cloned().unwrap_or(Value::Null);
    json!({
        "seq": seq,
        "id": id,
        "changes": [{ "rev": "1-abc" }],
        "doc": doc
    })
}

pub fn collector_config(url: &str) -> CollectorConfig {
    CollectorConfig {
        registry: RegistryConfig {
            url: url.to_string(),
            poll_interval_ms: 1,
            ..RegistryConfig::default()
        },
        ..CollectorConfig::default()
    }
}

/// Sorted file names in a directory
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
