//! Registry package documents as delivered by the change feed

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use tracing::debug;

/// A package document from the registry's backing store
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PackageDocument {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "_deleted", default)]
    pub deleted: bool,
    /// Raw version key -> version manifest; entries that are not a manifest are dropped
    #[serde(default, deserialize_with = "deserialize_versions")]
    pub versions: Option<IndexMap<String, VersionRecord>>,
    /// Raw version key -> ISO-8601 release timestamp (plus `created`/`modified` bookkeeping keys)
    pub time: Option<IndexMap<String, serde_json::Value>>,
    pub error: Option<String>,
    pub reason: Option<String>,
}

/// One published version's manifest, reduced to what the collector reads
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct VersionRecord {
    /// Name -> range mapping; any other JSON shape is treated as no dependencies
    pub dependencies: serde_json::Value,
    pub dev_dependencies: serde_json::Value,
}

fn deserialize_versions<'de, D>(
    deserializer: D,
) -> Result<Option<IndexMap<String, VersionRecord>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<IndexMap<String, serde_json::Value>>::deserialize(deserializer)? else {
        return Ok(None);
    };

    let versions = raw
        .into_iter()
        .filter_map(|(version, value)| match serde_json::from_value(value) {
            Ok(record) => Some((version, record)),
            Err(e) => {
                debug!("Dropping unreadable version {}: {}", version, e);
                None
            }
        })
        .collect();
    Ok(Some(versions))
}

impl PackageDocument {
    /// Deserialize a feed document, returning None when its shape is not a package document
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        serde_json::from_value(value)
            .inspect_err(|e| debug!("Skipping malformed document: {}", e))
            .ok()
    }

    /// Whether the document describes a live package
    ///
    /// Design documents, tombstones and deletion stubs are not packages, and
    /// neither is anything missing its name, id, versions or release times.
    pub fn is_package(&self) -> bool {
        let Some(id) = self.id.as_deref() else {
            return false;
        };

        let has_name = self.name.as_deref().is_some_and(|name| !name.is_empty());
        let is_deletion_stub = self.error.as_deref() == Some("not_found")
            && self.reason.as_deref() == Some("deleted");

        has_name
            && self.versions.is_some()
            && self.time.is_some()
            && !id.starts_with("_design/")
            && !self.deleted
            && !is_deletion_stub
    }

    /// Release timestamp recorded for a raw version key
    pub fn release_time(&self, version: &str) -> Option<&str> {
        self.time.as_ref()?.get(version)?.as_str()
    }
}
