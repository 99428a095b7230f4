//! Dependency set differences between consecutive versions

use std::collections::BTreeSet;

use crate::package::document::VersionRecord;
use crate::package::name::{is_traversal_like, is_valid_package_name};
use crate::version::range::is_valid_range;

/// Dependency grouping of a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyClass {
    /// `dependencies`
    Prod,
    /// `devDependencies`
    Dev,
}

impl DependencyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyClass::Prod => "prod",
            DependencyClass::Dev => "dev",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "prod" => Some(DependencyClass::Prod),
            "dev" => Some(DependencyClass::Dev),
            _ => None,
        }
    }
}

/// Direction of a dependency change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    Add,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(ChangeKind::Add),
            "delete" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// Validated dependency names of one version, per class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    pub prod: BTreeSet<String>,
    pub dev: BTreeSet<String>,
}

impl DependencySet {
    pub fn from_record(record: &VersionRecord) -> Self {
        Self {
            prod: validated_names(&record.dependencies),
            dev: validated_names(&record.dev_dependencies),
        }
    }

    fn class(&self, class: DependencyClass) -> &BTreeSet<String> {
        match class {
            DependencyClass::Prod => &self.prod,
            DependencyClass::Dev => &self.dev,
        }
    }
}

/// Names whose range is a valid npm range and whose name could be a package.
/// Anything that is not a name -> string object contributes nothing.
fn validated_names(dependencies: &serde_json::Value) -> BTreeSet<String> {
    let Some(entries) = dependencies.as_object() else {
        return BTreeSet::new();
    };

    entries
        .iter()
        .filter(|(name, range)| {
            range.as_str().is_some_and(is_valid_range)
                && is_valid_package_name(name)
                && !is_traversal_like(name)
        })
        .map(|(name, _)| name.clone())
        .collect()
}

/// Added and removed dependency names for one class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassDiff {
    pub add: BTreeSet<String>,
    pub delete: BTreeSet<String>,
}

impl ClassDiff {
    fn between(new: &BTreeSet<String>, old: &BTreeSet<String>) -> Self {
        Self {
            add: new.difference(old).cloned().collect(),
            delete: old.difference(new).cloned().collect(),
        }
    }

    fn names(&self, kind: ChangeKind) -> &BTreeSet<String> {
        match kind {
            ChangeKind::Add => &self.add,
            ChangeKind::Delete => &self.delete,
        }
    }
}

/// Dependency changes introduced by one version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionDiff {
    pub prod: ClassDiff,
    pub dev: ClassDiff,
}

impl VersionDiff {
    pub fn class(&self, class: DependencyClass) -> &ClassDiff {
        match class {
            DependencyClass::Prod => &self.prod,
            DependencyClass::Dev => &self.dev,
        }
    }

    /// Every change as `(class, kind, name)`, in class, kind, name order
    pub fn changes(&self) -> impl Iterator<Item = (DependencyClass, ChangeKind, &str)> {
        [DependencyClass::Prod, DependencyClass::Dev]
            .into_iter()
            .flat_map(move |class| {
                [ChangeKind::Add, ChangeKind::Delete]
                    .into_iter()
                    .flat_map(move |kind| {
                        self.class(class)
                            .names(kind)
                            .iter()
                            .map(move |name| (class, kind, name.as_str()))
                    })
            })
    }

    pub fn is_empty(&self) -> bool {
        self.changes().next().is_none()
    }
}

/// Set difference of dependency names between a version and its predecessor.
///
/// Without a predecessor every dependency is an addition. Only names are
/// compared; a changed range under the same name is not a change.
pub fn diff(new: &DependencySet, old: Option<&DependencySet>) -> VersionDiff {
    let empty = DependencySet::default();
    let old = old.unwrap_or(&empty);

    VersionDiff {
        prod: ClassDiff::between(new.class(DependencyClass::Prod), old.class(DependencyClass::Prod)),
        dev: ClassDiff::between(new.class(DependencyClass::Dev), old.class(DependencyClass::Dev)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(prod: serde_json::Value, dev: serde_json::Value) -> DependencySet {
        DependencySet::from_record(&VersionRecord {
            dependencies: prod,
            dev_dependencies: dev,
        })
    }

    fn names(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn diff_reports_added_and_deleted_names() {
        let old = set(json!({ "a": "1", "b": "1", "c": "1" }), json!(null));
        let new = set(json!({ "b": "1", "c": "1", "d": "1" }), json!(null));

        let result = diff(&new, Some(&old));

        assert_eq!(result.prod.add, names(&["d"]));
        assert_eq!(result.prod.delete, names(&["a"]));
        assert_eq!(result.dev, ClassDiff::default());
    }

    #[test]
    fn diff_is_independent_of_insertion_order() {
        let old = set(json!({ "c": "1", "a": "1", "b": "1" }), json!({ "y": "1", "x": "1" }));
        let new_one = set(json!({ "d": "1", "b": "1", "c": "1" }), json!({ "x": "1", "z": "1" }));
        let new_two = set(json!({ "c": "1", "d": "1", "b": "1" }), json!({ "z": "1", "x": "1" }));

        assert_eq!(diff(&new_one, Some(&old)), diff(&new_two, Some(&old)));
    }

    #[test]
    fn diff_without_previous_version_adds_everything() {
        let new = set(json!({ "x": "^1.0.0", "y": "~2.0.0" }), json!(null));

        let result = diff(&new, None);

        assert_eq!(result.prod.add, names(&["x", "y"]));
        assert!(result.prod.delete.is_empty());
        assert!(result.dev.add.is_empty());
    }

    #[test]
    fn diff_ignores_range_changes_under_the_same_name() {
        let old = set(json!({ "a": "^1.0.0" }), json!({ "t": "1.0.0" }));
        let new = set(json!({ "a": "^2.0.0" }), json!({ "t": "2.0.0" }));

        assert!(diff(&new, Some(&old)).is_empty());
    }

    #[test]
    fn diff_treats_classes_independently() {
        let old = set(json!({ "a": "1" }), json!(null));
        let new = set(json!(null), json!({ "a": "1" }));

        let result = diff(&new, Some(&old));

        assert_eq!(result.prod.delete, names(&["a"]));
        assert_eq!(result.dev.add, names(&["a"]));
    }

    #[test]
    fn from_record_excludes_invalid_entries() {
        let deps = set(
            json!({
                "ok": "^1.0.0",
                "bad-range": "not-a-range",
                "UPPERCASE_INVALID": "^1.0.0",
                "@scope/.hidden": "1.0.0",
                "tag": "latest",
                "non-string": 5
            }),
            json!(["array", "is", "not", "a", "map"]),
        );

        assert_eq!(deps.prod, names(&["ok"]));
        assert!(deps.dev.is_empty());
    }

    #[test]
    fn changes_iterate_class_then_kind_then_name() {
        let old = set(json!({ "gone": "1" }), json!({ "old-dev": "1" }));
        let new = set(json!({ "b": "1", "a": "1" }), json!({ "new-dev": "1" }));

        let result = diff(&new, Some(&old));
        let changes: Vec<_> = result.changes().collect();

        assert_eq!(
            changes,
            vec![
                (DependencyClass::Prod, ChangeKind::Add, "a"),
                (DependencyClass::Prod, ChangeKind::Add, "b"),
                (DependencyClass::Prod, ChangeKind::Delete, "gone"),
                (DependencyClass::Dev, ChangeKind::Add, "new-dev"),
                (DependencyClass::Dev, ChangeKind::Delete, "old-dev"),
            ]
        );
    }

    #[test]
    fn parse_reads_what_as_str_writes() {
        for class in [DependencyClass::Prod, DependencyClass::Dev] {
            assert_eq!(DependencyClass::parse(class.as_str()), Some(class));
        }
        for kind in [ChangeKind::Add, ChangeKind::Delete] {
            assert_eq!(ChangeKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(DependencyClass::parse("peer"), None);
        assert_eq!(ChangeKind::parse("added"), None);
    }
}
