//! Event log record format
//!
//! One line per change: `package,version,date,kind,class,dependency`.
//! There is no header and no quoting; separator characters are stripped
//! from the dependency name instead.

use crate::package::diff::{ChangeKind, DependencyClass};

/// One parsed event log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub package: String,
    pub version: String,
    pub date: String,
    pub kind: ChangeKind,
    pub class: DependencyClass,
    pub dependency: String,
}

impl EventRecord {
    /// Parse a log line, returning None when it does not have six well-formed fields
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.trim_end_matches(['\n', '\r']).splitn(6, ',');

        let package = fields.next()?.to_string();
        let version = fields.next()?.to_string();
        let date = fields.next()?.to_string();
        let kind = ChangeKind::parse(fields.next()?)?;
        let class = DependencyClass::parse(fields.next()?)?;
        let dependency = fields.next()?.to_string();

        Some(Self {
            package,
            version,
            date,
            kind,
            class,
            dependency,
        })
    }
}

/// Strip the characters that would break the record layout
pub fn clean_field(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, '\n' | ',')).collect()
}

/// The date column of a log line, or "" when the line is too short
pub fn date_field(line: &str) -> &str {
    line.split(',').nth(2).unwrap_or("")
}
