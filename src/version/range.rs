//! npm range validation
//!
//! Supports the specifier grammar npm accepts as a version range:
//! - `1.2.3`, `=1.2.3`, `v1.2.3` - exact versions
//! - `^1.2.3`, `~1.2.3`, `~>1.2` - caret and tilde ranges
//! - `>=1.2.3`, `>1.2.3`, `<=1.2.3`, `<1.2.3` - comparison operators
//! - `1.2.x`, `1.x`, `1`, `*`, `""` - wildcards and partial versions
//! - `1.0.0 - 2.0.0` - hyphen ranges
//! - `>=1.0.0 <2.0.0` - AND (space separated), `^1.0.0 || ^2.0.0` - OR
//!
//! Dist-tags (`latest`), URLs, git specifiers and `npm:` aliases are not ranges.

use std::sync::LazyLock;

use regex::Regex;

/// One X-range version: numeric or wildcard parts, optional prerelease/build on full versions
static PARTIAL_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:0|[1-9]\d*|[xX*])(?:\.(?:0|[1-9]\d*|[xX*])(?:\.(?:0|[1-9]\d*|[xX*])(?:-[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?(?:\+[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?)?)?$",
    )
    .expect("partial version pattern is valid")
});

/// Whitespace between an operator and its version (`>= 1.2.3`)
static OPERATOR_SPACING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(~>?|\^|[<>]=?|=)\s+").expect("operator spacing pattern is valid")
});

static HYPHEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s+-\s+(\S+)$").expect("hyphen pattern is valid"));

/// Operator prefixes, longest first so `>=` is not read as `>`
const OPERATORS: [&str; 8] = ["~>", ">=", "<=", ">", "<", "^", "~", "="];

/// Strip a leading operator, if any
fn strip_operator(token: &str) -> &str {
    OPERATORS
        .iter()
        .find_map(|prefix| token.strip_prefix(prefix))
        .unwrap_or(token)
}

/// X-range version without its `v`/`=` prefix
fn is_partial_version(text: &str) -> bool {
    PARTIAL_VERSION.is_match(text.trim_start_matches(['=', 'v']))
}

/// One `||` branch: empty, a hyphen range, or whitespace-separated comparators
fn is_valid_and_set(set: &str) -> bool {
    let set = set.trim();
    if set.is_empty() {
        return true;
    }

    if let Some(captures) = HYPHEN.captures(set) {
        return is_partial_version(&captures[1]) && is_partial_version(&captures[2]);
    }

    OPERATOR_SPACING
        .replace_all(set, "$1")
        .split_whitespace()
        .all(|token| is_partial_version(strip_operator(token)))
}

/// Whether npm would accept `range` as a version range
pub fn is_valid_range(range: &str) -> bool {
    range.split("||").all(is_valid_and_set)
}
