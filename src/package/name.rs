//! Package name validation
//!
//! Follows the legacy rules npm still accepts for existing packages, and
//! rejects capital letters on top of them.

use std::sync::LazyLock;

use regex::Regex;

static SCOPED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:@([^/]+?)/)?([^/]+?)$").expect("scoped name pattern is valid")
});

const BLACKLIST: [&str; 2] = ["node_modules", "favicon.ico"];

/// Check whether a dependency name could name a registry package
pub fn is_valid_package_name(name: &str) -> bool {
    if name.is_empty() || name.trim() != name {
        return false;
    }

    if name.starts_with('.') || name.starts_with('_') {
        return false;
    }

    if BLACKLIST
        .iter()
        .any(|blocked| name.eq_ignore_ascii_case(blocked))
    {
        return false;
    }

    if name.chars().any(|c| c.is_uppercase()) {
        return false;
    }

    if is_url_safe(name) {
        return true;
    }

    // `@scope/name` is the only form allowed to contain a separator
    SCOPED_NAME.captures(name).is_some_and(|captures| {
        match (captures.get(1), captures.get(2)) {
            (Some(scope), Some(package)) => {
                is_url_safe(scope.as_str()) && is_url_safe(package.as_str())
            }
            _ => false,
        }
    })
}

/// Names like `foo/../bar` or `@scope/.hidden` that resolve outside a package directory
pub fn is_traversal_like(name: &str) -> bool {
    name.contains("/.")
}

/// Characters `encodeURIComponent` leaves untouched
fn is_url_safe(s: &str) -> bool {
    s.chars().all(|c| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '!' | '~' | '*' | '\'' | '(' | ')')
    })
}
