use std::sync::LazyLock;

use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};

/// Loose version grammar accepted by the registry: leading zeros and a
/// hyphen-less prerelease suffix (`1.2.3beta`).
static LOOSE_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d+)\.(\d+)\.(\d+)(?:-?([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?(?:\+[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?$",
    )
    .expect("loose version pattern is valid")
});

/// Clean a raw registry version string into a semantic version.
///
/// Mirrors npm's `semver.clean`: surrounding whitespace and any leading `=`/`v`
/// characters are removed, the rest is parsed, and build metadata is dropped.
/// Returns `None` when the string is not a version at all.
///
/// Examples:
/// - " =v1.2.3 " -> Version(1, 2, 3)
/// - "1.2.3+build.5" -> Version(1, 2, 3)
/// - "01.2.3" -> Version(1, 2, 3)
/// - "latest" -> None
pub fn clean_version(raw: &str) -> Option<Version> {
    let stripped = raw.trim().trim_start_matches(['=', 'v']).trim_start();

    let mut version = Version::parse(stripped)
        .ok()
        .or_else(|| parse_loose(stripped))?;
    version.build = BuildMetadata::EMPTY;
    Some(version)
}

fn parse_loose(version: &str) -> Option<Version> {
    let captures = LOOSE_VERSION.captures(version)?;

    let major = captures[1].parse().ok()?;
    let minor = captures[2].parse().ok()?;
    let patch = captures[3].parse().ok()?;
    let pre = match captures.get(4) {
        Some(pre) => Prerelease::new(pre.as_str()).ok()?,
        None => Prerelease::EMPTY,
    };

    Some(Version {
        major,
        minor,
        patch,
        pre,
        build: BuildMetadata::EMPTY,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.2.3", Some("1.2.3"))]
    #[case(" 1.2.3 ", Some("1.2.3"))]
    #[case("v1.2.3", Some("1.2.3"))]
    #[case("=v1.2.3", Some("1.2.3"))]
    #[case("1.2.3-beta.1", Some("1.2.3-beta.1"))]
    #[case("1.2.3+build.5", Some("1.2.3"))]
    #[case("1.2.3beta", Some("1.2.3-beta"))]
    #[case("01.02.03", Some("1.2.3"))]
    #[case("1.2", None)] // partial versions are not versions
    #[case("latest", None)]
    #[case("", None)]
    #[case("1.2.3.4", None)]
    fn clean_version_returns_expected(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            clean_version(raw).map(|v| v.to_string()),
            expected.map(|s| s.to_string())
        );
    }

    #[test]
    fn clean_versions_differing_only_in_build_compare_equal() {
        let a = clean_version("1.0.0+a").unwrap();
        let b = clean_version("1.0.0+b").unwrap();

        assert_eq!(a, b);
    }
}
