//! npm-style semver ranges
//!
//! Ranges written in manifests use the npm grammar (`||` alternatives,
//! space separated comparators, `x` wildcards, hyphen ranges). Each
//! alternative is lowered to a `semver::VersionReq`.

use semver::{Version, VersionReq};
use std::fmt;

const OPERATOR_CHARS: &[char] = &['<', '>', '=', '~', '^'];

/// A parsed npm range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    text: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Parse a range; `None` if the text is not a semver range
    pub fn parse(text: &str) -> Option<Self> {
        let alternatives = text
            .split("||")
            .map(parse_alternative)
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            text: text.to_string(),
            alternatives,
        })
    }

    /// Check if a version satisfies any alternative
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// Highest version out of `candidates` satisfying the range
    pub fn max_satisfying<'a, I>(&self, candidates: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        candidates.into_iter().filter(|v| self.matches(v)).max()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn parse_alternative(text: &str) -> Option<VersionReq> {
    let text = text.trim();

    if let Some((low, high)) = text.split_once(" - ") {
        let low = normalize_comparator(&format!(">={}", low.trim()))?;
        let high = normalize_comparator(&format!("<={}", high.trim()))?;
        return VersionReq::parse(&format!("{}, {}", low, high)).ok();
    }

    let mut comparators = Vec::new();
    let mut pending_operator = String::new();

    for token in text.split_whitespace() {
        // `>= 1.0.0` is written with a detached operator
        if token.chars().all(|c| OPERATOR_CHARS.contains(&c)) {
            pending_operator.push_str(token);
            continue;
        }

        let token = format!("{}{}", pending_operator, token);
        pending_operator.clear();

        let comparator = normalize_comparator(&token)?;
        if comparator != "*" {
            comparators.push(comparator);
        }
    }

    if !pending_operator.is_empty() {
        return None;
    }

    if comparators.is_empty() {
        return Some(VersionReq::STAR);
    }

    VersionReq::parse(&comparators.join(", ")).ok()
}

/// Lower one npm comparator to the `semver` crate grammar
fn normalize_comparator(token: &str) -> Option<String> {
    let split = token
        .find(|c: char| !OPERATOR_CHARS.contains(&c))
        .unwrap_or(token.len());
    let (operator, version) = token.split_at(split);
    let version = version.strip_prefix('v').unwrap_or(version);

    if version.is_empty() || !version.starts_with(|c: char| c.is_ascii_digit() || "xX*".contains(c)) {
        return None;
    }

    // `1.x`, `1.2.*` and friends become partial versions
    let mut parts: Vec<&str> = version.split('.').collect();
    while parts
        .last()
        .is_some_and(|part| matches!(*part, "x" | "X" | "*"))
    {
        parts.pop();
    }

    if parts.is_empty() {
        return match operator {
            "" | ">=" | "=" | "^" | "~" => Some("*".to_string()),
            _ => None,
        };
    }

    let version = parts.join(".");
    if version.contains(['x', 'X', '*']) && !version.contains('-') {
        return None;
    }

    if operator.is_empty() {
        Some(format!("={}", version))
    } else {
        Some(format!("{}{}", operator, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    #[rstest]
    #[case("1.2.3", "1.2.3", true)]
    #[case("1.2.3", "1.2.4", false)]
    #[case("^1.2.3", "1.9.9", true)]
    #[case("^1.2.3", "2.0.0", false)]
    #[case("~1.2.3", "1.2.9", true)]
    #[case("~1.2.3", "1.3.0", false)]
    #[case("1.x", "1.4.0", true)]
    #[case("1.x", "2.0.0", false)]
    #[case("1", "1.0.5", true)]
    #[case("*", "3.1.4", true)]
    #[case("", "0.0.1", true)]
    #[case(">=1.0.0 <2.0.0", "1.5.0", true)]
    #[case(">=1.0.0 <2.0.0", "2.0.0", false)]
    #[case(">= 1.0.0", "1.0.0", true)]
    #[case("1.0.0 - 2.0.0", "2.0.0", true)]
    #[case("1.0.0 - 2.0.0", "2.0.1", false)]
    #[case("^1.0.0 || ^3.0.0", "3.2.0", true)]
    #[case("^1.0.0 || ^3.0.0", "2.2.0", false)]
    fn test_matches(#[case] range: &str, #[case] version: &str, #[case] expected: bool) {
        let range = VersionRange::parse(range).unwrap();
        assert_eq!(range.matches(&v(version)), expected);
    }

    #[rstest]
    #[case("latest")]
    #[case("next")]
    #[case(">=")]
    #[case("file:../foo")]
    #[case("beta-2")]
    fn test_not_a_range(#[case] text: &str) {
        assert_eq!(VersionRange::parse(text), None);
    }

    #[test]
    fn test_max_satisfying() {
        let versions = vec![v("1.0.0"), v("1.1.0"), v("2.0.0")];
        let range = VersionRange::parse("^1.0.0").unwrap();
        assert_eq!(range.max_satisfying(&versions), Some(&v("1.1.0")));
    }

    #[test]
    fn test_display_keeps_text() {
        let range = VersionRange::parse(">= 1.0.0").unwrap();
        assert_eq!(range.to_string(), ">= 1.0.0");
    }
}
