//! Request descriptors (`name`, `name@range`, `@scope/name@tag`, `./path`)

use crate::ident::PackageIdent;
use crate::version_range::VersionRange;
use crate::{PackageError, Result};
use semver::Version;
use std::fmt;

/// Protocols that point at a directory on disk
const PATH_PROTOCOLS: &[&str] = &["file", "link", "portal"];

/// What the user asked for after the `@`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSpecifier {
    /// A single concrete version (`1.0.0`)
    Exact(Version),
    /// A semver range (`^1.0.0`, `>=1 <2`, `1.x`)
    Range(String),
    /// A dist-tag (`latest`, `next`)
    Tag(String),
    /// A local path, with or without its `file:`/`link:`/`portal:` prefix
    Path(String),
    /// `workspace:<selector>`, selector stored without the protocol
    Workspace(String),
    /// Any other `protocol:selector` form
    Protocol { protocol: String, selector: String },
}

impl RangeSpecifier {
    /// Classify the text that follows `name@`
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(PackageError::malformed(text, "range cannot be empty"));
        }

        if let Some((protocol, selector)) = split_protocol(text) {
            return Ok(match protocol {
                "workspace" => Self::Workspace(selector.to_string()),
                p if PATH_PROTOCOLS.contains(&p) => Self::Path(text.to_string()),
                _ => Self::Protocol {
                    protocol: protocol.to_string(),
                    selector: selector.to_string(),
                },
            });
        }

        if looks_like_path(text) {
            return Ok(Self::Path(text.to_string()));
        }

        if let Ok(version) = Version::parse(text) {
            return Ok(Self::Exact(version));
        }

        if VersionRange::parse(text).is_some() {
            return Ok(Self::Range(text.to_string()));
        }

        if is_valid_tag(text) {
            return Ok(Self::Tag(text.to_string()));
        }

        Err(PackageError::malformed(
            text,
            "expected a version, a range, a tag or a path",
        ))
    }

    /// Semver range this specifier stands for, if it is a range at all
    pub fn version_range(&self) -> Option<VersionRange> {
        match self {
            Self::Exact(version) => VersionRange::parse(&version.to_string()),
            Self::Range(range) => VersionRange::parse(range),
            Self::Protocol { protocol, selector } if protocol == "npm" => {
                VersionRange::parse(selector)
            }
            _ => None,
        }
    }

    /// Local directory for `Path` specifiers, protocol stripped
    pub fn local_path(&self) -> Option<&str> {
        match self {
            Self::Path(raw) => Some(
                split_protocol(raw)
                    .map(|(_, selector)| selector)
                    .unwrap_or(raw),
            ),
            _ => None,
        }
    }

    /// Text with its protocol spelled out, as used in lockfile keys
    pub fn with_protocol(&self) -> String {
        match self {
            Self::Exact(_) | Self::Range(_) | Self::Tag(_) => format!("npm:{}", self),
            Self::Path(raw) if split_protocol(raw).is_none() => format!("file:{}", raw),
            _ => self.to_string(),
        }
    }

    /// Whether the text is recorded as written whatever the modifier
    pub fn is_explicit_range(&self) -> bool {
        matches!(self, Self::Exact(_) | Self::Range(_))
    }
}

impl fmt::Display for RangeSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(version) => write!(f, "{}", version),
            Self::Range(text) | Self::Tag(text) | Self::Path(text) => f.write_str(text),
            Self::Workspace(selector) => write!(f, "workspace:{}", selector),
            Self::Protocol { protocol, selector } => write!(f, "{}:{}", protocol, selector),
        }
    }
}

/// One parsed `tern add` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    /// The argument exactly as typed
    pub raw: String,
    /// `None` only for a bare path, named later from its manifest
    pub ident: Option<PackageIdent>,
    /// `None` when no range was given
    pub range: Option<RangeSpecifier>,
}

impl PackageRequest {
    /// Parse a descriptor such as `lodash`, `lodash@^4`, `@types/node@latest` or `../local`
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(PackageError::malformed(input, "descriptor cannot be empty"));
        }

        if looks_like_path(raw) && !raw.contains('@') {
            return Ok(Self {
                raw: raw.to_string(),
                ident: None,
                range: Some(RangeSpecifier::Path(raw.to_string())),
            });
        }

        // A leading `@` belongs to the scope, not to the range separator
        let separator = if raw.starts_with('@') {
            raw[1..].find('@').map(|i| i + 1)
        } else {
            raw.find('@')
        };

        let (name, range) = match separator {
            Some(at) => (&raw[..at], Some(&raw[at + 1..])),
            None => (raw, None),
        };

        let ident = PackageIdent::parse(name).map_err(|e| match e {
            PackageError::MalformedDescriptor { reason, .. } => PackageError::malformed(raw, reason),
            other => other,
        })?;

        let range = match range {
            Some("") => return Err(PackageError::malformed(raw, "range after '@' is empty")),
            Some(text) => Some(RangeSpecifier::parse(text).map_err(|e| match e {
                PackageError::MalformedDescriptor { reason, .. } => {
                    PackageError::malformed(raw, reason)
                }
                other => other,
            })?),
            None => None,
        };

        Ok(Self {
            raw: raw.to_string(),
            ident: Some(ident),
            range,
        })
    }
}

/// Split `protocol:selector`; protocols are lowercase words like `npm` or `git+ssh`
pub(crate) fn split_protocol(text: &str) -> Option<(&str, &str)> {
    let (protocol, selector) = text.split_once(':')?;
    let valid = protocol.starts_with(|c: char| c.is_ascii_lowercase())
        && protocol
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.'));
    valid.then_some((protocol, selector))
}

fn looks_like_path(text: &str) -> bool {
    text == "."
        || text == ".."
        || text.starts_with("./")
        || text.starts_with("../")
        || text.starts_with('/')
        || text.starts_with("~/")
}

fn is_valid_tag(text: &str) -> bool {
    text.starts_with(|c: char| c.is_ascii_alphanumeric())
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn parse(input: &str) -> PackageRequest {
        PackageRequest::parse(input).unwrap()
    }

    #[test]
    fn test_bare_name() {
        let request = parse("no-deps");
        assert_eq!(request.ident.unwrap().to_string(), "no-deps");
        assert_eq!(request.range, None);
    }

    #[test]
    fn test_scoped_name_with_tag() {
        let request = parse("@types/node@latest");
        assert_eq!(request.ident.unwrap().to_string(), "@types/node");
        assert_eq!(request.range, Some(RangeSpecifier::Tag("latest".to_string())));
    }

    #[test]
    fn test_scoped_name_without_range() {
        let request = parse("@types/node");
        assert_eq!(request.ident.unwrap().to_string(), "@types/node");
        assert_eq!(request.range, None);
    }

    #[rstest]
    #[case("no-deps@1.0.0", RangeSpecifier::Exact(Version::new(1, 0, 0)))]
    #[case("no-deps@^1.0.0", RangeSpecifier::Range("^1.0.0".to_string()))]
    #[case("no-deps@1.x", RangeSpecifier::Range("1.x".to_string()))]
    #[case("no-deps@next", RangeSpecifier::Tag("next".to_string()))]
    #[case("no-deps@workspace:^", RangeSpecifier::Workspace("^".to_string()))]
    #[case("no-deps@workspace:packages/no-deps", RangeSpecifier::Workspace("packages/no-deps".to_string()))]
    #[case("no-deps@file:../no-deps", RangeSpecifier::Path("file:../no-deps".to_string()))]
    #[case("no-deps@link:../no-deps", RangeSpecifier::Path("link:../no-deps".to_string()))]
    #[case("no-deps@../no-deps", RangeSpecifier::Path("../no-deps".to_string()))]
    #[case(
        "no-deps@npm:^2.0.0",
        RangeSpecifier::Protocol { protocol: "npm".to_string(), selector: "^2.0.0".to_string() }
    )]
    #[case(
        "no-deps@git+ssh://host/repo.git",
        RangeSpecifier::Protocol { protocol: "git+ssh".to_string(), selector: "//host/repo.git".to_string() }
    )]
    fn test_range_forms(#[case] input: &str, #[case] expected: RangeSpecifier) {
        assert_eq!(parse(input).range, Some(expected));
    }

    #[rstest]
    #[case("./packages/foo")]
    #[case("../foo")]
    #[case("/abs/foo")]
    fn test_bare_path_has_no_ident(#[case] input: &str) {
        let request = parse(input);
        assert_eq!(request.ident, None);
        assert_eq!(request.range, Some(RangeSpecifier::Path(input.to_string())));
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("no-deps@")]
    #[case("@scope@1.0.0")]
    #[case("bad name")]
    #[case("no-deps@!!")]
    fn test_malformed(#[case] input: &str) {
        assert!(matches!(
            PackageRequest::parse(input),
            Err(PackageError::MalformedDescriptor { .. })
        ));
    }

    #[test]
    fn test_display_round_trips_text() {
        for text in ["1.0.0", "^1.0.0", "latest", "file:../x", "workspace:^", "npm:^2"] {
            assert_eq!(RangeSpecifier::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_local_path_strips_protocol() {
        let spec = RangeSpecifier::parse("portal:../x").unwrap();
        assert_eq!(spec.local_path(), Some("../x"));
        let spec = RangeSpecifier::parse("./x").unwrap();
        assert_eq!(spec.local_path(), Some("./x"));
    }

    #[rstest]
    #[case("^1.0.0", "npm:^1.0.0")]
    #[case("latest", "npm:latest")]
    #[case("../x", "file:../x")]
    #[case("link:../x", "link:../x")]
    #[case("workspace:^", "workspace:^")]
    #[case("npm:^2.0.0", "npm:^2.0.0")]
    fn test_with_protocol(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(RangeSpecifier::parse(text).unwrap().with_protocol(), expected);
    }

    #[test]
    fn test_npm_protocol_exposes_inner_range() {
        let spec = RangeSpecifier::parse("npm:^2.0.0").unwrap();
        let range = spec.version_range().unwrap();
        assert!(range.matches(&Version::new(2, 1, 0)));
    }
}
