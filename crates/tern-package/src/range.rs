//! Range modifiers and the ranges written to the manifest

use crate::descriptor::RangeSpecifier;
use semver::Version;
use tern_config::{Config, SemverRangePrefix};

/// How a resolved version is turned into a recorded range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeModifier {
    /// `-C`: `^x.y.z`
    Caret,
    /// `-T`: `~x.y.z`
    Tilde,
    /// `-E`: `x.y.z`
    Exact,
    /// `-F`: record the request as typed
    Fixed,
    /// No flag: follow the configured prefix
    #[default]
    Default,
}

impl RangeModifier {
    /// Pick the modifier from command-line flags; the first set flag wins
    pub fn from_flags(exact: bool, tilde: bool, caret: bool, fixed: bool) -> Self {
        if exact {
            RangeModifier::Exact
        } else if tilde {
            RangeModifier::Tilde
        } else if caret {
            RangeModifier::Caret
        } else if fixed {
            RangeModifier::Fixed
        } else {
            RangeModifier::Default
        }
    }

    /// Replace `Default` with the modifier the configured prefix stands for
    pub fn effective(self, configured: Option<SemverRangePrefix>) -> Self {
        match self {
            RangeModifier::Default => match configured.unwrap_or_default() {
                SemverRangePrefix::Caret => RangeModifier::Caret,
                SemverRangePrefix::Tilde => RangeModifier::Tilde,
                SemverRangePrefix::Exact => RangeModifier::Exact,
            },
            other => other,
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            RangeModifier::Caret => "^",
            RangeModifier::Tilde => "~",
            _ => "",
        }
    }
}

/// Computes the text recorded in the manifest for a request
#[derive(Debug, Clone, Default)]
pub struct RangeResolver {
    configured: Option<SemverRangePrefix>,
}

impl RangeResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            configured: config.configured_semver_range_prefix(),
        }
    }

    pub fn with_prefix(configured: Option<SemverRangePrefix>) -> Self {
        Self { configured }
    }

    /// Range for a package resolved from the registry.
    ///
    /// Explicit versions and ranges are kept verbatim. `Fixed` keeps tags
    /// verbatim too; everything else is the modifier applied to `version`.
    pub fn registry_range(
        &self,
        modifier: RangeModifier,
        requested: Option<&RangeSpecifier>,
        version: &Version,
    ) -> String {
        match requested {
            Some(spec) if spec.is_explicit_range() => return spec.to_string(),
            Some(spec @ RangeSpecifier::Protocol { .. }) => return spec.to_string(),
            Some(spec @ RangeSpecifier::Tag(_)) if modifier == RangeModifier::Fixed => {
                return spec.to_string()
            }
            _ => {}
        }

        // Fixed with nothing to keep behaves as if no flag was given
        let modifier = match modifier {
            RangeModifier::Fixed => RangeModifier::Default,
            other => other,
        };
        let modifier = modifier.effective(self.configured);
        format!("{}{}", modifier.prefix(), version)
    }

    /// Range for a package satisfied by a workspace
    pub fn workspace_range(
        &self,
        modifier: RangeModifier,
        requested: Option<&RangeSpecifier>,
    ) -> String {
        match requested {
            Some(RangeSpecifier::Workspace(selector)) => return format!("workspace:{}", selector),
            Some(spec) if spec.is_explicit_range() => return format!("workspace:{}", spec),
            _ => {}
        }

        let modifier = match modifier {
            RangeModifier::Fixed => RangeModifier::Default,
            other => other,
        };
        match modifier.effective(self.configured) {
            RangeModifier::Caret => "workspace:^".to_string(),
            RangeModifier::Tilde => "workspace:~".to_string(),
            _ => "workspace:*".to_string(),
        }
    }
}
