//! The `defaultSemverRangePrefix` setting

use crate::{ConfigError, ConfigResult};
use std::fmt;
use std::str::FromStr;

/// Range prefix applied to a resolved version when no modifier flag is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SemverRangePrefix {
    /// `^1.2.3`
    #[default]
    Caret,
    /// `~1.2.3`
    Tilde,
    /// `1.2.3`
    Exact,
}

impl SemverRangePrefix {
    /// Every accepted spelling, in the order shown in error messages
    pub const ACCEPTED: [&'static str; 3] = ["^", "~", ""];

    /// The prefix as written in a range
    pub fn as_str(&self) -> &'static str {
        match self {
            SemverRangePrefix::Caret => "^",
            SemverRangePrefix::Tilde => "~",
            SemverRangePrefix::Exact => "",
        }
    }

    /// Parse a persisted prefix value
    pub fn parse(value: &str) -> ConfigResult<Self> {
        match value {
            "^" => Ok(SemverRangePrefix::Caret),
            "~" => Ok(SemverRangePrefix::Tilde),
            "" => Ok(SemverRangePrefix::Exact),
            other => Err(ConfigError::InvalidValue {
                field: "defaultSemverRangePrefix".to_string(),
                reason: format!("must be '^', '~', or '', got '{}'", other),
            }),
        }
    }
}

impl FromStr for SemverRangePrefix {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SemverRangePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
