//! Package identifiers (`name` or `@scope/name`)

use crate::{PackageError, Result};
use std::fmt;

/// Longest identifier the registry accepts
const MAX_IDENT_LENGTH: usize = 214;

/// A package identifier: optional scope plus name.
///
/// Equality is case-sensitive over the (scope, name) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageIdent {
    scope: Option<String>,
    name: String,
}

impl PackageIdent {
    /// Parse `name` or `@scope/name`
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Err(PackageError::malformed(input, "package name cannot be empty"));
        }

        if input.len() > MAX_IDENT_LENGTH {
            return Err(PackageError::malformed(
                input,
                format!("package name exceeds {} characters", MAX_IDENT_LENGTH),
            ));
        }

        let (scope, name) = match input.strip_prefix('@') {
            Some(scoped) => {
                let (scope, name) = scoped.split_once('/').ok_or_else(|| {
                    PackageError::malformed(input, "scoped names must look like @scope/name")
                })?;
                validate_part(input, scope, "scope")?;
                (Some(scope.to_string()), name)
            }
            None => (None, input),
        };

        validate_part(input, name, "name")?;

        Ok(Self {
            scope,
            name: name.to_string(),
        })
    }

    /// Scope without the leading `@`
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Name without the scope
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File-system friendly form: `@scope/name` becomes `@scope-name`
    pub fn slug(&self) -> String {
        match &self.scope {
            Some(scope) => format!("@{}-{}", scope, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for PackageIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "@{}/{}", scope, self.name),
            None => f.write_str(&self.name),
        }
    }
}

fn validate_part(input: &str, part: &str, what: &str) -> Result<()> {
    if part.is_empty() {
        return Err(PackageError::malformed(
            input,
            format!("package {} cannot be empty", what),
        ));
    }

    if part.starts_with('.') || part.starts_with('_') {
        return Err(PackageError::malformed(
            input,
            format!("package {} cannot start with '.' or '_'", what),
        ));
    }

    if let Some(bad) = part
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')))
    {
        return Err(PackageError::malformed(
            input,
            format!("invalid character '{}' in package {}", bad, what),
        ));
    }

    Ok(())
}
