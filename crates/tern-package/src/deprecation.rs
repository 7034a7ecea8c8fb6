//! Deprecation notices for freshly resolved packages

use crate::registry::ResolvedCandidate;

/// Line reported for a locator, if its notice warrants one.
///
/// A missing or empty notice is silent; a blank one still reports the
/// deprecation without a reason.
pub fn deprecation_line(locator: &str, notice: Option<&str>) -> Option<String> {
    match notice {
        None | Some("") => None,
        Some(notice) if notice.trim().is_empty() => Some(format!("{} is deprecated", locator)),
        Some(notice) => Some(format!("{} is deprecated: {}", locator, notice)),
    }
}

/// Deprecation lines collected over one operation, in request order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeprecationReport {
    lines: Vec<String>,
}

impl DeprecationReport {
    pub fn from_candidates<'a, I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = &'a ResolvedCandidate>,
    {
        let lines = candidates
            .into_iter()
            .filter_map(|candidate| {
                deprecation_line(&candidate.locator(), candidate.deprecation.as_deref())
            })
            .collect();
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}
