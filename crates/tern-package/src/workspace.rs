//! Workspace discovery and matching
//!
//! Workspaces are found by expanding the glob patterns of the root
//! manifest (and recursively of every workspace that declares its own).
//! Discovery order is stable: patterns in declared order, matches of each
//! pattern sorted, nested workspaces right after their parent.

use crate::descriptor::RangeSpecifier;
use crate::ident::PackageIdent;
use crate::manifest::{Manifest, MANIFEST_FILE};
use crate::version_range::VersionRange;
use crate::{PackageError, Result};
use semver::Version;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A package living inside the project
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceInfo {
    pub ident: PackageIdent,
    pub version: Option<Version>,
    /// Path relative to the project root, `/` separated
    pub path: String,
}

/// What a request demands of a workspace
#[derive(Debug, Clone, PartialEq)]
pub enum WorkspaceConstraint {
    /// No range given, any workspace with the right name will do
    Any,
    /// `workspace:<path>`
    Path(String),
    /// A semver range the workspace version must satisfy
    Range(VersionRange),
}

impl WorkspaceConstraint {
    /// Constraint for a request, `None` when the request can never be a workspace
    pub fn from_request(requested: Option<&RangeSpecifier>) -> Option<Self> {
        match requested {
            None => Some(WorkspaceConstraint::Any),
            Some(RangeSpecifier::Workspace(selector)) => Some(Self::from_selector(selector)),
            Some(spec) if spec.is_explicit_range() => {
                spec.version_range().map(WorkspaceConstraint::Range)
            }
            Some(_) => None,
        }
    }

    fn from_selector(selector: &str) -> Self {
        match selector {
            "" | "*" | "^" | "~" => WorkspaceConstraint::Any,
            _ => match VersionRange::parse(selector) {
                Some(range) => WorkspaceConstraint::Range(range),
                None => WorkspaceConstraint::Path(normalize_path(selector)),
            },
        }
    }

    /// Whether a workspace satisfies the constraint
    pub fn accepts(&self, workspace: &WorkspaceInfo) -> bool {
        match self {
            WorkspaceConstraint::Any => true,
            WorkspaceConstraint::Path(path) => *path == workspace.path,
            WorkspaceConstraint::Range(range) => workspace
                .version
                .as_ref()
                .is_some_and(|version| range.matches(version)),
        }
    }
}

/// Workspaces of a project, in discovery order
#[derive(Debug, Clone, Default)]
pub struct WorkspaceSet {
    workspaces: Vec<WorkspaceInfo>,
    manifests: Vec<Manifest>,
}

impl WorkspaceSet {
    /// Discover every workspace below `root`, whose manifest is `manifest`
    pub fn discover(root: &Path, manifest: &Manifest) -> Result<Self> {
        let mut set = WorkspaceSet::default();
        let mut seen = HashSet::new();
        seen.insert(root.to_path_buf());

        set.discover_under(root, root, manifest.workspaces(), &mut seen)?;

        tracing::debug!(
            root = %root.display(),
            count = set.workspaces.len(),
            "discovered workspaces"
        );
        Ok(set)
    }

    /// Build a set from already known workspaces
    pub fn from_workspaces(workspaces: Vec<WorkspaceInfo>) -> Self {
        Self {
            workspaces,
            manifests: Vec::new(),
        }
    }

    fn discover_under(
        &mut self,
        root: &Path,
        base: &Path,
        patterns: &[String],
        seen: &mut HashSet<PathBuf>,
    ) -> Result<()> {
        let mut excluded = HashSet::new();
        for pattern in patterns.iter().filter_map(|p| p.strip_prefix('!')) {
            excluded.extend(expand(base, pattern)?);
        }

        for pattern in patterns.iter().filter(|p| !p.starts_with('!')) {
            for dir in expand(base, pattern)? {
                if excluded.contains(&dir) || seen.contains(&dir) {
                    continue;
                }

                let manifest_path = dir.join(MANIFEST_FILE);
                if !manifest_path.is_file() {
                    continue;
                }

                let manifest = Manifest::from_file(&manifest_path)?;
                let Some(ident) = manifest.ident() else {
                    tracing::warn!(
                        path = %dir.display(),
                        "skipping workspace without a valid name"
                    );
                    continue;
                };

                let version = manifest.version().and_then(|v| Version::parse(v).ok());
                let path = relative_path(root, &dir);
                seen.insert(dir.clone());

                let nested = manifest.workspaces().to_vec();
                self.workspaces.push(WorkspaceInfo {
                    ident,
                    version,
                    path,
                });
                self.manifests.push(manifest);

                if !nested.is_empty() {
                    self.discover_under(root, &dir, &nested, seen)?;
                }
            }
        }

        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkspaceInfo> {
        self.workspaces.iter()
    }

    pub fn len(&self) -> usize {
        self.workspaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workspaces.is_empty()
    }

    /// Workspace at a root-relative path
    pub fn at_path(&self, path: &str) -> Option<&WorkspaceInfo> {
        self.iter().find(|ws| ws.path == path)
    }

    /// Workspaces paired with their manifests
    pub fn with_manifests(&self) -> impl Iterator<Item = (&WorkspaceInfo, &Manifest)> {
        self.iter().zip(self.manifests.iter())
    }

    /// First workspace named `ident` satisfying `constraint`.
    ///
    /// A package never matches itself: when `requester` is `ident` there is
    /// no match.
    pub fn find_match(
        &self,
        ident: &PackageIdent,
        constraint: &WorkspaceConstraint,
        requester: Option<&PackageIdent>,
    ) -> Option<&WorkspaceInfo> {
        if requester == Some(ident) {
            return None;
        }

        self.iter()
            .filter(|ws| ws.ident == *ident)
            .find(|ws| constraint.accepts(ws))
    }
}

/// Directories matching `pattern` below `base`, sorted
fn expand(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = pattern.trim_end_matches('/');
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&base.to_string_lossy()),
        pattern.trim_start_matches("./")
    );

    let mut dirs: Vec<PathBuf> = glob::glob(&full)
        .map_err(|e| {
            PackageError::invalid_manifest(
                base.join(MANIFEST_FILE),
                format!("invalid workspace pattern '{}': {}", pattern, e),
            )
        })?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

pub(crate) fn relative_path(root: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(root).unwrap_or(dir);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn normalize_path(path: &str) -> String {
    path.trim_start_matches("./")
        .trim_end_matches('/')
        .to_string()
}
