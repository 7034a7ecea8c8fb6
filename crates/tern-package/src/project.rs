//! Project discovery
//!
//! The manifest being edited is the nearest package.json at or above the
//! working directory. The project root is the highest ancestor whose
//! workspaces include that manifest's directory, or the manifest's own
//! directory when no ancestor claims it. The lockfile lives at the root.

use crate::ident::PackageIdent;
use crate::lockfile::{descriptor_key, Lockfile, LOCKFILE_NAME};
use crate::manifest::{Manifest, MANIFEST_FILE};
use crate::workspace::{relative_path, WorkspaceSet};
use crate::{PackageError, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// A loaded project: edited manifest, root, workspaces and lockfile
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    cwd: PathBuf,
    manifest: Manifest,
    lockfile: Lockfile,
    workspaces: WorkspaceSet,
    foreign_references: BTreeSet<String>,
}

impl Project {
    /// Find the project enclosing `start`
    pub fn find(start: &Path) -> Result<Self> {
        let start = start.canonicalize()?;
        let cwd = find_manifest_dir(&start).ok_or_else(|| {
            PackageError::invalid_manifest(
                start.join(MANIFEST_FILE),
                "no package.json found in this directory or any parent",
            )
        })?;
        Self::load(&cwd)
    }

    /// Load the project whose edited manifest lives in `cwd`
    pub fn load(cwd: &Path) -> Result<Self> {
        let manifest = Manifest::from_file(&cwd.join(MANIFEST_FILE))?;

        let (root, workspaces, root_manifest) = match find_enclosing_root(cwd)? {
            Some(found) => found,
            None => {
                let workspaces = WorkspaceSet::discover(cwd, &manifest)?;
                (cwd.to_path_buf(), workspaces, None)
            }
        };

        let lockfile = Lockfile::load_or_default(&root.join(LOCKFILE_NAME))?;

        let own_path = relative_path(&root, cwd);
        let mut foreign_references = BTreeSet::new();
        let others = workspaces
            .with_manifests()
            .filter(|(ws, _)| ws.path != own_path)
            .map(|(_, manifest)| manifest)
            .chain(root_manifest.as_ref());
        for other in others {
            foreign_references.extend(
                other
                    .locked_dependencies()
                    .map(|(name, range)| descriptor_key(name, range)),
            );
        }

        tracing::debug!(
            root = %root.display(),
            cwd = %cwd.display(),
            workspaces = workspaces.len(),
            "loaded project"
        );

        Ok(Self {
            root,
            cwd: cwd.to_path_buf(),
            manifest,
            lockfile,
            workspaces,
            foreign_references,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the edited manifest
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.cwd.join(MANIFEST_FILE)
    }

    pub fn lockfile(&self) -> &Lockfile {
        &self.lockfile
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.root.join(LOCKFILE_NAME)
    }

    pub fn workspaces(&self) -> &WorkspaceSet {
        &self.workspaces
    }

    /// Identifier of the edited package, excluded from workspace matching
    pub fn requester(&self) -> Option<PackageIdent> {
        self.manifest.ident()
    }

    /// Lockfile keys still needed by manifests other than the edited one
    pub fn foreign_references(&self) -> &BTreeSet<String> {
        &self.foreign_references
    }

    pub(crate) fn replace_state(&mut self, manifest: Manifest, lockfile: Lockfile) {
        self.manifest = manifest;
        self.lockfile = lockfile;
    }
}

/// Nearest directory at or above `start` holding a manifest
fn find_manifest_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(MANIFEST_FILE).is_file())
        .map(Path::to_path_buf)
}

/// Highest ancestor of `cwd` that lists it as a workspace
fn find_enclosing_root(cwd: &Path) -> Result<Option<(PathBuf, WorkspaceSet, Option<Manifest>)>> {
    let mut found = None;

    for ancestor in cwd.ancestors().skip(1) {
        let manifest_path = ancestor.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            continue;
        }

        let manifest = match Manifest::from_file(&manifest_path) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::debug!(path = %manifest_path.display(), error = %e, "ignoring unreadable parent manifest");
                continue;
            }
        };
        if manifest.workspaces().is_empty() {
            continue;
        }

        let workspaces = WorkspaceSet::discover(ancestor, &manifest)?;
        if workspaces.at_path(&relative_path(ancestor, cwd)).is_some() {
            found = Some((ancestor.to_path_buf(), workspaces, Some(manifest)));
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), content).unwrap();
    }

    #[test]
    fn test_standalone_project() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), r#"{ "name": "app" }"#);
        fs::create_dir_all(temp.path().join("src/deep")).unwrap();

        let project = Project::find(&temp.path().join("src/deep")).unwrap();
        let root = temp.path().canonicalize().unwrap();
        assert_eq!(project.root(), root);
        assert_eq!(project.cwd(), root);
        assert_eq!(project.requester().unwrap().to_string(), "app");
        assert!(project.workspaces().is_empty());
    }

    #[test]
    fn test_workspace_inside_root() {
        let temp = TempDir::new().unwrap();
        write_manifest(
            temp.path(),
            r#"{ "name": "root", "workspaces": ["packages/*"], "dependencies": { "shared": "^1.0.0" } }"#,
        );
        write_manifest(
            &temp.path().join("packages/a"),
            r#"{ "name": "a", "dependencies": { "mine": "^1.0.0" } }"#,
        );
        write_manifest(
            &temp.path().join("packages/b"),
            r#"{ "name": "b", "devDependencies": { "other": "^2.0.0" } }"#,
        );

        let project = Project::find(&temp.path().join("packages/a")).unwrap();
        let root = temp.path().canonicalize().unwrap();
        assert_eq!(project.root(), root);
        assert_eq!(project.cwd(), root.join("packages/a"));
        assert_eq!(project.lockfile_path(), root.join(LOCKFILE_NAME));
        assert_eq!(project.workspaces().len(), 2);

        let references: Vec<&str> = project.foreign_references().iter().map(String::as_str).collect();
        assert_eq!(references, vec!["other@npm:^2.0.0", "shared@npm:^1.0.0"]);
    }

    #[test]
    fn test_unlisted_directory_is_its_own_root() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), r#"{ "name": "root", "workspaces": ["packages/*"] }"#);
        write_manifest(&temp.path().join("tools/x"), r#"{ "name": "x" }"#);

        let project = Project::find(&temp.path().join("tools/x")).unwrap();
        assert_eq!(project.root(), temp.path().canonicalize().unwrap().join("tools/x"));
    }

    #[test]
    fn test_missing_manifest() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            Project::find(temp.path()),
            Err(PackageError::InvalidManifest { .. })
        ));
    }
}
