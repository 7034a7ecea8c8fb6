//! Package artifact cache
//!
//! Artifacts are stored flat under the cache root as
//! `<slug>-<protocol>-<version>-<hash>.tgz`, `hash` being the first
//! characters of the artifact sha256. The cache may live inside the
//! project or be shared between projects; eviction only ever happens in
//! the first case.

use crate::ident::PackageIdent;
use crate::{PackageError, Result};
use semver::Version;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Characters of the checksum kept in file names
const HASH_LENGTH: usize = 10;

const ARTIFACT_EXTENSION: &str = ".tgz";

/// Compute the sha256 of a byte slice as lowercase hex
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// A verified artifact on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub ident: PackageIdent,
    pub protocol: String,
    pub version: Version,
    /// Full sha256 of the artifact
    pub checksum: String,
    pub path: PathBuf,
}

/// What to do with superseded artifacts after an upgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionDecision {
    /// The resolved version did not change
    Unchanged,
    /// The cache lives outside the project and may serve other projects
    Shared,
    /// Superseded artifacts can be removed
    Evict,
}

/// Flat artifact store
#[derive(Debug, Clone)]
pub struct PackageCache {
    root: PathBuf,
}

impl PackageCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name an artifact is stored under
    pub fn file_name(ident: &PackageIdent, protocol: &str, version: &Version, checksum: &str) -> String {
        let hash = &checksum[..checksum.len().min(HASH_LENGTH)];
        format!(
            "{}-{}-{}-{}{}",
            ident.slug(),
            protocol,
            version,
            hash,
            ARTIFACT_EXTENSION
        )
    }

    /// Enumerate artifacts by name; the version part must be valid semver
    fn artifacts(&self, ident: &PackageIdent, protocol: &str) -> Result<Vec<(Version, PathBuf)>> {
        let read_dir = match fs::read_dir(&self.root) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let prefix = format!("{}-{}-", ident.slug(), protocol);
        let mut artifacts = Vec::new();

        for entry in read_dir {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };

            let version = file_name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(ARTIFACT_EXTENSION))
                .and_then(|rest| rest.rsplit_once('-'))
                .and_then(|(version, _)| Version::parse(version).ok());

            if let Some(version) = version {
                artifacts.push((version, entry.path()));
            }
        }

        artifacts.sort();
        Ok(artifacts)
    }

    /// Find a cached artifact whose content matches `expected`.
    ///
    /// Artifacts failing the check are deleted so they get fetched again.
    pub fn lookup(
        &self,
        ident: &PackageIdent,
        protocol: &str,
        version: &Version,
        expected: Option<&str>,
    ) -> Result<Option<CacheEntry>> {
        for (cached_version, path) in self.artifacts(ident, protocol)? {
            if cached_version != *version {
                continue;
            }

            let checksum = sha256_hex(&fs::read(&path)?);
            if expected.is_some_and(|expected| expected != checksum) {
                tracing::warn!(path = %path.display(), "discarding corrupted cache entry");
                fs::remove_file(&path)?;
                continue;
            }

            return Ok(Some(CacheEntry {
                ident: ident.clone(),
                protocol: protocol.to_string(),
                version: cached_version,
                checksum,
                path,
            }));
        }

        Ok(None)
    }

    /// Verify and store an artifact
    pub fn store(
        &self,
        ident: &PackageIdent,
        protocol: &str,
        version: &Version,
        bytes: &[u8],
        expected: Option<&str>,
    ) -> Result<CacheEntry> {
        let checksum = sha256_hex(bytes);
        if let Some(expected) = expected {
            if expected != checksum {
                return Err(PackageError::FetchIntegrity {
                    locator: format!("{}@{}:{}", ident, protocol, version),
                    expected: expected.to_string(),
                    actual: checksum,
                });
            }
        }

        fs::create_dir_all(&self.root)?;
        let path = self
            .root
            .join(Self::file_name(ident, protocol, version, &checksum));

        let mut file = tempfile::NamedTempFile::new_in(&self.root)?;
        file.write_all(bytes)?;
        file.persist(&path).map_err(|e| PackageError::IoError(e.error))?;

        tracing::debug!(path = %path.display(), "stored artifact");

        Ok(CacheEntry {
            ident: ident.clone(),
            protocol: protocol.to_string(),
            version: version.clone(),
            checksum,
            path,
        })
    }

    /// Whether the cache root resolves to a location inside `project_root`
    pub fn is_within(&self, project_root: &Path) -> bool {
        match (self.root.canonicalize(), project_root.canonicalize()) {
            (Ok(cache), Ok(project)) => cache.starts_with(project),
            _ => false,
        }
    }

    /// Decide whether an upgrade from `previous` to `new` may evict artifacts
    pub fn eviction_decision(
        &self,
        previous: Option<&Version>,
        new: &Version,
        project_root: &Path,
    ) -> EvictionDecision {
        match previous {
            None => EvictionDecision::Unchanged,
            Some(previous) if previous == new => EvictionDecision::Unchanged,
            Some(_) if !self.is_within(project_root) => EvictionDecision::Shared,
            Some(_) => EvictionDecision::Evict,
        }
    }

    /// Remove artifacts of `ident` whose version is not in `keep`.
    ///
    /// Only files that resolve inside the cache root are touched.
    pub fn evict(
        &self,
        ident: &PackageIdent,
        protocol: &str,
        keep: &BTreeSet<Version>,
    ) -> Result<Vec<PathBuf>> {
        let root = match self.root.canonicalize() {
            Ok(root) => root,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut removed = Vec::new();
        for (version, path) in self.artifacts(ident, protocol)? {
            if keep.contains(&version) {
                continue;
            }

            let resolved = path.canonicalize()?;
            if !resolved.starts_with(&root) {
                tracing::warn!(path = %path.display(), "refusing to evict outside the cache");
                continue;
            }

            fs::remove_file(&path)?;
            tracing::info!(path = %path.display(), "evicted superseded artifact");
            removed.push(path);
        }

        Ok(removed)
    }
}
