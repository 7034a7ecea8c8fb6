//! Package resolution
//!
//! The add pipeline talks to a [`PackageResolver`]. The default one reads
//! package metadata and artifacts from a registry laid out on disk:
//!
//! ```text
//! <registry>/no-deps.json
//! <registry>/@scope/name.json
//! ```
//!
//! Each metadata file carries `dist-tags` and a `versions` map with the
//! dependencies, scripts, deprecation notice and artifact of each version.

use crate::cache::{CacheEntry, PackageCache};
use crate::descriptor::RangeSpecifier;
use crate::ident::PackageIdent;
use crate::lockfile::descriptor_key;
use crate::{PackageError, Result};
use semver::Version;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const REGISTRY_PROTOCOL: &str = "npm";

/// Lifecycle scripts that run when a package is installed
const INSTALL_SCRIPTS: &[&str] = &["preinstall", "install", "postinstall"];

const NODE_GYP: &str = "node-gyp";

/// A dependency added to a package on top of what it declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InducedDependency {
    pub ident: PackageIdent,
    pub range: String,
}

/// Result of resolving one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCandidate {
    pub ident: PackageIdent,
    pub protocol: String,
    pub version: Version,
    /// Dependencies as declared by the package
    pub dependencies: BTreeMap<String, String>,
    pub induced: Vec<InducedDependency>,
    pub deprecation: Option<String>,
    /// sha256 of the fetched artifact
    pub checksum: Option<String>,
}

impl ResolvedCandidate {
    /// `ident@protocol:version`
    pub fn locator(&self) -> String {
        format!("{}@{}:{}", self.ident, self.protocol, self.version)
    }

    /// Dependencies to pin in the lockfile, induced ones included
    pub fn lock_dependencies(&self) -> BTreeMap<String, String> {
        let mut dependencies: BTreeMap<String, String> = self
            .dependencies
            .iter()
            .map(|(name, range)| {
                let key = descriptor_key(name, range);
                let selector = key[name.len() + 1..].to_string();
                (name.clone(), selector)
            })
            .collect();

        for induced in &self.induced {
            dependencies
                .entry(induced.ident.to_string())
                .or_insert_with(|| induced.range.clone());
        }
        dependencies
    }
}

/// Resolves a request to a concrete, fetched package
pub trait PackageResolver: Send + Sync {
    fn resolve(
        &self,
        ident: &PackageIdent,
        requested: Option<&RangeSpecifier>,
    ) -> Result<ResolvedCandidate>;
}

#[derive(Debug, Deserialize)]
struct PackageMetadata {
    #[serde(default, rename = "dist-tags")]
    dist_tags: BTreeMap<String, String>,
    #[serde(default)]
    versions: BTreeMap<String, VersionMetadata>,
}

#[derive(Debug, Deserialize)]
struct VersionMetadata {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    scripts: BTreeMap<String, String>,
    #[serde(default)]
    deprecated: Option<String>,
    #[serde(default)]
    dist: Option<DistMetadata>,
}

#[derive(Debug, Deserialize)]
struct DistMetadata {
    tarball: String,
    #[serde(default)]
    integrity: Option<String>,
}

/// Registry stored as plain files
#[derive(Debug, Clone)]
pub struct LocalRegistry {
    root: PathBuf,
    cache: PackageCache,
}

impl LocalRegistry {
    pub fn new(root: impl Into<PathBuf>, cache: PackageCache) -> Self {
        Self {
            root: root.into(),
            cache,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn metadata_path(&self, ident: &PackageIdent) -> PathBuf {
        let file = format!("{}.json", ident.name());
        match ident.scope() {
            Some(scope) => self.root.join(format!("@{}", scope)).join(file),
            None => self.root.join(file),
        }
    }

    fn load_metadata(&self, ident: &PackageIdent) -> Result<PackageMetadata> {
        let path = self.metadata_path(ident);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PackageError::Resolution(format!(
                    "Package {} not found in registry {}",
                    ident,
                    self.root.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    fn select_version(
        &self,
        metadata: &PackageMetadata,
        ident: &PackageIdent,
        requested: Option<&RangeSpecifier>,
    ) -> Result<Version> {
        match requested {
            None => self.select_tag(metadata, ident, "latest"),
            Some(RangeSpecifier::Tag(tag)) => self.select_tag(metadata, ident, tag),
            Some(RangeSpecifier::Protocol { protocol, selector }) if protocol == REGISTRY_PROTOCOL => {
                let inner = RangeSpecifier::parse(selector)?;
                match inner {
                    RangeSpecifier::Exact(_) | RangeSpecifier::Range(_) | RangeSpecifier::Tag(_) => {
                        self.select_version(metadata, ident, Some(&inner))
                    }
                    _ => Err(PackageError::Resolution(format!(
                        "Unsupported npm selector '{}' for {}",
                        selector, ident
                    ))),
                }
            }
            Some(spec @ (RangeSpecifier::Exact(_) | RangeSpecifier::Range(_))) => {
                let range = spec.version_range().ok_or_else(|| {
                    PackageError::Resolution(format!("Invalid range {} for {}", spec, ident))
                })?;
                let versions: Vec<Version> = metadata
                    .versions
                    .keys()
                    .filter_map(|v| Version::parse(v).ok())
                    .collect();
                range.max_satisfying(&versions).cloned().ok_or_else(|| {
                    PackageError::Resolution(format!(
                        "No candidates found for {}@{}",
                        ident, spec
                    ))
                })
            }
            Some(RangeSpecifier::Protocol { protocol, .. }) => Err(PackageError::Resolution(
                format!("Unsupported protocol '{}' for {}", protocol, ident),
            )),
            Some(spec) => Err(PackageError::Resolution(format!(
                "{}@{} cannot be resolved from the registry",
                ident, spec
            ))),
        }
    }

    fn select_tag(&self, metadata: &PackageMetadata, ident: &PackageIdent, tag: &str) -> Result<Version> {
        let version = metadata.dist_tags.get(tag).ok_or_else(|| {
            PackageError::Resolution(format!("No dist-tag '{}' found for {}", tag, ident))
        })?;
        Version::parse(version).map_err(|e| {
            PackageError::Resolution(format!(
                "dist-tag '{}' of {} points to invalid version {}: {}",
                tag, ident, version, e
            ))
        })
    }

    /// Artifact from the cache, or copied into it from the registry
    fn fetch(&self, ident: &PackageIdent, version: &Version, dist: &DistMetadata) -> Result<CacheEntry> {
        let expected = dist.integrity.as_deref();
        if let Some(entry) = self.cache.lookup(ident, REGISTRY_PROTOCOL, version, expected)? {
            tracing::debug!(%ident, %version, "cache hit");
            return Ok(entry);
        }

        let tarball = self.root.join(&dist.tarball);
        let mut retried = false;
        loop {
            let bytes = std::fs::read(&tarball).map_err(|e| {
                PackageError::Resolution(format!(
                    "Failed to fetch {}: {}",
                    tarball.display(),
                    e
                ))
            })?;

            match self.cache.store(ident, REGISTRY_PROTOCOL, version, &bytes, expected) {
                Err(PackageError::FetchIntegrity { .. }) if !retried => {
                    tracing::warn!(%ident, %version, "integrity mismatch, fetching again");
                    retried = true;
                }
                result => return result,
            }
        }
    }
}

impl PackageResolver for LocalRegistry {
    fn resolve(
        &self,
        ident: &PackageIdent,
        requested: Option<&RangeSpecifier>,
    ) -> Result<ResolvedCandidate> {
        let metadata = self.load_metadata(ident)?;
        let version = self.select_version(&metadata, ident, requested)?;

        let version_metadata = metadata.versions.get(&version.to_string()).ok_or_else(|| {
            PackageError::Resolution(format!("No metadata for {}@{}", ident, version))
        })?;

        let checksum = match &version_metadata.dist {
            Some(dist) => Some(self.fetch(ident, &version, dist)?.checksum),
            None => None,
        };

        tracing::info!(%ident, %version, "resolved");

        Ok(ResolvedCandidate {
            ident: ident.clone(),
            protocol: REGISTRY_PROTOCOL.to_string(),
            version,
            dependencies: version_metadata.dependencies.clone(),
            induced: induced_dependencies(version_metadata)?,
            deprecation: version_metadata.deprecated.clone(),
            checksum,
        })
    }
}

/// Packages building native code through install scripts need node-gyp
fn induced_dependencies(metadata: &VersionMetadata) -> Result<Vec<InducedDependency>> {
    if metadata.dependencies.contains_key(NODE_GYP) {
        return Ok(Vec::new());
    }

    let uses_node_gyp = INSTALL_SCRIPTS.iter().any(|name| {
        metadata
            .scripts
            .get(*name)
            .is_some_and(|script| script.contains(NODE_GYP))
    });

    if !uses_node_gyp {
        return Ok(Vec::new());
    }

    Ok(vec![InducedDependency {
        ident: PackageIdent::parse(NODE_GYP)?,
        range: "npm:latest".to_string(),
    }])
}
