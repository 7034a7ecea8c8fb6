//! Package lockfile (tern.lock)
//!
//! Keys are descriptors (`ident@protocol:range`), values pin the locator a
//! descriptor resolved to. Entries are kept in a sorted map so the file is
//! byte-stable across runs.

use crate::descriptor::RangeSpecifier;
use crate::ident::PackageIdent;
use crate::manifest::write_atomic;
use crate::{PackageError, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Lockfile name at the project root
pub const LOCKFILE_NAME: &str = "tern.lock";

/// Lockfile structure (tern.lock)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lockfile {
    /// Lockfile format version
    pub version: u32,
    /// Descriptor key -> pinned resolution
    #[serde(default)]
    pub entries: BTreeMap<String, LockEntry>,
}

/// One pinned resolution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockEntry {
    /// Locator, e.g. `no-deps@npm:1.0.0`
    pub resolution: String,
    /// Resolved version
    pub version: Version,
    /// sha256 of the cached artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Dependencies of the resolved package, induced ones included
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
}

impl LockEntry {
    /// Protocol the resolution was made with (`npm`, `workspace`, `file`...)
    pub fn protocol(&self) -> Option<&str> {
        let (_, range) = split_descriptor(&self.resolution)?;
        range.split_once(':').map(|(protocol, _)| protocol)
    }
}

impl Lockfile {
    /// Current lockfile format version
    pub const VERSION: u32 = 1;

    /// Create new empty lockfile
    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Parse lockfile from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let lockfile: Lockfile = toml::from_str(content)?;
        lockfile.verify().map_err(PackageError::InvalidLockfile)?;
        Ok(lockfile)
    }

    /// Load lockfile from file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load lockfile, or start an empty one when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Serialize to TOML string
    pub fn to_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write lockfile to file, skipping the write when nothing changed.
    ///
    /// Returns whether the file was written.
    pub fn write_if_changed(&self, path: &Path) -> Result<bool> {
        let content = self.to_string()?;
        match std::fs::read_to_string(path) {
            Ok(existing) if existing == content => return Ok(false),
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        write_atomic(path, content.as_bytes())?;
        Ok(true)
    }

    /// Add or replace an entry
    pub fn insert(&mut self, key: String, entry: LockEntry) -> Option<LockEntry> {
        self.entries.insert(key, entry)
    }

    /// Look up an entry by descriptor key
    pub fn get(&self, key: &str) -> Option<&LockEntry> {
        self.entries.get(key)
    }

    /// Entries whose key names `ident`
    pub fn entries_for<'a>(
        &'a self,
        ident: &'a PackageIdent,
    ) -> impl Iterator<Item = (&'a String, &'a LockEntry)> + 'a {
        let name = ident.to_string();
        self.entries.iter().filter(move |(key, _)| {
            split_descriptor(key).is_some_and(|(key_ident, _)| key_ident == name)
        })
    }

    /// Versions locked for `ident` under one protocol
    pub fn versions_of(&self, ident: &PackageIdent, protocol: &str) -> BTreeSet<Version> {
        self.entries_for(ident)
            .filter(|(_, entry)| entry.protocol() == Some(protocol))
            .map(|(_, entry)| entry.version.clone())
            .collect()
    }

    /// Drop entries of `idents` whose key is not in `referenced`.
    ///
    /// Returns the removed keys.
    pub fn prune(
        &mut self,
        idents: &BTreeSet<PackageIdent>,
        referenced: &BTreeSet<String>,
    ) -> Vec<String> {
        let names: BTreeSet<String> = idents.iter().map(ToString::to_string).collect();
        let stale: Vec<String> = self
            .entries
            .keys()
            .filter(|key| {
                split_descriptor(key).is_some_and(|(ident, _)| names.contains(ident))
                    && !referenced.contains(*key)
            })
            .cloned()
            .collect();

        for key in &stale {
            self.entries.remove(key);
        }
        stale
    }

    /// Verify lockfile integrity
    pub fn verify(&self) -> std::result::Result<(), String> {
        if self.version > Self::VERSION {
            return Err(format!(
                "Lockfile version {} is newer than supported version {}",
                self.version,
                Self::VERSION
            ));
        }

        for (key, entry) in &self.entries {
            let (key_ident, _) = split_descriptor(key)
                .ok_or_else(|| format!("Malformed lockfile key: {}", key))?;
            let (resolution_ident, _) = split_descriptor(&entry.resolution)
                .ok_or_else(|| format!("Malformed resolution for {}: {}", key, entry.resolution))?;
            if key_ident != resolution_ident {
                return Err(format!(
                    "Entry {} resolves to a different package: {}",
                    key, entry.resolution
                ));
            }
        }

        Ok(())
    }
}

impl Default for Lockfile {
    fn default() -> Self {
        Self::new()
    }
}

/// Lockfile key for a manifest entry; ranges without a protocol are `npm:`
pub fn descriptor_key(ident: &str, range: &str) -> String {
    let selector = match RangeSpecifier::parse(range) {
        Ok(spec) => spec.with_protocol(),
        Err(_) => format!("npm:{}", range),
    };
    format!("{}@{}", ident, selector)
}

/// Split `ident@range`, honouring a leading scope `@`
pub fn split_descriptor(descriptor: &str) -> Option<(&str, &str)> {
    let start = usize::from(descriptor.starts_with('@'));
    let at = descriptor[start..].find('@')? + start;
    Some((&descriptor[..at], &descriptor[at + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn entry(resolution: &str, version: &str) -> LockEntry {
        LockEntry {
            resolution: resolution.to_string(),
            version: Version::parse(version).unwrap(),
            checksum: None,
            dependencies: BTreeMap::new(),
        }
    }

    fn ident(name: &str) -> PackageIdent {
        PackageIdent::parse(name).unwrap()
    }

    #[test]
    fn test_new_lockfile() {
        let lockfile = Lockfile::new();
        assert_eq!(lockfile.version, Lockfile::VERSION);
        assert!(lockfile.entries.is_empty());
    }

    #[test]
    fn test_descriptor_key_normalization() {
        assert_eq!(descriptor_key("no-deps", "^1.0.0"), "no-deps@npm:^1.0.0");
        assert_eq!(descriptor_key("no-deps", "npm:^1.0.0"), "no-deps@npm:^1.0.0");
        assert_eq!(descriptor_key("@s/x", "workspace:^"), "@s/x@workspace:^");
        assert_eq!(descriptor_key("x", "./x"), "x@file:./x");
    }

    #[test]
    fn test_split_descriptor() {
        assert_eq!(split_descriptor("a@npm:1.0.0"), Some(("a", "npm:1.0.0")));
        assert_eq!(split_descriptor("@s/a@npm:1.0.0"), Some(("@s/a", "npm:1.0.0")));
        assert_eq!(split_descriptor("@s/a"), None);
    }

    #[test]
    fn test_entry_protocol() {
        assert_eq!(entry("a@npm:1.0.0", "1.0.0").protocol(), Some("npm"));
        assert_eq!(
            entry("@s/a@workspace:packages/a", "1.0.0").protocol(),
            Some("workspace")
        );
    }

    #[test]
    fn test_round_trip_is_byte_stable() {
        let mut lockfile = Lockfile::new();
        let mut pinned = entry("no-deps@npm:2.0.0", "2.0.0");
        pinned.checksum = Some("abc".to_string());
        pinned.dependencies.insert("node-gyp".to_string(), "npm:latest".to_string());
        lockfile.insert("no-deps@npm:^2.0.0".to_string(), pinned);
        lockfile.insert("a@npm:^1.0.0".to_string(), entry("a@npm:1.0.0", "1.0.0"));

        let text = lockfile.to_string().unwrap();
        let parsed = Lockfile::from_str(&text).unwrap();
        assert_eq!(parsed, lockfile);
        assert_eq!(parsed.to_string().unwrap(), text);
        assert!(text.find("a@npm:^1.0.0").unwrap() < text.find("no-deps@npm:^2.0.0").unwrap());
    }

    #[test]
    fn test_rejects_newer_version() {
        assert!(matches!(
            Lockfile::from_str("version = 99\n"),
            Err(PackageError::InvalidLockfile(_))
        ));
    }

    #[test]
    fn test_rejects_mismatched_resolution() {
        let mut lockfile = Lockfile::new();
        lockfile.insert("a@npm:^1.0.0".to_string(), entry("b@npm:1.0.0", "1.0.0"));
        assert!(lockfile.verify().is_err());
    }

    #[test]
    fn test_versions_of_filters_protocol() {
        let mut lockfile = Lockfile::new();
        lockfile.insert("a@npm:^1.0.0".to_string(), entry("a@npm:1.2.0", "1.2.0"));
        lockfile.insert("a@npm:^2.0.0".to_string(), entry("a@npm:2.0.0", "2.0.0"));
        lockfile.insert("a@workspace:^".to_string(), entry("a@workspace:packages/a", "3.0.0"));
        lockfile.insert("ab@npm:^1.0.0".to_string(), entry("ab@npm:1.0.0", "1.0.0"));

        let versions: Vec<String> = lockfile
            .versions_of(&ident("a"), "npm")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(versions, vec!["1.2.0", "2.0.0"]);
    }

    #[test]
    fn test_prune_keeps_referenced_and_foreign() {
        let mut lockfile = Lockfile::new();
        lockfile.insert("a@npm:^1.0.0".to_string(), entry("a@npm:1.0.0", "1.0.0"));
        lockfile.insert("a@npm:^2.0.0".to_string(), entry("a@npm:2.0.0", "2.0.0"));
        lockfile.insert("b@npm:^1.0.0".to_string(), entry("b@npm:1.0.0", "1.0.0"));

        let idents = BTreeSet::from([ident("a")]);
        let referenced = BTreeSet::from(["a@npm:^2.0.0".to_string()]);
        let removed = lockfile.prune(&idents, &referenced);

        assert_eq!(removed, vec!["a@npm:^1.0.0".to_string()]);
        assert!(lockfile.get("a@npm:^2.0.0").is_some());
        assert!(lockfile.get("b@npm:^1.0.0").is_some());
    }

    #[test]
    fn test_write_if_changed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LOCKFILE_NAME);
        let lockfile = Lockfile::new();

        assert!(lockfile.write_if_changed(&path).unwrap());
        assert!(!lockfile.write_if_changed(&path).unwrap());
        assert_eq!(Lockfile::load_or_default(&path).unwrap(), lockfile);
    }

    #[test]
    fn test_load_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let lockfile = Lockfile::load_or_default(&temp.path().join(LOCKFILE_NAME)).unwrap();
        assert!(lockfile.entries.is_empty());
    }
}
