//! Package manifest (package.json)
//!
//! The manifest is kept as an ordered JSON object so that fields tern does
//! not manage are written back untouched and in place. Only the three
//! dependency sections are modelled; they are always written sorted.

use crate::classification::Classification;
use crate::ident::PackageIdent;
use crate::{PackageError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Manifest file name
pub const MANIFEST_FILE: &str = "package.json";

const DEFAULT_INDENT: &str = "  ";

/// A parsed package.json
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    raw: Map<String, Value>,
    indent: String,
    name: Option<String>,
    version: Option<String>,
    workspaces: Vec<String>,
    dependencies: BTreeMap<String, String>,
    dev_dependencies: BTreeMap<String, String>,
    peer_dependencies: BTreeMap<String, String>,
}

impl Manifest {
    /// Parse manifest content
    pub fn from_str(content: &str) -> Result<Self> {
        Self::parse(content, Path::new(MANIFEST_FILE))
    }

    /// Load a manifest from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let raw = match serde_json::from_str::<Value>(content)? {
            Value::Object(map) => map,
            _ => return Err(PackageError::invalid_manifest(path, "top level must be an object")),
        };

        let name = optional_string(&raw, "name", path)?;
        let version = optional_string(&raw, "version", path)?;

        let workspaces = match raw.get("workspaces") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => string_list(items, path)?,
            Some(Value::Object(obj)) => match obj.get("packages") {
                Some(Value::Array(items)) => string_list(items, path)?,
                None => Vec::new(),
                Some(_) => {
                    return Err(PackageError::invalid_manifest(
                        path,
                        "workspaces.packages must be an array of strings",
                    ))
                }
            },
            Some(_) => {
                return Err(PackageError::invalid_manifest(
                    path,
                    "workspaces must be an array or an object",
                ))
            }
        };

        Ok(Self {
            indent: detect_indent(content),
            name,
            version,
            workspaces,
            dependencies: dependency_map(&raw, Classification::Regular, path)?,
            dev_dependencies: dependency_map(&raw, Classification::Development, path)?,
            peer_dependencies: dependency_map(&raw, Classification::Peer, path)?,
            raw,
        })
    }

    /// Raw `name` field
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Parsed package identifier, if the name is present and valid
    pub fn ident(&self) -> Option<PackageIdent> {
        self.name.as_deref().and_then(|name| PackageIdent::parse(name).ok())
    }

    /// Raw `version` field
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Workspace glob patterns, in declared order
    pub fn workspaces(&self) -> &[String] {
        &self.workspaces
    }

    /// Entries of one dependency section
    pub fn dependencies(&self, classification: Classification) -> &BTreeMap<String, String> {
        match classification {
            Classification::Regular => &self.dependencies,
            Classification::Development => &self.dev_dependencies,
            Classification::Peer => &self.peer_dependencies,
        }
    }

    fn dependencies_mut(&mut self, classification: Classification) -> &mut BTreeMap<String, String> {
        match classification {
            Classification::Regular => &mut self.dependencies,
            Classification::Development => &mut self.dev_dependencies,
            Classification::Peer => &mut self.peer_dependencies,
        }
    }

    /// Whether `ident` is listed in a section
    pub fn contains(&self, classification: Classification, ident: &PackageIdent) -> bool {
        self.dependencies(classification)
            .contains_key(&ident.to_string())
    }

    /// Range recorded for `ident` in a section
    pub fn range_of(&self, classification: Classification, ident: &PackageIdent) -> Option<&str> {
        self.dependencies(classification)
            .get(&ident.to_string())
            .map(String::as_str)
    }

    /// Record `ident@range` in a section, returning the previous range
    pub fn set_dependency(
        &mut self,
        classification: Classification,
        ident: &PackageIdent,
        range: impl Into<String>,
    ) -> Option<String> {
        self.dependencies_mut(classification)
            .insert(ident.to_string(), range.into())
    }

    /// `(ident, range)` pairs the lockfile must be able to answer
    pub fn locked_dependencies(&self) -> impl Iterator<Item = (&str, &str)> {
        self.dependencies
            .iter()
            .chain(self.dev_dependencies.iter())
            .map(|(name, range)| (name.as_str(), range.as_str()))
    }

    /// Serialize, keeping field order and indentation
    pub fn to_string(&self) -> Result<String> {
        let mut raw = self.raw.clone();

        for classification in Classification::ALL {
            let entries = self.dependencies(classification);
            let field = classification.field();
            if entries.is_empty() && !raw.contains_key(field) {
                continue;
            }

            let section = entries
                .iter()
                .map(|(name, range)| (name.clone(), Value::String(range.clone())))
                .collect::<Map<_, _>>();
            // Existing keys keep their position
            raw.insert(field.to_string(), Value::Object(section));
        }

        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(self.indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        Value::Object(raw).serialize(&mut serializer)?;
        out.push(b'\n');

        String::from_utf8(out).map_err(|e| PackageError::invalid_manifest(MANIFEST_FILE, e))
    }

    /// Atomically write the manifest to `path`
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.to_string()?.as_bytes())
    }
}

/// Replace `path` with `content` through a temporary sibling file
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(content)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| PackageError::IoError(e.error))?;
    Ok(())
}

fn optional_string(raw: &Map<String, Value>, field: &str, path: &Path) -> Result<Option<String>> {
    match raw.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(PackageError::invalid_manifest(
            path,
            format!("{} must be a string", field),
        )),
    }
}

fn string_list(items: &[Value], path: &Path) -> Result<Vec<String>> {
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            _ => Err(PackageError::invalid_manifest(
                path,
                "workspace patterns must be strings",
            )),
        })
        .collect()
}

fn dependency_map(
    raw: &Map<String, Value>,
    classification: Classification,
    path: &Path,
) -> Result<BTreeMap<String, String>> {
    let field = classification.field();
    match raw.get(field) {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(entries)) => entries
            .iter()
            .map(|(name, range)| match range {
                Value::String(range) => Ok((name.clone(), range.clone())),
                _ => Err(PackageError::invalid_manifest(
                    path,
                    format!("{}.{} must be a string", field, name),
                )),
            })
            .collect(),
        Some(_) => Err(PackageError::invalid_manifest(
            path,
            format!("{} must be an object", field),
        )),
    }
}

/// Indentation of the first indented line, two spaces when there is none
fn detect_indent(content: &str) -> String {
    content
        .lines()
        .skip(1)
        .find_map(|line| {
            let indent: String = line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
            (!indent.is_empty() && indent.len() < line.len()).then_some(indent)
        })
        .unwrap_or_else(|| DEFAULT_INDENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn ident(name: &str) -> PackageIdent {
        PackageIdent::parse(name).unwrap()
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest = Manifest::from_str(r#"{ "name": "app", "version": "1.0.0" }"#).unwrap();
        assert_eq!(manifest.name(), Some("app"));
        assert_eq!(manifest.version(), Some("1.0.0"));
        assert!(manifest.workspaces().is_empty());
        assert!(manifest.dependencies(Classification::Regular).is_empty());
    }

    #[test]
    fn test_parse_workspaces_shapes() {
        let list = Manifest::from_str(r#"{ "workspaces": ["packages/*"] }"#).unwrap();
        assert_eq!(list.workspaces(), ["packages/*".to_string()]);

        let object =
            Manifest::from_str(r#"{ "workspaces": { "packages": ["a", "b/*"] } }"#).unwrap();
        assert_eq!(object.workspaces(), ["a".to_string(), "b/*".to_string()]);
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(matches!(
            Manifest::from_str("[]"),
            Err(PackageError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_rejects_non_string_range() {
        assert!(Manifest::from_str(r#"{ "dependencies": { "a": 1 } }"#).is_err());
    }

    #[test]
    fn test_unrelated_fields_keep_their_place() {
        let content = "{\n  \"name\": \"app\",\n  \"dependencies\": {\n    \"b\": \"^1.0.0\"\n  },\n  \"scripts\": {\n    \"test\": \"run\"\n  }\n}\n";
        let mut manifest = Manifest::from_str(content).unwrap();
        manifest.set_dependency(Classification::Regular, &ident("a"), "^2.0.0");

        let expected = "{\n  \"name\": \"app\",\n  \"dependencies\": {\n    \"a\": \"^2.0.0\",\n    \"b\": \"^1.0.0\"\n  },\n  \"scripts\": {\n    \"test\": \"run\"\n  }\n}\n";
        assert_eq!(manifest.to_string().unwrap(), expected);
    }

    #[test]
    fn test_new_section_is_appended() {
        let mut manifest = Manifest::from_str("{\n  \"name\": \"app\"\n}\n").unwrap();
        manifest.set_dependency(Classification::Development, &ident("@scope/x"), "*");

        let expected =
            "{\n  \"name\": \"app\",\n  \"devDependencies\": {\n    \"@scope/x\": \"*\"\n  }\n}\n";
        assert_eq!(manifest.to_string().unwrap(), expected);
    }

    #[test]
    fn test_absent_empty_sections_are_not_created() {
        let manifest = Manifest::from_str("{\n  \"name\": \"app\"\n}\n").unwrap();
        assert_eq!(manifest.to_string().unwrap(), "{\n  \"name\": \"app\"\n}\n");
    }

    #[test]
    fn test_indentation_is_preserved() {
        let content = "{\n    \"name\": \"app\"\n}\n";
        let manifest = Manifest::from_str(content).unwrap();
        assert_eq!(manifest.to_string().unwrap(), content);

        let tabs = "{\n\t\"name\": \"app\"\n}\n";
        let manifest = Manifest::from_str(tabs).unwrap();
        assert_eq!(manifest.to_string().unwrap(), tabs);
    }

    #[test]
    fn test_every_section_snapshot() {
        let mut manifest =
            Manifest::from_str(r#"{"name":"app","private":true,"license":"MIT"}"#).unwrap();
        manifest.set_dependency(Classification::Peer, &ident("react"), "*");
        manifest.set_dependency(Classification::Development, &ident("typescript"), "~5.4.0");
        manifest.set_dependency(Classification::Regular, &ident("@scope/b"), "workspace:^");
        manifest.set_dependency(Classification::Regular, &ident("a"), "^1.0.0");

        insta::assert_snapshot!(manifest.to_string().unwrap().trim_end(), @r###"
        {
          "name": "app",
          "private": true,
          "license": "MIT",
          "dependencies": {
            "@scope/b": "workspace:^",
            "a": "^1.0.0"
          },
          "devDependencies": {
            "typescript": "~5.4.0"
          },
          "peerDependencies": {
            "react": "*"
          }
        }
        "###);
    }

    #[test]
    fn test_serialization_is_idempotent() {
        let mut manifest = Manifest::from_str(r#"{"name":"app","dependencies":{"z":"1","a":"2"}}"#).unwrap();
        manifest.set_dependency(Classification::Peer, &ident("m"), "*");
        let first = manifest.to_string().unwrap();
        let second = Manifest::from_str(&first).unwrap().to_string().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_set_dependency_returns_previous() {
        let mut manifest = Manifest::from_str(r#"{ "dependencies": { "a": "^1.0.0" } }"#).unwrap();
        let previous = manifest.set_dependency(Classification::Regular, &ident("a"), "^2.0.0");
        assert_eq!(previous.as_deref(), Some("^1.0.0"));
        assert_eq!(manifest.range_of(Classification::Regular, &ident("a")), Some("^2.0.0"));
    }

    #[test]
    fn test_locked_dependencies_skip_peers() {
        let manifest = Manifest::from_str(
            r#"{ "dependencies": { "a": "1" }, "devDependencies": { "b": "2" }, "peerDependencies": { "c": "3" } }"#,
        )
        .unwrap();
        let locked: Vec<_> = manifest.locked_dependencies().collect();
        assert_eq!(locked, vec![("a", "1"), ("b", "2")]);
    }

    #[test]
    fn test_write_to_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(MANIFEST_FILE);
        let manifest = Manifest::from_str(r#"{ "name": "app" }"#).unwrap();
        manifest.write_to_file(&path).unwrap();

        let reloaded = Manifest::from_file(&path).unwrap();
        assert_eq!(reloaded.name(), Some("app"));
    }
}
