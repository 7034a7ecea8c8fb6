//! The add/upgrade pipeline
//!
//! An add runs in two phases. Planning parses every descriptor, validates
//! classifications for the whole batch, matches workspaces, resolves the
//! rest concurrently and computes the recorded ranges against an
//! in-memory copy of the manifest. Committing takes the project lock,
//! checks that neither file changed on disk since planning, writes the
//! manifest and lockfile, then evicts superseded artifacts.
//! Nothing touches the manifest or the lockfile until every request of
//! the batch has been planned.

use crate::cache::{EvictionDecision, PackageCache};
use crate::classification::{self, Classification, ClassificationState, RequestedClassification};
use crate::deprecation::DeprecationReport;
use crate::descriptor::{PackageRequest, RangeSpecifier};
use crate::ident::PackageIdent;
use crate::lock::ProjectLock;
use crate::lockfile::{descriptor_key, LockEntry, Lockfile};
use crate::manifest::{write_atomic, Manifest, MANIFEST_FILE};
use crate::project::Project;
use crate::range::{RangeModifier, RangeResolver};
use crate::registry::{PackageResolver, ResolvedCandidate};
use crate::workspace::{WorkspaceConstraint, WorkspaceInfo};
use crate::{PackageError, Result};
use rayon::prelude::*;
use semver::Version;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tern_config::Config;

const REGISTRY_PROTOCOL: &str = "npm";

/// Set from a signal handler to abort a batch before it writes anything
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Flags of one `tern add` invocation
#[derive(Debug, Clone, Copy, Default)]
pub struct AddOptions {
    pub classification: RequestedClassification,
    pub modifier: RangeModifier,
    pub dry_run: bool,
}

/// Where a planned entry comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeSource {
    /// Resolved and fetched through the resolver
    Registry(ResolvedCandidate),
    /// Satisfied by a workspace of the project
    Workspace(WorkspaceInfo),
    /// A local directory, with the version its manifest declares
    Path { version: Option<Version> },
    /// A peer dependency recorded without resolution
    Unresolved,
}

/// One manifest entry the batch writes
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChange {
    pub ident: PackageIdent,
    pub classification: Classification,
    pub range: String,
    pub previous_range: Option<String>,
    pub source: ChangeSource,
}

impl PlannedChange {
    /// Whether the entry already existed in its section
    pub fn is_update(&self) -> bool {
        self.previous_range.is_some()
    }
}

/// Result of planning, not yet written
#[derive(Debug, Clone)]
pub struct AddPlan {
    manifest: Manifest,
    changes: Vec<PlannedChange>,
}

impl AddPlan {
    /// The edited manifest as it will be written
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn changes(&self) -> &[PlannedChange] {
        &self.changes
    }
}

/// What a committed (or dry-run) add did
#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub changes: Vec<PlannedChange>,
    pub deprecations: DeprecationReport,
    pub evicted: Vec<PathBuf>,
    pub manifest_written: bool,
    pub lockfile_written: bool,
}

/// A request after naming and classification
#[derive(Debug, Clone)]
struct Target {
    ident: PackageIdent,
    range: Option<RangeSpecifier>,
    classification: Classification,
}

/// How a target gets its source
enum Pending {
    Ready(ChangeSource),
    Resolve,
}

/// Runs `tern add` against a project
pub struct AddOperation<'a> {
    resolver: &'a dyn PackageResolver,
    ranges: RangeResolver,
    cache: PackageCache,
    concurrency: usize,
    options: AddOptions,
    cancellation: CancellationFlag,
}

impl<'a> AddOperation<'a> {
    pub fn new(config: &Config, resolver: &'a dyn PackageResolver, options: AddOptions) -> Self {
        Self {
            resolver,
            ranges: RangeResolver::new(config),
            cache: PackageCache::new(config.cache_folder()),
            concurrency: config.network_concurrency().max(1),
            options,
            cancellation: CancellationFlag::new(),
        }
    }

    /// Observe `flag` between planning and writing
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    /// Plan and commit in one go
    pub fn run(&self, project: &mut Project, descriptors: &[String]) -> Result<AddOutcome> {
        let plan = self.plan(project, descriptors)?;
        self.commit(project, plan)
    }

    /// Compute every change of the batch without writing anything
    pub fn plan(&self, project: &Project, descriptors: &[String]) -> Result<AddPlan> {
        let requests = descriptors
            .iter()
            .map(|descriptor| PackageRequest::parse(descriptor))
            .collect::<Result<Vec<_>>>()?;

        let targets = self.classify(project, requests)?;
        let pending = targets
            .iter()
            .map(|target| self.pending_source(project, target))
            .collect::<Result<Vec<_>>>()?;

        let sources = self.resolve_all(&targets, pending)?;

        let mut manifest = project.manifest().clone();
        let mut changes = Vec::with_capacity(targets.len());

        for (target, source) in targets.into_iter().zip(sources) {
            let range = self.recorded_range(&target, &source);
            let previous_range =
                manifest.set_dependency(target.classification, &target.ident, range.clone());

            tracing::debug!(
                ident = %target.ident,
                section = target.classification.field(),
                %range,
                "planned change"
            );

            changes.push(PlannedChange {
                ident: target.ident,
                classification: target.classification,
                range,
                previous_range,
                source,
            });
        }

        Ok(AddPlan { manifest, changes })
    }

    /// Name path requests and validate every classification before any resolution
    fn classify(&self, project: &Project, requests: Vec<PackageRequest>) -> Result<Vec<Target>> {
        let mut states: HashMap<PackageIdent, ClassificationState> = HashMap::new();
        let mut targets = Vec::with_capacity(requests.len());

        for request in requests {
            let ident = match request.ident {
                Some(ident) => ident,
                None => name_local_package(project, &request)?,
            };

            let state = *states
                .entry(ident.clone())
                .or_insert_with(|| ClassificationState::of(project.manifest(), &ident));
            let classification =
                classification::validate(state, &ident, self.options.classification)?;
            states.insert(ident.clone(), state.with(classification));

            targets.push(Target {
                ident,
                range: request.range,
                classification,
            });
        }

        Ok(targets)
    }

    fn pending_source(&self, project: &Project, target: &Target) -> Result<Pending> {
        if target.classification == Classification::Peer && target.range.is_none() {
            return Ok(Pending::Ready(ChangeSource::Unresolved));
        }

        if let Some(constraint) = WorkspaceConstraint::from_request(target.range.as_ref()) {
            let requester = project.requester();
            if let Some(workspace) =
                project
                    .workspaces()
                    .find_match(&target.ident, &constraint, requester.as_ref())
            {
                tracing::debug!(ident = %target.ident, path = %workspace.path, "matched workspace");
                return Ok(Pending::Ready(ChangeSource::Workspace(workspace.clone())));
            }
        }

        match &target.range {
            Some(spec @ RangeSpecifier::Workspace(_)) => Err(PackageError::Resolution(format!(
                "No workspace matches {}@{}",
                target.ident, spec
            ))),
            Some(spec @ RangeSpecifier::Path(_)) => {
                let manifest = read_local_manifest(project.cwd(), spec)?;
                let version = manifest.version().and_then(|v| Version::parse(v).ok());
                Ok(Pending::Ready(ChangeSource::Path { version }))
            }
            _ => Ok(Pending::Resolve),
        }
    }

    /// Resolve pending targets on a bounded pool, keeping request order
    fn resolve_all(&self, targets: &[Target], pending: Vec<Pending>) -> Result<Vec<ChangeSource>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .build()
            .map_err(|e| PackageError::Resolution(format!("Failed to start resolver pool: {}", e)))?;

        let resolver = self.resolver;
        let results: Vec<Result<ChangeSource>> = pool.install(|| {
            targets
                .par_iter()
                .zip(pending.into_par_iter())
                .map(|(target, pending)| match pending {
                    Pending::Ready(source) => Ok(source),
                    Pending::Resolve => resolver
                        .resolve(&target.ident, target.range.as_ref())
                        .map(ChangeSource::Registry),
                })
                .collect()
        });

        results.into_iter().collect()
    }

    fn recorded_range(&self, target: &Target, source: &ChangeSource) -> String {
        let modifier = self.options.modifier;
        match source {
            ChangeSource::Registry(candidate) => {
                self.ranges
                    .registry_range(modifier, target.range.as_ref(), &candidate.version)
            }
            ChangeSource::Workspace(_) => {
                self.ranges.workspace_range(modifier, target.range.as_ref())
            }
            ChangeSource::Path { .. } => target
                .range
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            ChangeSource::Unresolved => "*".to_string(),
        }
    }

    /// Write the plan under the project lock
    pub fn commit(&self, project: &mut Project, plan: AddPlan) -> Result<AddOutcome> {
        if self.cancellation.is_cancelled() {
            return Err(PackageError::Cancelled);
        }

        let AddPlan { manifest, changes } = plan;
        let lockfile = updated_lockfile(project, &manifest, &changes);
        let deprecations = DeprecationReport::from_candidates(changes.iter().filter_map(
            |change| match &change.source {
                ChangeSource::Registry(candidate) => Some(candidate),
                _ => None,
            },
        ));

        if self.options.dry_run {
            return Ok(AddOutcome {
                changes,
                deprecations,
                evicted: Vec::new(),
                manifest_written: false,
                lockfile_written: false,
            });
        }

        let _lock = ProjectLock::acquire(project.root())?;
        ensure_unchanged(project)?;

        let manifest_written = manifest != *project.manifest();
        let lockfile_written = persist(
            &project.manifest_path(),
            manifest_written.then_some(&manifest),
            &project.lockfile_path(),
            &lockfile,
        )?;

        let evicted = self.evict_superseded(project, &lockfile, &changes)?;
        project.replace_state(manifest, lockfile);

        Ok(AddOutcome {
            changes,
            deprecations,
            evicted,
            manifest_written,
            lockfile_written,
        })
    }

    fn evict_superseded(
        &self,
        project: &Project,
        lockfile: &Lockfile,
        changes: &[PlannedChange],
    ) -> Result<Vec<PathBuf>> {
        let mut evicted = Vec::new();
        let mut seen = BTreeSet::new();

        for change in changes {
            let ChangeSource::Registry(candidate) = &change.source else {
                continue;
            };
            if !change.classification.is_locked() || !seen.insert(candidate.ident.clone()) {
                continue;
            }

            let keep = lockfile.versions_of(&candidate.ident, REGISTRY_PROTOCOL);
            let superseded = superseded_version(project, change, &keep);

            match self
                .cache
                .eviction_decision(superseded.as_ref(), &candidate.version, project.root())
            {
                EvictionDecision::Evict => {
                    evicted.extend(self.cache.evict(&candidate.ident, REGISTRY_PROTOCOL, &keep)?);
                }
                EvictionDecision::Shared => {
                    tracing::debug!(
                        cache = %self.cache.root().display(),
                        "cache is outside the project, keeping superseded artifacts"
                    );
                }
                EvictionDecision::Unchanged => {}
            }
        }

        Ok(evicted)
    }
}

/// Refuse to write over changes made since the project was loaded
fn ensure_unchanged(project: &Project) -> Result<()> {
    let manifest_path = project.manifest_path();
    if Manifest::from_file(&manifest_path)?.to_string()? != project.manifest().to_string()? {
        return Err(PackageError::ConcurrentModification {
            path: manifest_path.display().to_string(),
        });
    }

    let lockfile_path = project.lockfile_path();
    if Lockfile::load_or_default(&lockfile_path)?.to_string()? != project.lockfile().to_string()? {
        return Err(PackageError::ConcurrentModification {
            path: lockfile_path.display().to_string(),
        });
    }

    Ok(())
}

/// Write the manifest (when given) and then the lockfile.
///
/// Both are rendered before anything touches the disk. If the lockfile
/// cannot be written the previous manifest content is put back.
fn persist(
    manifest_path: &Path,
    manifest: Option<&Manifest>,
    lockfile_path: &Path,
    lockfile: &Lockfile,
) -> Result<bool> {
    let manifest_text = manifest.map(Manifest::to_string).transpose()?;
    lockfile.to_string()?;

    let original = match &manifest_text {
        Some(text) => {
            let original = std::fs::read(manifest_path)?;
            write_atomic(manifest_path, text.as_bytes())?;
            tracing::info!(path = %manifest_path.display(), "wrote manifest");
            Some(original)
        }
        None => None,
    };

    match lockfile.write_if_changed(lockfile_path) {
        Ok(written) => {
            if written {
                tracing::info!(path = %lockfile_path.display(), "wrote lockfile");
            }
            Ok(written)
        }
        Err(e) => {
            if let Some(original) = original {
                match write_atomic(manifest_path, &original) {
                    Ok(()) => tracing::warn!(
                        path = %manifest_path.display(),
                        "lockfile write failed, manifest restored"
                    ),
                    Err(restore) => tracing::error!(
                        path = %manifest_path.display(),
                        error = %restore,
                        "lockfile write failed and the manifest could not be restored"
                    ),
                }
            }
            Err(e)
        }
    }
}

/// Registry version a change replaces.
///
/// Prefers the lock entry the old range pointed at, then any locked version
/// the new lockfile drops, then an exact version pinned by the old range.
fn superseded_version(project: &Project, change: &PlannedChange, keep: &BTreeSet<Version>) -> Option<Version> {
    let previous_range = change.previous_range.as_deref();
    let old = project.lockfile();
    let dropped = |version: &Version| !keep.contains(version);

    previous_range
        .and_then(|range| old.get(&descriptor_key(&change.ident.to_string(), range)))
        .filter(|entry| entry.protocol() == Some(REGISTRY_PROTOCOL))
        .map(|entry| entry.version.clone())
        .filter(dropped)
        .or_else(|| {
            old.versions_of(&change.ident, REGISTRY_PROTOCOL)
                .difference(keep)
                .next()
                .cloned()
        })
        .or_else(|| previous_range.and_then(exact_pin).filter(dropped))
}

fn exact_pin(range: &str) -> Option<Version> {
    let range = range.strip_prefix("npm:").unwrap_or(range).trim();
    Version::parse(range.strip_prefix('=').unwrap_or(range)).ok()
}

/// Lockfile after applying `changes` and pruning what is no longer referenced
fn updated_lockfile(project: &Project, manifest: &Manifest, changes: &[PlannedChange]) -> Lockfile {
    let mut lockfile = project.lockfile().clone();

    for change in changes.iter().filter(|c| c.classification.is_locked()) {
        if let Some(entry) = lock_entry(change) {
            lockfile.insert(descriptor_key(&change.ident.to_string(), &change.range), entry);
        }
    }

    let changed: BTreeSet<PackageIdent> = changes
        .iter()
        .filter(|c| c.classification.is_locked())
        .map(|c| c.ident.clone())
        .collect();
    let mut referenced: BTreeSet<String> = manifest
        .locked_dependencies()
        .map(|(name, range)| descriptor_key(name, range))
        .collect();
    referenced.extend(project.foreign_references().iter().cloned());

    let pruned = lockfile.prune(&changed, &referenced);
    if !pruned.is_empty() {
        tracing::debug!(?pruned, "pruned lockfile entries");
    }
    lockfile
}

fn lock_entry(change: &PlannedChange) -> Option<LockEntry> {
    let ident = &change.ident;
    match &change.source {
        ChangeSource::Registry(candidate) => Some(LockEntry {
            resolution: candidate.locator(),
            version: candidate.version.clone(),
            checksum: candidate.checksum.clone(),
            dependencies: candidate.lock_dependencies(),
        }),
        ChangeSource::Workspace(workspace) => Some(LockEntry {
            resolution: format!("{}@workspace:{}", ident, workspace.path),
            // Workspaces without a version are pinned as 0.0.0
            version: workspace.version.clone().unwrap_or(Version::new(0, 0, 0)),
            checksum: None,
            dependencies: BTreeMap::new(),
        }),
        ChangeSource::Path { version } => Some(LockEntry {
            resolution: descriptor_key(&ident.to_string(), &change.range),
            version: version.clone().unwrap_or(Version::new(0, 0, 0)),
            checksum: None,
            dependencies: BTreeMap::new(),
        }),
        ChangeSource::Unresolved => None,
    }
}

fn read_local_manifest(cwd: &Path, spec: &RangeSpecifier) -> Result<Manifest> {
    let path = spec.local_path().unwrap_or_default();
    let manifest_path = cwd.join(path).join(MANIFEST_FILE);
    Manifest::from_file(&manifest_path).map_err(|e| {
        PackageError::Resolution(format!("Cannot read package at {}: {}", path, e))
    })
}

/// Name a bare path request after the package it points at
fn name_local_package(project: &Project, request: &PackageRequest) -> Result<PackageIdent> {
    let spec = request.range.as_ref().ok_or_else(|| {
        PackageError::malformed(request.raw.clone(), "a path request needs a path")
    })?;
    let manifest = read_local_manifest(project.cwd(), spec)?;
    manifest.ident().ok_or_else(|| {
        PackageError::Resolution(format!(
            "Package at {} has no valid name",
            request.raw
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Resolver answering from a fixed table and recording what it was asked
    struct StaticResolver {
        versions: HashMap<String, Version>,
        calls: Mutex<Vec<String>>,
    }

    impl StaticResolver {
        fn new(entries: &[(&str, &str)]) -> Self {
            Self {
                versions: entries
                    .iter()
                    .map(|(name, v)| (name.to_string(), Version::parse(v).unwrap()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl PackageResolver for StaticResolver {
        fn resolve(
            &self,
            ident: &PackageIdent,
            _requested: Option<&RangeSpecifier>,
        ) -> Result<ResolvedCandidate> {
            self.calls.lock().unwrap().push(ident.to_string());
            let version = self.versions.get(&ident.to_string()).cloned().ok_or_else(|| {
                PackageError::Resolution(format!("Package {} not found", ident))
            })?;
            Ok(ResolvedCandidate {
                ident: ident.clone(),
                protocol: "npm".to_string(),
                version,
                dependencies: BTreeMap::new(),
                induced: Vec::new(),
                deprecation: None,
                checksum: None,
            })
        }
    }

    fn project_with(manifest: &str) -> (TempDir, Project) {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(MANIFEST_FILE), manifest).unwrap();
        let project = Project::find(temp.path()).unwrap();
        (temp, project)
    }

    fn descriptors(list: &[&str]) -> Vec<String> {
        list.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_plan_does_not_write() {
        let (temp, project) = project_with(r#"{ "name": "app" }"#);
        let resolver = StaticResolver::new(&[("no-deps", "2.0.0")]);
        let config = Config::for_project(project.root());
        let op = AddOperation::new(&config, &resolver, AddOptions::default());

        let plan = op.plan(&project, &descriptors(&["no-deps"])).unwrap();
        assert_eq!(plan.changes()[0].range, "^2.0.0");
        assert_eq!(
            plan.manifest().range_of(Classification::Regular, &plan.changes()[0].ident),
            Some("^2.0.0")
        );

        let on_disk = fs::read_to_string(temp.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(on_disk, r#"{ "name": "app" }"#);
    }

    #[test]
    fn test_conflict_is_detected_before_resolution() {
        let (_temp, project) = project_with(r#"{ "dependencies": { "b": "^1.0.0" } }"#);
        let resolver = StaticResolver::new(&[("a", "1.0.0"), ("b", "1.0.0")]);
        let config = Config::for_project(project.root());
        let options = AddOptions {
            classification: RequestedClassification::Development,
            ..AddOptions::default()
        };
        let op = AddOperation::new(&config, &resolver, options);

        let err = op.plan(&project, &descriptors(&["a", "b"])).unwrap_err();
        assert!(matches!(err, PackageError::ClassificationConflict { .. }));
        assert!(resolver.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cancelled_batch_writes_nothing() {
        let (temp, mut project) = project_with(r#"{ "name": "app" }"#);
        let resolver = StaticResolver::new(&[("no-deps", "2.0.0")]);
        let config = Config::for_project(project.root());
        let flag = CancellationFlag::new();
        let op = AddOperation::new(&config, &resolver, AddOptions::default())
            .with_cancellation(flag.clone());

        let plan = op.plan(&project, &descriptors(&["no-deps"])).unwrap();
        flag.cancel();
        assert!(matches!(op.commit(&mut project, plan), Err(PackageError::Cancelled)));

        let on_disk = fs::read_to_string(temp.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(on_disk, r#"{ "name": "app" }"#);
        assert!(!project.lockfile_path().exists());
    }

    #[test]
    fn test_results_keep_request_order() {
        let (_temp, project) = project_with(r#"{ "name": "app" }"#);
        let resolver = StaticResolver::new(&[("c", "3.0.0"), ("a", "1.0.0"), ("b", "2.0.0")]);
        let mut config = Config::for_project(project.root());
        config.settings.network_concurrency = Some(3);
        let op = AddOperation::new(&config, &resolver, AddOptions::default());

        let plan = op.plan(&project, &descriptors(&["c", "a", "b"])).unwrap();
        let order: Vec<String> = plan.changes().iter().map(|c| c.ident.to_string()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_peer_without_range_is_not_resolved() {
        let (_temp, project) = project_with(r#"{ "name": "app" }"#);
        let resolver = StaticResolver::new(&[]);
        let config = Config::for_project(project.root());
        let options = AddOptions {
            classification: RequestedClassification::Peer,
            ..AddOptions::default()
        };
        let op = AddOperation::new(&config, &resolver, options);

        let plan = op.plan(&project, &descriptors(&["no-deps"])).unwrap();
        assert_eq!(plan.changes()[0].range, "*");
        assert_eq!(plan.changes()[0].source, ChangeSource::Unresolved);
    }

    #[test]
    fn test_dry_run_reports_without_writing() {
        let (temp, mut project) = project_with(r#"{ "name": "app" }"#);
        let resolver = StaticResolver::new(&[("no-deps", "2.0.0")]);
        let config = Config::for_project(project.root());
        let options = AddOptions {
            dry_run: true,
            ..AddOptions::default()
        };
        let op = AddOperation::new(&config, &resolver, options);

        let outcome = op.run(&mut project, &descriptors(&["no-deps"])).unwrap();
        assert_eq!(outcome.changes.len(), 1);
        assert!(!outcome.manifest_written);
        assert!(!temp.path().join(crate::lock::STATE_DIR).exists());
    }

    #[test]
    fn test_failed_lockfile_write_restores_manifest() {
        let original = r#"{ "name": "app" }"#;
        let (temp, mut project) = project_with(original);
        let resolver = StaticResolver::new(&[("no-deps", "2.0.0")]);
        let config = Config::for_project(project.root());
        let op = AddOperation::new(&config, &resolver, AddOptions::default());

        let plan = op.plan(&project, &descriptors(&["no-deps"])).unwrap();
        fs::create_dir(temp.path().join(crate::lockfile::LOCKFILE_NAME)).unwrap();

        assert!(op.commit(&mut project, plan).is_err());
        let on_disk = fs::read_to_string(temp.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(on_disk, original);
    }

    #[test]
    fn test_persist_rolls_back_manifest() {
        let original = r#"{ "name": "app" }"#;
        let (temp, project) = project_with(original);
        let resolver = StaticResolver::new(&[("no-deps", "2.0.0")]);
        let config = Config::for_project(project.root());
        let op = AddOperation::new(&config, &resolver, AddOptions::default());
        let plan = op.plan(&project, &descriptors(&["no-deps"])).unwrap();

        let lockfile_path = temp.path().join("blocked.lock");
        fs::create_dir(&lockfile_path).unwrap();

        let result = persist(
            &project.manifest_path(),
            Some(plan.manifest()),
            &lockfile_path,
            &Lockfile::new(),
        );
        assert!(result.is_err());
        let on_disk = fs::read_to_string(temp.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(on_disk, original);
    }

    #[test]
    fn test_commit_refuses_external_manifest_edit() {
        let (temp, mut project) = project_with(r#"{ "name": "app" }"#);
        let resolver = StaticResolver::new(&[("no-deps", "2.0.0")]);
        let config = Config::for_project(project.root());
        let op = AddOperation::new(&config, &resolver, AddOptions::default());

        let plan = op.plan(&project, &descriptors(&["no-deps"])).unwrap();
        let edited = r#"{ "name": "app", "dependencies": { "left-pad": "^1.0.0" } }"#;
        fs::write(temp.path().join(MANIFEST_FILE), edited).unwrap();

        let err = op.commit(&mut project, plan).unwrap_err();
        assert!(matches!(err, PackageError::ConcurrentModification { .. }));
        assert_eq!(fs::read_to_string(temp.path().join(MANIFEST_FILE)).unwrap(), edited);
        assert!(!project.lockfile_path().exists());
    }

    #[test]
    fn test_commit_refuses_external_lockfile_edit() {
        let (temp, mut project) = project_with(r#"{ "name": "app" }"#);
        let resolver = StaticResolver::new(&[("no-deps", "2.0.0")]);
        let config = Config::for_project(project.root());
        let op = AddOperation::new(&config, &resolver, AddOptions::default());

        let plan = op.plan(&project, &descriptors(&["no-deps"])).unwrap();
        let mut concurrent = Lockfile::new();
        concurrent.insert(
            descriptor_key("a", "npm:^1.0.0"),
            LockEntry {
                resolution: "a@npm:1.0.0".to_string(),
                version: Version::new(1, 0, 0),
                checksum: None,
                dependencies: BTreeMap::new(),
            },
        );
        concurrent.write_if_changed(&project.lockfile_path()).unwrap();

        let err = op.commit(&mut project, plan).unwrap_err();
        assert!(matches!(err, PackageError::ConcurrentModification { .. }));
        assert_eq!(
            fs::read_to_string(temp.path().join(MANIFEST_FILE)).unwrap(),
            r#"{ "name": "app" }"#
        );
    }

    #[test]
    fn test_superseded_version_falls_back_to_exact_pin() {
        let (_temp, project) = project_with(r#"{ "dependencies": { "no-deps": "1.0.0" } }"#);
        let resolver = StaticResolver::new(&[("no-deps", "2.0.0")]);
        let config = Config::for_project(project.root());
        let op = AddOperation::new(&config, &resolver, AddOptions::default());

        let plan = op.plan(&project, &descriptors(&["no-deps"])).unwrap();
        let keep = BTreeSet::from([Version::new(2, 0, 0)]);
        assert_eq!(
            superseded_version(&project, &plan.changes()[0], &keep),
            Some(Version::new(1, 0, 0))
        );
    }

    #[test]
    fn test_exact_pin() {
        assert_eq!(exact_pin("1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(exact_pin("=1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(exact_pin("npm:1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(exact_pin("^1.2.3"), None);
        assert_eq!(exact_pin("workspace:*"), None);
    }
}
