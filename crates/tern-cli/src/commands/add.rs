//! Add dependency command (tern add)

use anyhow::{Context, Result};
use std::path::PathBuf;
use tern_config::ConfigLoader;
use tern_package::{
    AddOperation, AddOptions, CancellationFlag, LocalRegistry, PackageCache, PackageError,
    PackageIdent, PackageResolver, PlannedChange, Project, RangeModifier, RangeSpecifier,
    RequestedClassification, ResolvedCandidate,
};

/// Arguments for the add command
#[derive(Debug, Clone, Default)]
pub struct AddArgs {
    /// Descriptors as typed
    pub descriptors: Vec<String>,
    pub dev: bool,
    pub peer: bool,
    pub exact: bool,
    pub tilde: bool,
    pub caret: bool,
    pub fixed: bool,
    /// Print the plan and write nothing
    pub dry_run: bool,
    /// Directory the command was started in
    pub project_dir: PathBuf,
}

impl AddArgs {
    fn options(&self) -> AddOptions {
        AddOptions {
            classification: RequestedClassification::from_flags(self.dev, self.peer),
            modifier: RangeModifier::from_flags(self.exact, self.tilde, self.caret, self.fixed),
            dry_run: self.dry_run,
        }
    }
}

/// Stand-in resolver when no registry folder is configured.
///
/// Workspace and path requests never reach it, so they still succeed.
struct NoRegistry;

impl PackageResolver for NoRegistry {
    fn resolve(
        &self,
        ident: &PackageIdent,
        _requested: Option<&RangeSpecifier>,
    ) -> tern_package::Result<ResolvedCandidate> {
        Err(PackageError::Resolution(format!(
            "No registry configured to resolve {}; set registryFolder or {}",
            ident,
            tern_config::loader::ENV_REGISTRY_FOLDER
        )))
    }
}

/// Run the add command
pub fn run(args: AddArgs) -> Result<()> {
    let mut project = Project::find(&args.project_dir)
        .with_context(|| format!("Failed to load project from {}", args.project_dir.display()))?;

    let config = ConfigLoader::new()
        .load(project.root())
        .context("Failed to load configuration")?;

    let resolver: Box<dyn PackageResolver> = match config.registry_folder() {
        Some(folder) => Box::new(LocalRegistry::new(folder, PackageCache::new(config.cache_folder()))),
        None => {
            tracing::debug!("no registry configured, only workspace and path requests can be added");
            Box::new(NoRegistry)
        }
    };

    let cancellation = CancellationFlag::new();
    let handler_flag = cancellation.clone();
    ctrlc::set_handler(move || handler_flag.cancel())
        .context("Failed to install the interrupt handler")?;

    let operation = AddOperation::new(&config, resolver.as_ref(), args.options()).with_cancellation(cancellation);
    let plan = operation.plan(&project, &args.descriptors)?;

    if args.dry_run {
        println!("[Dry run] Would update {}:", project.manifest_path().display());
        print!("{}", plan.manifest().to_string()?);
    }

    let outcome = operation.commit(&mut project, plan)?;

    for change in &outcome.changes {
        println!("{}", summary_line(change));
    }
    for line in outcome.deprecations.lines() {
        println!("{}", line);
    }

    if !outcome.evicted.is_empty() {
        tracing::info!(count = outcome.evicted.len(), "evicted superseded cache entries");
    }

    Ok(())
}

fn summary_line(change: &PlannedChange) -> String {
    let verb = if change.is_update() { "Updating" } else { "Adding" };
    format!(
        "➤ {} {}@{} to {}",
        verb,
        change.ident,
        change.range,
        change.classification.field()
    )
}
