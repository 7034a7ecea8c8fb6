use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

/// Tern package manager.
///
/// Adds and upgrades dependencies in package.json, keeping tern.lock and the
/// package cache in step with the manifest.
///
/// EXAMPLES:
///     tern add lodash               Add the latest lodash as ^<version>
///     tern add -D typescript@~5.4   Add a dev dependency with a given range
///     tern add -E react@latest      Pin the latest react exactly
///     tern config set defaultSemverRangePrefix "~"
///
/// ENVIRONMENT VARIABLES:
///     TERN_CACHE_FOLDER                 Location of the package cache
///     TERN_REGISTRY_FOLDER              Location of the local registry
///     TERN_DEFAULT_SEMVER_RANGE_PREFIX  Prefix used when no modifier is given
///     TERN_NETWORK_CONCURRENCY          Packages resolved at the same time
///     RUST_LOG                          Diagnostic filter (overrides -v)
#[derive(Parser)]
#[command(name = "tern")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase diagnostic output (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Run as if started in this directory
    #[arg(long, global = true, value_name = "DIR")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add dependencies to the project
    ///
    /// Each descriptor is a package name with an optional range, tag or
    /// protocol, or a path to a local package. Existing entries are upgraded
    /// in place.
    ///
    /// EXAMPLES:
    ///     tern add no-deps                Add under dependencies
    ///     tern add no-deps@^2.0.0         Record the given range verbatim
    ///     tern add -P react               Add a peer dependency
    ///     tern add ./packages/utils       Add a local package by path
    ///     tern add my-ws@workspace:^      Require a workspace of the project
    #[command(visible_alias = "a")]
    Add {
        /// Package descriptors
        #[arg(required = true, value_name = "DESCRIPTOR")]
        descriptors: Vec<String>,
        /// Add to devDependencies
        #[arg(long, short = 'D', conflicts_with = "peer")]
        dev: bool,
        /// Add to peerDependencies
        #[arg(long, short = 'P')]
        peer: bool,
        /// Record the exact version
        #[arg(long, short = 'E', group = "modifier")]
        exact: bool,
        /// Record a ~ range
        #[arg(long, short = 'T', group = "modifier")]
        tilde: bool,
        /// Record a ^ range
        #[arg(long, short = 'C', group = "modifier")]
        caret: bool,
        /// Record the request as typed
        #[arg(long, short = 'F', group = "modifier")]
        fixed: bool,
        /// Show the planned changes without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Read or write project settings (.ternrc.toml)
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate and store a setting
    ///
    /// EXAMPLES:
    ///     tern config set defaultSemverRangePrefix "~"
    ///     tern config set networkConcurrency 4
    Set {
        /// Setting key
        key: String,
        /// New value
        value: String,
    },
    /// Print the effective value of a setting
    Get {
        /// Setting key
        key: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let cwd = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Add {
            descriptors,
            dev,
            peer,
            exact,
            tilde,
            caret,
            fixed,
            dry_run,
        } => {
            let args = commands::add::AddArgs {
                descriptors,
                dev,
                peer,
                exact,
                tilde,
                caret,
                fixed,
                dry_run,
                project_dir: cwd,
            };
            commands::add::run(args)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Set { key, value } => commands::config::set(&cwd, &key, &value)?,
            ConfigAction::Get { key } => commands::config::get(&cwd, &key)?,
        },
    }

    Ok(())
}
