//! Tern Package Management
//!
//! Decision core behind `tern add`: descriptor parsing, range modifiers,
//! workspace matching, dependency classification rules, lockfile and
//! manifest mutation, cache lifecycle and deprecation reporting.

pub mod add;
pub mod cache;
pub mod classification;
pub mod deprecation;
pub mod descriptor;
pub mod ident;
pub mod lock;
pub mod lockfile;
pub mod manifest;
pub mod project;
pub mod range;
pub mod registry;
pub mod version_range;
pub mod workspace;

use std::path::PathBuf;

pub use add::{
    AddOperation, AddOptions, AddOutcome, AddPlan, CancellationFlag, ChangeSource, PlannedChange,
};
pub use cache::{CacheEntry, EvictionDecision, PackageCache};
pub use classification::{Classification, ClassificationState, RequestedClassification};
pub use deprecation::DeprecationReport;
pub use descriptor::{PackageRequest, RangeSpecifier};
pub use ident::PackageIdent;
pub use lockfile::{LockEntry, Lockfile};
pub use manifest::Manifest;
pub use project::Project;
pub use range::{RangeModifier, RangeResolver};
pub use registry::{InducedDependency, LocalRegistry, PackageResolver, ResolvedCandidate};
pub use version_range::VersionRange;
pub use workspace::{WorkspaceConstraint, WorkspaceInfo, WorkspaceSet};

/// Package management errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Malformed descriptor '{descriptor}': {reason}")]
    MalformedDescriptor { descriptor: String, reason: String },

    #[error("Package {ident} is already listed as a {existing} dependency")]
    ClassificationConflict {
        ident: String,
        existing: Classification,
    },

    #[error("{0}")]
    Resolution(String),

    #[error("Integrity check failed for {locator}: expected {expected}, got {actual}")]
    FetchIntegrity {
        locator: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid manifest {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("Invalid lockfile: {0}")]
    InvalidLockfile(String),

    #[error("Failed to parse lockfile: {0}")]
    LockfileParse(#[from] toml::de::Error),

    #[error("Failed to serialize lockfile: {0}")]
    LockfileSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] tern_config::ConfigError),

    #[error("Operation cancelled before any change was written")]
    Cancelled,

    #[error("{path} was modified by another process; run the command again")]
    ConcurrentModification { path: String },
}

impl PackageError {
    /// Create a malformed descriptor error
    pub fn malformed(descriptor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDescriptor {
            descriptor: descriptor.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid manifest error
    pub fn invalid_manifest(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PackageError>;
