//! Dependency classification rules
//!
//! A package can sit in `dependencies`, `devDependencies` and
//! `peerDependencies`. Only some combinations are legal, and a request to
//! add a package is checked against what the manifest already says before
//! anything is resolved.

use crate::ident::PackageIdent;
use crate::manifest::Manifest;
use crate::{PackageError, Result};
use std::fmt;

/// Manifest section a dependency lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Classification {
    Regular,
    Development,
    Peer,
}

impl Classification {
    pub const ALL: [Classification; 3] = [
        Classification::Regular,
        Classification::Development,
        Classification::Peer,
    ];

    /// Manifest field holding this section
    pub fn field(&self) -> &'static str {
        match self {
            Classification::Regular => "dependencies",
            Classification::Development => "devDependencies",
            Classification::Peer => "peerDependencies",
        }
    }

    /// Word used in user-facing messages
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Regular => "regular",
            Classification::Development => "dev",
            Classification::Peer => "peer",
        }
    }

    /// Whether entries in this section are pinned in the lockfile
    pub fn is_locked(&self) -> bool {
        !matches!(self, Classification::Peer)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Section asked for on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestedClassification {
    /// No flag: keep the current section, or `dependencies` for new packages
    #[default]
    Implicit,
    /// `-D`
    Development,
    /// `-P`
    Peer,
}

impl RequestedClassification {
    pub fn from_flags(dev: bool, peer: bool) -> Self {
        match (dev, peer) {
            (_, true) => RequestedClassification::Peer,
            (true, false) => RequestedClassification::Development,
            (false, false) => RequestedClassification::Implicit,
        }
    }
}

/// Where a package currently sits in a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationState {
    Absent,
    Regular,
    Development,
    Peer,
    RegularAndPeer,
    DevelopmentAndPeer,
}

impl ClassificationState {
    /// Read the state of `ident` from a manifest.
    ///
    /// A package listed in both `dependencies` and `devDependencies`
    /// behaves as a regular one.
    pub fn of(manifest: &Manifest, ident: &PackageIdent) -> Self {
        let regular = manifest.contains(Classification::Regular, ident);
        let dev = manifest.contains(Classification::Development, ident);
        let peer = manifest.contains(Classification::Peer, ident);

        match (regular, dev, peer) {
            (false, false, false) => ClassificationState::Absent,
            (true, _, false) => ClassificationState::Regular,
            (false, true, false) => ClassificationState::Development,
            (false, false, true) => ClassificationState::Peer,
            (true, _, true) => ClassificationState::RegularAndPeer,
            (false, true, true) => ClassificationState::DevelopmentAndPeer,
        }
    }

    /// Section the request targets, or the section that blocks it
    pub fn target(&self, requested: RequestedClassification) -> std::result::Result<Classification, Classification> {
        use ClassificationState as S;
        use RequestedClassification as R;

        match (self, requested) {
            (S::Absent, R::Implicit) => Ok(Classification::Regular),
            (S::Absent, R::Development) => Ok(Classification::Development),
            (S::Absent, R::Peer) => Ok(Classification::Peer),

            (S::Regular, R::Implicit) => Ok(Classification::Regular),
            (S::Regular, R::Development | R::Peer) => Err(Classification::Regular),

            (S::Development, R::Implicit | R::Development) => Ok(Classification::Development),
            (S::Development, R::Peer) => Ok(Classification::Peer),

            (S::Peer, R::Implicit) => Err(Classification::Peer),
            (S::Peer, R::Development) => Ok(Classification::Development),
            (S::Peer, R::Peer) => Ok(Classification::Peer),

            (S::DevelopmentAndPeer, R::Implicit | R::Development) => {
                Ok(Classification::Development)
            }
            (S::DevelopmentAndPeer, R::Peer) => Ok(Classification::Peer),

            (S::RegularAndPeer, R::Implicit) => Ok(Classification::Regular),
            (S::RegularAndPeer, R::Development) => Err(Classification::Regular),
            (S::RegularAndPeer, R::Peer) => Ok(Classification::Peer),
        }
    }

    /// State after `classification` has been written
    pub fn with(self, classification: Classification) -> Self {
        use ClassificationState as S;

        match (self, classification) {
            (S::Absent, Classification::Regular) => S::Regular,
            (S::Absent, Classification::Development) => S::Development,
            (S::Absent, Classification::Peer) => S::Peer,
            (S::Development, Classification::Peer) | (S::Peer, Classification::Development) => {
                S::DevelopmentAndPeer
            }
            (S::Regular, Classification::Peer) => S::RegularAndPeer,
            (state, _) => state,
        }
    }
}

/// Decide the target section for a request, failing on illegal transitions
pub fn validate(
    state: ClassificationState,
    ident: &PackageIdent,
    requested: RequestedClassification,
) -> Result<Classification> {
    state
        .target(requested)
        .map_err(|existing| PackageError::ClassificationConflict {
            ident: ident.to_string(),
            existing,
        })
}
