//! Visibility tiers and their storage roots.
//!
//! `private` sees every tier; `public` and `unlisted` see only themselves.

use std::path::PathBuf;

use crate::config::StorageConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessTier {
    Public,
    Unlisted,
    Private,
}

impl AccessTier {
    pub const ALL: [AccessTier; 3] = [AccessTier::Public, AccessTier::Unlisted, AccessTier::Private];

    /// Tiers whose content a reader of `self` may list.
    pub fn visible(self) -> &'static [AccessTier] {
        match self {
            AccessTier::Public => &[AccessTier::Public],
            AccessTier::Unlisted => &[AccessTier::Unlisted],
            AccessTier::Private => &AccessTier::ALL,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TierError {
    #[error("tier name for {0:?} is empty")]
    EmptyName(AccessTier),

    #[error("tier name {0:?} is used by more than one tier")]
    DuplicateName(String),
}

/// A tier together with its client-facing name and physical root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierRoot {
    pub tier: AccessTier,
    pub name: String,
    pub root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TierResolver {
    // Indexed in `AccessTier::ALL` order.
    roots: [TierRoot; 3],
}

impl TierResolver {
    pub fn new(public: TierRoot, unlisted: TierRoot, private: TierRoot) -> Result<Self, TierError> {
        let roots = [public, unlisted, private];
        for (i, root) in roots.iter().enumerate() {
            if root.name.is_empty() {
                return Err(TierError::EmptyName(root.tier));
            }
            if roots[..i].iter().any(|other| other.name == root.name) {
                return Err(TierError::DuplicateName(root.name.clone()));
            }
        }
        Ok(Self { roots })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, TierError> {
        Self::new(
            TierRoot {
                tier: AccessTier::Public,
                name: config.public_name.clone(),
                root: config.public_dir.clone(),
            },
            TierRoot {
                tier: AccessTier::Unlisted,
                name: config.unlisted_name.clone(),
                root: config.unlisted_dir.clone(),
            },
            TierRoot {
                tier: AccessTier::Private,
                name: config.private_name.clone(),
                root: config.private_dir.clone(),
            },
        )
    }

    /// Direct access: the one root a tier name maps to. Unknown names are a
    /// client error, never a fallback to some default tier.
    pub fn resolve(&self, name: &str) -> Option<&TierRoot> {
        self.roots.iter().find(|r| r.name == name)
    }

    /// Listing access: every root visible from the named tier.
    pub fn expand(&self, name: &str) -> Vec<&TierRoot> {
        match self.resolve(name) {
            Some(found) => found.tier.visible().iter().map(|t| self.get(*t)).collect(),
            None => Vec::new(),
        }
    }

    pub fn get(&self, tier: AccessTier) -> &TierRoot {
        match tier {
            AccessTier::Public => &self.roots[0],
            AccessTier::Unlisted => &self.roots[1],
            AccessTier::Private => &self.roots[2],
        }
    }
}
