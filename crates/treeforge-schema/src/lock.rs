use crate::descriptor::{PackageSet, PackageSpec};
use crate::types::PipelineName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const LOCK_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lock file parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("lock file serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("unsupported lock_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("lock file lock_id mismatch: lock has '{lock_id}', recomputed '{computed_id}'")]
    LockIdMismatch {
        lock_id: String,
        computed_id: String,
    },
    #[error("lock file chain drift: {0}")]
    ChainDrift(String),
}

/// The resolved packages for one declared package set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockedSet {
    /// [`PackageSet::digest`] of the set these packages were resolved from.
    pub declared: String,
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
}

/// The lock file captures resolver output for every pipeline of a compose.
///
/// Each pipeline maps to one [`LockedSet`] per set in its package-set chain,
/// in chain order. Each set records the digest of the declaration it was
/// resolved from, so a compose file edited after locking is detected. The
/// `lock_id` is a blake3 digest over all of it, so a hand-edited lock is
/// detected too.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComposeLock {
    pub lock_version: u32,
    pub lock_id: String,
    #[serde(default)]
    pub pipelines: BTreeMap<PipelineName, Vec<LockedSet>>,
}

impl ComposeLock {
    /// Build a lock from resolver output, keyed by pipeline name.
    ///
    /// `chains` holds the declarations the output was resolved from; a set
    /// without a declaration gets an empty digest and never verifies.
    pub fn from_resolved(
        chains: &BTreeMap<PipelineName, Vec<PackageSet>>,
        resolved: &BTreeMap<PipelineName, Vec<Vec<PackageSpec>>>,
    ) -> Self {
        let pipelines = resolved
            .iter()
            .map(|(name, sets)| {
                let declared = chains.get(name).map_or(&[][..], Vec::as_slice);
                let sets = sets
                    .iter()
                    .enumerate()
                    .map(|(i, specs)| LockedSet {
                        declared: declared.get(i).map(PackageSet::digest).unwrap_or_default(),
                        packages: specs.clone(),
                    })
                    .collect();
                (name.clone(), sets)
            })
            .collect();

        let mut lock = ComposeLock {
            lock_version: LOCK_VERSION,
            lock_id: String::new(),
            pipelines,
        };
        lock.lock_id = lock.compute_lock_id();
        lock
    }

    /// Compute the lock identity from the locked content.
    ///
    /// Set boundaries are part of the hash: moving a package from one set to
    /// the next changes the id even though the flattened list is identical.
    pub fn compute_lock_id(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(format!("lock_version:{}", self.lock_version).as_bytes());

        for (name, sets) in &self.pipelines {
            hasher.update(format!("pipeline:{name}").as_bytes());
            for (i, set) in sets.iter().enumerate() {
                hasher.update(format!("set:{i}:{}", set.declared).as_bytes());
                for pkg in &set.packages {
                    hasher.update(
                        format!(
                            "pkg:{}:{}:{}",
                            pkg.nevra(),
                            pkg.checksum,
                            pkg.remote_location
                        )
                        .as_bytes(),
                    );
                }
            }
        }

        hasher.finalize().to_hex().to_string()
    }

    /// Recompute and store the lock id after the content was edited.
    pub fn seal(&mut self) {
        self.lock_id = self.compute_lock_id();
    }

    /// Verify that the stored lock id matches the locked content.
    pub fn verify_integrity(&self) -> Result<(), LockError> {
        if self.lock_version != LOCK_VERSION {
            return Err(LockError::UnsupportedVersion(self.lock_version));
        }
        let computed = self.compute_lock_id();
        if self.lock_id != computed {
            return Err(LockError::LockIdMismatch {
                lock_id: self.lock_id.clone(),
                computed_id: computed,
            });
        }
        Ok(())
    }

    /// Check that every declared chain has a locked entry resolved from the
    /// same declaration.
    pub fn verify_chains(
        &self,
        chains: &BTreeMap<PipelineName, Vec<PackageSet>>,
    ) -> Result<(), LockError> {
        for (name, chain) in chains {
            self.verify_chain(name, chain)?;
        }
        Ok(())
    }

    /// Check one pipeline's chain against the lock.
    ///
    /// A pipeline that declares an empty chain needs no entry.
    pub fn verify_chain(&self, pipeline: &str, chain: &[PackageSet]) -> Result<(), LockError> {
        if chain.is_empty() {
            return Ok(());
        }
        let Some(sets) = self.pipelines.get(pipeline) else {
            return Err(LockError::ChainDrift(format!(
                "pipeline '{pipeline}' declares {} package set(s) but is not in the lock file",
                chain.len()
            )));
        };
        if sets.len() != chain.len() {
            return Err(LockError::ChainDrift(format!(
                "pipeline '{pipeline}' declares {} package set(s), lock has {}",
                chain.len(),
                sets.len()
            )));
        }
        for (i, (locked, declared)) in sets.iter().zip(chain).enumerate() {
            if locked.declared != declared.digest() {
                return Err(LockError::ChainDrift(format!(
                    "package set {i} of pipeline '{pipeline}' changed since the lock was written; \
                     run 'treeforge lock' to re-resolve"
                )));
            }
        }
        Ok(())
    }

    /// Resolved specs for one pipeline, one `Vec` per set in chain order.
    pub fn resolved_for(&self, pipeline: &str) -> Option<Vec<Vec<PackageSpec>>> {
        self.pipelines
            .get(pipeline)
            .map(|sets| sets.iter().map(|s| s.packages.clone()).collect())
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), LockError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        let dir = path.parent().unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| LockError::Io(e.error))?;
        if let Ok(f) = fs::File::open(dir) {
            let _ = f.sync_all();
        }
        Ok(())
    }

    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}
