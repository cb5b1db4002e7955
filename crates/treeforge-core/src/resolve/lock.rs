use super::{ResolveError, Resolver};
use std::path::Path;
use tracing::debug;
use treeforge_schema::{ComposeLock, PackageSet, PackageSpec, PipelineName};

/// Answers resolution requests from a previously written lock file.
pub struct LockResolver {
    lock: ComposeLock,
}

impl LockResolver {
    /// Wrap a lock, refusing one whose content does not match its `lock_id`.
    pub fn new(lock: ComposeLock) -> Result<Self, ResolveError> {
        lock.verify_integrity()?;
        Ok(Self { lock })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ResolveError> {
        let path = path.as_ref();
        debug!("loading lock file {}", path.display());
        Self::new(ComposeLock::read_from_file(path)?)
    }

    pub fn lock(&self) -> &ComposeLock {
        &self.lock
    }
}

impl Resolver for LockResolver {
    fn name(&self) -> &str {
        "lock"
    }

    fn resolve(
        &self,
        pipeline: &PipelineName,
        chain: &[PackageSet],
    ) -> Result<Vec<Vec<PackageSpec>>, ResolveError> {
        let sets = self
            .lock
            .resolved_for(pipeline)
            .ok_or_else(|| ResolveError::MissingPipeline(pipeline.clone()))?;
        if sets.len() != chain.len() {
            return Err(ResolveError::ChainLength {
                pipeline: pipeline.clone(),
                declared: chain.len(),
                resolved: sets.len(),
            });
        }
        self.lock.verify_chain(pipeline, chain)?;
        Ok(sets)
    }
}
