//! The seam to the external package resolver.
//!
//! The manifest never resolves package names itself. It hands each declared
//! package-set chain to a [`Resolver`] and feeds the answer back into the
//! pipelines when serializing.

pub mod lock;
pub mod mock;

pub use lock::LockResolver;
pub use mock::MockResolver;

use std::path::Path;
use thiserror::Error;
use treeforge_schema::{LockError, PackageSet, PackageSpec, PipelineName};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("lock error: {0}")]
    Lock(#[from] LockError),
    #[error("no resolution for pipeline '{0}'")]
    MissingPipeline(PipelineName),
    #[error("pipeline '{pipeline}' declares {declared} package set(s), resolver returned {resolved}")]
    ChainLength {
        pipeline: PipelineName,
        declared: usize,
        resolved: usize,
    },
    #[error("resolver '{0}' is not available")]
    Unavailable(String),
}

pub trait Resolver: Send + Sync {
    fn name(&self) -> &str;

    /// Resolve a package-set chain for one pipeline.
    ///
    /// Returns one spec list per set, in chain order. Each set is resolved on
    /// top of the sets before it.
    fn resolve(
        &self,
        pipeline: &PipelineName,
        chain: &[PackageSet],
    ) -> Result<Vec<Vec<PackageSpec>>, ResolveError>;
}

pub fn select_resolver(name: &str, lock_path: &Path) -> Result<Box<dyn Resolver>, ResolveError> {
    match name {
        "lock" => Ok(Box::new(LockResolver::from_file(lock_path)?)),
        "mock" => Ok(Box::new(MockResolver::new())),
        other => Err(ResolveError::Unavailable(other.to_owned())),
    }
}
