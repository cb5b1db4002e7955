//! Pipeline abstraction and manifest serialization for treeforge.
//!
//! A build is described as a [`Manifest`] of named pipelines. Each pipeline
//! produces a filesystem tree, optionally generated inside a build root that
//! is itself another pipeline of the same manifest. Pipelines declare what
//! they need from the outside world (packages, commits, containers, inline
//! data), a [`Resolver`] pins that down, and a two-phase serialization pass
//! turns the graph into a [`SerializedManifest`](treeforge_schema::SerializedManifest)
//! for the build engine.

pub mod assemble;
pub mod lifecycle;
pub mod manifest;
pub mod pipeline;
pub mod pipelines;
pub mod resolve;
pub mod violation;

pub use assemble::{assemble, Assembled, ComposeResult, Composer, DEFAULT_LOCK_NAME};
pub use lifecycle::{validate_transition, SerializeState};
pub use manifest::{
    DependencyReport, Manifest, ManifestError, ManifestId, PipelineDependencies, PipelineId,
    ResolvedPackages,
};
pub use pipeline::{Base, Pipeline, PipelineError, PipelineHandle, PipelineLifecycle, Tree};
pub use pipelines::{BuildPipeline, OsTree, TarArchive};
pub use resolve::{select_resolver, LockResolver, MockResolver, ResolveError, Resolver};
pub use violation::InvariantViolation;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("compose error: {0}")]
    Compose(#[from] treeforge_schema::ComposeError),
    #[error("lock error: {0}")]
    Lock(#[from] treeforge_schema::LockError),
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
