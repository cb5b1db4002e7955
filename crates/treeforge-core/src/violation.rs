//! Invariant violations: defects in manifest assembly or in a pipeline
//! implementation.
//!
//! These are never returned as `Result`. They are raised through
//! [`violated`], which logs and panics, and must not be caught and retried.
//! Recoverable conditions live in [`crate::CoreError`] and friends.

use crate::lifecycle::SerializeState;
use thiserror::Error;
use treeforge_schema::PipelineName;

#[derive(Debug, Error)]
pub enum InvariantViolation {
    #[error("pipeline '{pipeline}' uses build root '{build_root}' from a different manifest")]
    CrossManifestBuildRoot {
        pipeline: PipelineName,
        build_root: PipelineName,
    },
    #[error("pipeline '{pipeline}' was constructed for a different manifest")]
    ForeignPipeline { pipeline: PipelineName },
    #[error("pipeline '{pipeline}' references '{reference}', which is not registered in this manifest")]
    UnknownReference {
        pipeline: PipelineName,
        reference: PipelineName,
    },
    #[error("pipeline '{pipeline}': invalid serialization transition {from} -> {to}")]
    Lifecycle {
        pipeline: PipelineName,
        from: SerializeState,
        to: SerializeState,
    },
    #[error("pipeline '{pipeline}' cannot be exported")]
    UnsupportedExport { pipeline: PipelineName },
    #[error("pipeline '{pipeline}' declares {declared} package set(s) but was given {resolved}")]
    ChainMismatch {
        pipeline: PipelineName,
        declared: usize,
        resolved: usize,
    },
}

/// Abort on a broken invariant.
#[track_caller]
pub fn violated(violation: InvariantViolation) -> ! {
    tracing::error!("invariant violated: {violation}");
    panic!("invariant violated: {violation}");
}
