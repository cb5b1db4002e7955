//! Dependency descriptors, stage-description wire types, compose files and
//! lock files for treeforge.
//!
//! This crate defines the schema layer shared by every other crate: the
//! opaque content descriptors pipelines declare and consume (`PackageSet`,
//! `PackageSpec`, `CommitSpec`, `ContainerSpec`, `Artifact`, `Platform`), the
//! serialized output shape (`StageDescription`, `SerializedManifest`), TOML
//! compose file parsing and normalization (`ComposeFileV1`,
//! `NormalizedCompose`), and the resolver lock file (`ComposeLock`).

pub mod compose;
pub mod descriptor;
pub mod lock;
pub mod normalize;
pub mod platform;
pub mod stage;
pub mod types;

pub use compose::{
    parse_compose_file, parse_compose_str, ArchiveSection, BuildSection, ComposeError,
    ComposeFileV1, ContainerSection, OsSection, PlatformSection,
};
pub use descriptor::{Artifact, CommitSpec, ContainerSpec, InlineFile, PackageSet, PackageSpec};
pub use lock::{ComposeLock, LockError, LockedSet, LOCK_VERSION};
pub use normalize::{
    validate_pipeline_name, NormalizedArchive, NormalizedBuild, NormalizedCompose, NormalizedOs,
};
pub use platform::{Arch, Platform};
pub use stage::{SerializedManifest, Sources, Stage, StageDescription, MANIFEST_FORMAT_VERSION};
pub use types::{Checksum, PipelineName};
