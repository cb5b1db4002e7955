//! The pipeline capability contract.
//!
//! A pipeline conceptually represents a named filesystem tree, optionally
//! generated inside a build root that is itself another pipeline. All inputs
//! to a pipeline are explicit: other pipelines (by handle), content declared
//! through the dependency accessors and resolved externally, or static
//! parameters of the concrete type.
//!
//! Concrete kinds own a [`Base`] and implement [`Pipeline`], overriding only
//! what differs from the defaults. Serialization goes through
//! [`PipelineLifecycle`], which is implemented for every pipeline and cannot
//! be overridden, so the state checks always run.

use crate::lifecycle::{validate_transition, SerializeState};
use crate::manifest::{Manifest, ManifestId, PipelineId};
use crate::violation::{violated, InvariantViolation};
use thiserror::Error;
use tracing::{debug, trace};
use treeforge_schema::{
    Artifact, CommitSpec, ContainerSpec, PackageSet, PackageSpec, PipelineName, Platform, Stage,
    StageDescription,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("pipeline '{pipeline}' does not support {operation}")]
    Unsupported {
        pipeline: PipelineName,
        operation: &'static str,
    },
}

/// Non-owning reference to a registered pipeline.
///
/// Only [`Manifest::add`] mints handles, so holding one proves the referenced
/// pipeline exists in that manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineHandle {
    pub(crate) manifest: ManifestId,
    pub(crate) id: PipelineId,
    pub(crate) name: PipelineName,
}

impl PipelineHandle {
    pub fn name(&self) -> &PipelineName {
        &self.name
    }

    pub fn manifest(&self) -> ManifestId {
        self.manifest
    }
}

/// State shared by every pipeline kind.
#[derive(Debug)]
pub struct Base {
    manifest: ManifestId,
    name: PipelineName,
    build: Option<PipelineHandle>,
    checkpoint: bool,
    export: bool,
    state: SerializeState,
    resolved: Vec<Vec<PackageSpec>>,
}

impl Base {
    /// Create the shared state for a pipeline named `name` in `manifest`.
    ///
    /// `build` is the pipeline whose output is used as the build root. Without
    /// one the host filesystem is the build root and the engine detects the
    /// runner itself; that is only reproducible for the build pipeline itself.
    ///
    /// # Panics
    ///
    /// If `build` belongs to a different manifest. Such a reference could
    /// never be resolved by name when the manifest is executed.
    pub fn new(
        manifest: &Manifest,
        name: impl Into<PipelineName>,
        build: Option<&PipelineHandle>,
    ) -> Self {
        let name = name.into();
        if let Some(build) = build {
            if build.manifest != manifest.id() {
                violated(InvariantViolation::CrossManifestBuildRoot {
                    pipeline: name,
                    build_root: build.name.clone(),
                });
            }
        }
        Self {
            manifest: manifest.id(),
            name,
            build: build.cloned(),
            checkpoint: false,
            export: false,
            state: SerializeState::Unserialized,
            resolved: Vec::new(),
        }
    }

    pub fn name(&self) -> &PipelineName {
        &self.name
    }

    pub fn manifest(&self) -> ManifestId {
        self.manifest
    }

    pub fn build(&self) -> Option<&PipelineHandle> {
        self.build.as_ref()
    }

    /// Mark the output as cacheable by the engine.
    pub fn checkpoint(&mut self) {
        self.checkpoint = true;
    }

    /// Mark the output as a deliverable of the manifest. Called by exporting
    /// kinds from their [`Pipeline::export`].
    pub(crate) fn mark_export(&mut self) {
        self.export = true;
    }

    pub(crate) fn get_checkpoint(&self) -> bool {
        self.checkpoint
    }

    pub(crate) fn get_export(&self) -> bool {
        self.export
    }

    pub fn state(&self) -> SerializeState {
        self.state
    }

    /// Resolved specs for the `index`-th declared package set. Empty outside
    /// of a serialization pass.
    pub fn resolved_set(&self, index: usize) -> &[PackageSpec] {
        self.resolved.get(index).map_or(&[], Vec::as_slice)
    }

    /// All resolved specs of the current pass, in chain order.
    pub fn resolved_specs(&self) -> Vec<PackageSpec> {
        self.resolved.iter().flatten().cloned().collect()
    }

    /// The part of the stage description every pipeline shares.
    pub fn serialize(&self) -> StageDescription {
        let mut desc = StageDescription::new(self.name.clone());
        if let Some(build) = &self.build {
            desc.build = Some(build.name.reference());
        }
        desc
    }

    fn transition(&mut self, to: SerializeState) {
        if let Err(violation) = validate_transition(&self.name, self.state, to) {
            violated(violation);
        }
        trace!(pipeline = %self.name, from = %self.state, to = %to, "serialize transition");
        self.state = to;
    }
}

/// The operations every stage-producing type supports.
///
/// Every method except [`Pipeline::base`] and [`Pipeline::base_mut`] has a
/// default. Dependency accessors return empty collections unless the kind
/// actually needs that content.
pub trait Pipeline: Send {
    fn base(&self) -> &Base;

    fn base_mut(&mut self) -> &mut Base;

    /// Unique within the owning manifest, immutable.
    fn name(&self) -> &PipelineName {
        self.base().name()
    }

    fn checkpoint(&mut self) {
        self.base_mut().checkpoint();
    }

    /// Mark the pipeline for export and return a handle to what it produces.
    fn export(&mut self) -> Result<Artifact, PipelineError> {
        Err(PipelineError::Unsupported {
            pipeline: self.name().clone(),
            operation: "export",
        })
    }

    /// Packages the build root must contain to run this pipeline's stages.
    fn build_packages(&self) -> Vec<String> {
        Vec::new()
    }

    /// Package sets to resolve, in order. Each set is resolved on top of the
    /// ones before it.
    fn package_set_chain(&self) -> Vec<PackageSet> {
        Vec::new()
    }

    /// Resolved packages this pipeline installs. Only meaningful during a
    /// serialization pass.
    fn package_specs(&self) -> Vec<PackageSpec> {
        Vec::new()
    }

    fn ostree_commits(&self) -> Vec<CommitSpec> {
        Vec::new()
    }

    fn container_specs(&self) -> Vec<ContainerSpec> {
        Vec::new()
    }

    /// Inline content blobs referenced by this pipeline's stages.
    fn inline(&self) -> Vec<String> {
        Vec::new()
    }

    /// Other pipelines consumed as stage inputs. The build root is not listed.
    fn inputs(&self) -> Vec<PipelineHandle> {
        Vec::new()
    }

    /// Called when a pipeline using this one as build root is registered.
    fn add_dependent(&mut self, _dependent: &PipelineName, _build_packages: Vec<String>) {}

    fn as_tree(&self) -> Option<&dyn Tree> {
        None
    }

    /// Runs after resolved specs were injected into [`Base`].
    fn on_serialize_start(&mut self) {}

    fn runner(&self) -> Option<String> {
        None
    }

    fn stages(&self) -> Vec<Stage> {
        Vec::new()
    }

    /// Drop any state derived in [`Pipeline::on_serialize_start`].
    fn on_serialize_end(&mut self) {}
}

/// The two-phase serialization lifecycle.
///
/// For each pass: [`serialize_start`](Self::serialize_start), then
/// [`serialize`](Self::serialize), then [`serialize_end`](Self::serialize_end),
/// each exactly once. Out-of-order calls panic.
pub trait PipelineLifecycle {
    /// Inject the resolved specs, one entry per declared package set, in the
    /// order [`Pipeline::package_set_chain`] declared them.
    fn serialize_start(&mut self, resolved: Vec<Vec<PackageSpec>>);

    /// Turn the pipeline into its stage description.
    fn serialize(&mut self) -> StageDescription;

    /// Release the state held for this pass.
    fn serialize_end(&mut self);
}

impl<P: Pipeline + ?Sized> PipelineLifecycle for P {
    fn serialize_start(&mut self, resolved: Vec<Vec<PackageSpec>>) {
        self.base_mut().transition(SerializeState::Started);
        let declared = self.package_set_chain().len();
        if resolved.len() != declared {
            violated(InvariantViolation::ChainMismatch {
                pipeline: self.name().clone(),
                declared,
                resolved: resolved.len(),
            });
        }
        debug!(pipeline = %self.name(), sets = declared, "serialize start");
        self.base_mut().resolved = resolved;
        self.on_serialize_start();
    }

    fn serialize(&mut self) -> StageDescription {
        self.base_mut().transition(SerializeState::Serialized);
        let mut desc = self.base().serialize();
        desc.runner = self.runner();
        desc.stages = self.stages();
        desc
    }

    fn serialize_end(&mut self) {
        self.base_mut().transition(SerializeState::Unserialized);
        self.on_serialize_end();
        self.base_mut().resolved = Vec::new();
    }
}

/// Read-only view of a top-level, tree-producing pipeline.
pub trait Tree {
    fn name(&self) -> &PipelineName;

    fn manifest(&self) -> ManifestId;

    fn platform(&self) -> &Platform;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::{BuildPipeline, TarArchive};
    use treeforge_schema::Checksum;

    struct Plain {
        base: Base,
    }

    impl Pipeline for Plain {
        fn base(&self) -> &Base {
            &self.base
        }

        fn base_mut(&mut self) -> &mut Base {
            &mut self.base
        }
    }

    struct Chained {
        base: Base,
        sets: usize,
        consumed: Vec<Vec<String>>,
    }

    impl Pipeline for Chained {
        fn base(&self) -> &Base {
            &self.base
        }

        fn base_mut(&mut self) -> &mut Base {
            &mut self.base
        }

        fn package_set_chain(&self) -> Vec<PackageSet> {
            (0..self.sets)
                .map(|i| PackageSet::new(vec![format!("set{i}")], Vec::new()))
                .collect()
        }

        fn on_serialize_start(&mut self) {
            self.consumed = (0..self.sets)
                .map(|i| {
                    self.base
                        .resolved_set(i)
                        .iter()
                        .map(|s| s.name.clone())
                        .collect()
                })
                .collect();
        }

        fn on_serialize_end(&mut self) {
            self.consumed.clear();
        }
    }

    fn spec(name: &str) -> PackageSpec {
        PackageSpec {
            name: name.to_owned(),
            epoch: 0,
            version: "1".to_owned(),
            release: "1".to_owned(),
            arch: "noarch".to_owned(),
            remote_location: format!("https://mirror.example/{name}.rpm"),
            checksum: Checksum::new(format!("sha256:{name}")),
        }
    }

    fn plain(manifest: &Manifest, name: &str) -> Plain {
        Plain {
            base: Base::new(manifest, name, None),
        }
    }

    #[test]
    fn defaults_are_empty() {
        let m = Manifest::new();
        let p = plain(&m, "p");
        assert!(p.build_packages().is_empty());
        assert!(p.package_set_chain().is_empty());
        assert!(p.package_specs().is_empty());
        assert!(p.ostree_commits().is_empty());
        assert!(p.container_specs().is_empty());
        assert!(p.inline().is_empty());
        assert!(p.inputs().is_empty());
        assert!(p.as_tree().is_none());
        assert!(p.stages().is_empty());
        assert!(p.runner().is_none());
    }

    #[test]
    fn export_is_unsupported_by_default() {
        let m = Manifest::new();
        let mut p = plain(&m, "p");
        let expected = PipelineError::Unsupported {
            pipeline: PipelineName::new("p"),
            operation: "export",
        };
        assert_eq!(p.export(), Err(expected.clone()));
        p.checkpoint();
        assert_eq!(p.export(), Err(expected));
        assert!(!p.base().get_export());
    }

    #[test]
    fn checkpoint_is_idempotent() {
        let m = Manifest::new();
        let mut p = plain(&m, "p");
        assert!(!p.base().get_checkpoint());
        p.checkpoint();
        p.checkpoint();
        assert!(p.base().get_checkpoint());
        assert_eq!(p.name(), "p");
    }

    #[test]
    fn name_survives_a_serialization_pass() {
        let mut m = Manifest::new();
        let build = BuildPipeline::new(&m, "build", "org.osbuild.fedora40", PackageSet::default());
        let build = m.add(build).unwrap();
        let mut tar = TarArchive::new(&m, "archive", &build, &build, "root.tar");
        let before = tar.name().clone();

        tar.serialize_start(Vec::new());
        assert_eq!(*tar.name(), before);
        let desc = tar.serialize();
        assert_eq!(*tar.name(), before);
        tar.serialize_end();

        assert_eq!(*tar.name(), before);
        assert_eq!(desc.name, before);
    }

    #[test]
    fn serialize_without_build_root_omits_build() {
        let m = Manifest::new();
        let mut p = plain(&m, "build");
        p.serialize_start(Vec::new());
        let desc = p.serialize();
        p.serialize_end();
        assert_eq!(desc, StageDescription::new(PipelineName::new("build")));
        assert!(desc.build.is_none());
    }

    #[test]
    fn resolved_specs_follow_chain_positions() {
        let m = Manifest::new();
        let mut p = Chained {
            base: Base::new(&m, "tree", None),
            sets: 2,
            consumed: Vec::new(),
        };
        p.serialize_start(vec![vec![spec("r1a"), spec("r1b")], vec![spec("r2")]]);
        assert_eq!(p.consumed, vec![vec!["r1a", "r1b"], vec!["r2"]]);
        assert_eq!(p.base().resolved_set(0)[1].name, "r1b");
        assert_eq!(p.base().resolved_set(1)[0].name, "r2");
        assert!(p.base().resolved_set(2).is_empty());
        p.serialize();
        p.serialize_end();
        assert!(p.consumed.is_empty());
        assert!(p.base().resolved_specs().is_empty());
    }

    #[test]
    fn second_pass_sees_only_new_specs() {
        let m = Manifest::new();
        let mut p = Chained {
            base: Base::new(&m, "tree", None),
            sets: 1,
            consumed: Vec::new(),
        };
        p.serialize_start(vec![vec![spec("old")]]);
        let first = p.serialize();
        p.serialize_end();

        p.serialize_start(vec![vec![spec("new")]]);
        assert_eq!(p.consumed, vec![vec!["new"]]);
        assert_eq!(p.base().resolved_specs(), vec![spec("new")]);
        let second = p.serialize();
        p.serialize_end();

        assert_eq!(first, second);
        assert_eq!(p.base().state(), SerializeState::Unserialized);
    }

    #[test]
    #[should_panic(expected = "invalid serialization transition unserialized -> serialized")]
    fn serialize_before_start_panics() {
        let m = Manifest::new();
        let mut p = plain(&m, "p");
        p.serialize();
    }

    #[test]
    #[should_panic(expected = "invalid serialization transition started -> started")]
    fn double_start_panics() {
        let m = Manifest::new();
        let mut p = plain(&m, "p");
        p.serialize_start(Vec::new());
        p.serialize_start(Vec::new());
    }

    #[test]
    #[should_panic(expected = "invalid serialization transition started -> unserialized")]
    fn end_without_serialize_panics() {
        let m = Manifest::new();
        let mut p = plain(&m, "p");
        p.serialize_start(Vec::new());
        p.serialize_end();
    }

    #[test]
    #[should_panic(expected = "invalid serialization transition serialized -> serialized")]
    fn double_serialize_panics() {
        let m = Manifest::new();
        let mut p = plain(&m, "p");
        p.serialize_start(Vec::new());
        p.serialize();
        p.serialize();
    }

    #[test]
    #[should_panic(expected = "declares 2 package set(s) but was given 1")]
    fn misaligned_resolution_panics() {
        let m = Manifest::new();
        let mut p = Chained {
            base: Base::new(&m, "tree", None),
            sets: 2,
            consumed: Vec::new(),
        };
        p.serialize_start(vec![vec![spec("r1")]]);
    }
}
