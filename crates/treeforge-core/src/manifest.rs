//! The manifest owns every pipeline of one build and drives dependency
//! aggregation, resolution and serialization over the whole graph.

use crate::pipeline::{Pipeline, PipelineError, PipelineHandle, PipelineLifecycle, Tree};
use crate::resolve::{ResolveError, Resolver};
use crate::violation::{violated, InvariantViolation};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info};
use treeforge_schema::stage::{CurlSource, OstreeRemote, OstreeSource, SkopeoImage, SkopeoSource};
use treeforge_schema::{
    Artifact, CommitSpec, ContainerSpec, PackageSet, PackageSpec, PipelineName, SerializedManifest,
    Sources,
};

/// Resolver output: one entry per pipeline with a non-empty chain, holding
/// one spec list per declared set in chain order.
pub type ResolvedPackages = BTreeMap<PipelineName, Vec<Vec<PackageSpec>>>;

static NEXT_MANIFEST_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Manifest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManifestId(u64);

impl std::fmt::Display for ManifestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "manifest#{}", self.0)
    }
}

/// Index of a pipeline in its manifest's registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId(pub(crate) usize);

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("pipeline name '{0}' is already registered in this manifest")]
    DuplicatePipeline(PipelineName),
    #[error("pipeline '{0}' declares package sets but no resolution was provided")]
    Unresolved(PipelineName),
    #[error("pipeline '{pipeline}' declares {declared} package set(s), resolution has {resolved}")]
    ChainLength {
        pipeline: PipelineName,
        declared: usize,
        resolved: usize,
    },
    #[error("unknown pipeline: {0}")]
    UnknownPipeline(String),
}

/// Everything one pipeline needs from outside the manifest.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PipelineDependencies {
    pub pipeline: PipelineName,
    pub build_packages: Vec<String>,
    pub package_sets: Vec<PackageSet>,
    pub ostree_commits: Vec<CommitSpec>,
    pub containers: Vec<ContainerSpec>,
    pub inline: Vec<String>,
}

/// Dependency declarations of a whole manifest, in registration order.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DependencyReport {
    pub pipelines: Vec<PipelineDependencies>,
}

impl DependencyReport {
    pub fn for_pipeline(&self, name: &str) -> Option<&PipelineDependencies> {
        self.pipelines.iter().find(|p| p.pipeline == name)
    }

    /// Package-set chains keyed by pipeline; chain order is preserved.
    pub fn package_set_chains(&self) -> BTreeMap<PipelineName, Vec<PackageSet>> {
        self.pipelines
            .iter()
            .map(|p| (p.pipeline.clone(), p.package_sets.clone()))
            .collect()
    }

    /// Sorted, deduplicated union of every pipeline's build packages.
    pub fn build_packages(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .pipelines
            .iter()
            .flat_map(|p| p.build_packages.iter().cloned())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    pub fn ostree_commits(&self) -> Vec<CommitSpec> {
        self.pipelines
            .iter()
            .flat_map(|p| p.ostree_commits.iter().cloned())
            .collect()
    }

    pub fn containers(&self) -> Vec<ContainerSpec> {
        self.pipelines
            .iter()
            .flat_map(|p| p.containers.iter().cloned())
            .collect()
    }
}

/// Registry and owner of all pipelines in one build.
///
/// Pipelines are serialized in registration order. A pipeline can only
/// reference another through a [`PipelineHandle`], and handles only exist
/// for registered pipelines, so registration order is always a valid
/// dependency order.
pub struct Manifest {
    id: ManifestId,
    pipelines: Vec<Box<dyn Pipeline>>,
    index: HashMap<PipelineName, PipelineId>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manifest")
            .field("id", &self.id)
            .field(
                "pipelines",
                &self.pipelines.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            id: ManifestId(NEXT_MANIFEST_ID.fetch_add(1, Ordering::Relaxed)),
            pipelines: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn id(&self) -> ManifestId {
        self.id
    }

    /// Register a pipeline and return the handle other pipelines use to
    /// reference it.
    ///
    /// # Panics
    ///
    /// If the pipeline was constructed for another manifest, or references a
    /// handle that is not registered here.
    pub fn add<P: Pipeline + 'static>(
        &mut self,
        pipeline: P,
    ) -> Result<PipelineHandle, ManifestError> {
        let name = pipeline.name().clone();
        if pipeline.base().manifest() != self.id {
            violated(InvariantViolation::ForeignPipeline { pipeline: name });
        }
        if self.index.contains_key(&name) {
            return Err(ManifestError::DuplicatePipeline(name));
        }

        let build = pipeline.base().build().cloned();
        for reference in build.iter().chain(pipeline.inputs().iter()) {
            self.check_reference(&name, reference);
        }

        if let Some(build) = &build {
            let packages = pipeline.build_packages();
            self.pipelines[build.id.0].add_dependent(&name, packages);
        }

        let id = PipelineId(self.pipelines.len());
        debug!(
            pipeline = %name,
            build = build.as_ref().map(|b| b.name.as_str()).unwrap_or("host"),
            "registered pipeline"
        );
        self.pipelines.push(Box::new(pipeline));
        self.index.insert(name.clone(), id);

        Ok(PipelineHandle {
            manifest: self.id,
            id,
            name,
        })
    }

    fn check_reference(&self, pipeline: &PipelineName, reference: &PipelineHandle) {
        let known = reference.manifest == self.id
            && self
                .pipelines
                .get(reference.id.0)
                .is_some_and(|p| *p.name() == reference.name);
        if !known {
            violated(InvariantViolation::UnknownReference {
                pipeline: pipeline.clone(),
                reference: reference.name.clone(),
            });
        }
    }

    fn pipeline_mut(&mut self, handle: &PipelineHandle) -> &mut dyn Pipeline {
        if handle.manifest != self.id {
            violated(InvariantViolation::ForeignPipeline {
                pipeline: handle.name.clone(),
            });
        }
        &mut *self.pipelines[handle.id.0]
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Pipeline> {
        self.index
            .get(name)
            .map(|id| &*self.pipelines[id.0])
    }

    pub fn handle(&self, name: &str) -> Option<PipelineHandle> {
        self.index.get(name).map(|id| PipelineHandle {
            manifest: self.id,
            id: *id,
            name: self.pipelines[id.0].name().clone(),
        })
    }

    pub fn tree(&self, name: &str) -> Option<&dyn Tree> {
        self.get(name).and_then(|p| p.as_tree())
    }

    /// Pipelines in registration order.
    pub fn pipelines(&self) -> impl Iterator<Item = &dyn Pipeline> + '_ {
        self.pipelines.iter().map(|p| &**p)
    }

    pub fn checkpoint(&mut self, handle: &PipelineHandle) {
        self.pipeline_mut(handle).checkpoint();
    }

    /// Mark a pipeline's output as a deliverable.
    ///
    /// # Panics
    ///
    /// If the pipeline kind does not produce an exportable artifact.
    pub fn export(&mut self, handle: &PipelineHandle) -> Artifact {
        match self.pipeline_mut(handle).export() {
            Ok(artifact) => artifact,
            Err(PipelineError::Unsupported { pipeline, .. }) => {
                violated(InvariantViolation::UnsupportedExport { pipeline })
            }
        }
    }

    /// Names of the pipelines the engine should cache.
    pub fn checkpoints(&self) -> Vec<PipelineName> {
        self.pipelines
            .iter()
            .filter(|p| p.base().get_checkpoint())
            .map(|p| p.name().clone())
            .collect()
    }

    /// Names of the pipelines whose output is a deliverable.
    pub fn exports(&self) -> Vec<PipelineName> {
        self.pipelines
            .iter()
            .filter(|p| p.base().get_export())
            .map(|p| p.name().clone())
            .collect()
    }

    /// Collect the dependency declarations of every pipeline.
    pub fn dependencies(&self) -> DependencyReport {
        DependencyReport {
            pipelines: self
                .pipelines
                .iter()
                .map(|p| PipelineDependencies {
                    pipeline: p.name().clone(),
                    build_packages: p.build_packages(),
                    package_sets: p.package_set_chain(),
                    ostree_commits: p.ostree_commits(),
                    containers: p.container_specs(),
                    inline: p.inline(),
                })
                .collect(),
        }
    }

    /// Resolve every declared package-set chain through `resolver`.
    pub fn resolve(&self, resolver: &dyn Resolver) -> Result<ResolvedPackages, ResolveError> {
        info!("resolving package sets with {} resolver", resolver.name());
        let mut resolved = ResolvedPackages::new();
        for pipeline in &self.pipelines {
            let chain = pipeline.package_set_chain();
            if chain.is_empty() {
                continue;
            }
            let sets = resolver.resolve(pipeline.name(), &chain)?;
            if sets.len() != chain.len() {
                return Err(ResolveError::ChainLength {
                    pipeline: pipeline.name().clone(),
                    declared: chain.len(),
                    resolved: sets.len(),
                });
            }
            debug!(
                pipeline = %pipeline.name(),
                packages = sets.iter().map(Vec::len).sum::<usize>(),
                "resolved chain"
            );
            resolved.insert(pipeline.name().clone(), sets);
        }
        Ok(resolved)
    }

    /// Serialize every pipeline, in registration order, into one manifest.
    ///
    /// `resolved` must hold an entry for each pipeline with a non-empty
    /// package-set chain. That is checked before any pipeline starts its
    /// pass, so an error leaves every pipeline untouched.
    pub fn serialize(
        &mut self,
        resolved: &ResolvedPackages,
    ) -> Result<SerializedManifest, ManifestError> {
        for pipeline in &self.pipelines {
            let declared = pipeline.package_set_chain().len();
            let given = resolved.get(pipeline.name()).map_or(0, Vec::len);
            if declared > 0 && !resolved.contains_key(pipeline.name()) {
                return Err(ManifestError::Unresolved(pipeline.name().clone()));
            }
            if given != declared {
                return Err(ManifestError::ChainLength {
                    pipeline: pipeline.name().clone(),
                    declared,
                    resolved: given,
                });
            }
        }

        for pipeline in &mut self.pipelines {
            let specs = resolved.get(pipeline.name()).cloned().unwrap_or_default();
            pipeline.serialize_start(specs);
        }

        let descriptions: Vec<_> = self
            .pipelines
            .iter_mut()
            .map(|p| p.serialize())
            .collect();

        let mut sources = Sources::default();
        for pipeline in &self.pipelines {
            collect_sources(pipeline.as_ref(), &mut sources);
        }

        for pipeline in &mut self.pipelines {
            pipeline.serialize_end();
        }

        info!(
            pipelines = descriptions.len(),
            sources = sources.curl.len()
                + sources.inline.len()
                + sources.ostree.len()
                + sources.skopeo.len(),
            "serialized manifest"
        );
        Ok(SerializedManifest::new(descriptions, sources))
    }
}

fn collect_sources(pipeline: &dyn Pipeline, sources: &mut Sources) {
    for spec in pipeline.package_specs() {
        sources.curl.insert(
            spec.checksum.into_inner(),
            CurlSource {
                url: spec.remote_location,
            },
        );
    }
    for commit in pipeline.ostree_commits() {
        sources.ostree.insert(
            commit.checksum,
            OstreeSource {
                remote: OstreeRemote { url: commit.url },
            },
        );
    }
    for container in pipeline.container_specs() {
        sources.skopeo.insert(
            container.digest,
            SkopeoSource {
                image: SkopeoImage {
                    name: container.source,
                },
            },
        );
    }
    for data in pipeline.inline() {
        sources.add_inline(&data);
    }
}
