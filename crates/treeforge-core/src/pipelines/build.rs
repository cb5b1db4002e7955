use super::rpm_stage;
use crate::manifest::Manifest;
use crate::pipeline::{Base, Pipeline};
use std::collections::BTreeMap;
use tracing::debug;
use treeforge_schema::{PackageSet, PackageSpec, PipelineName, Stage};

/// The build root: a tree generated on the host and used to run the stages
/// of every other pipeline.
///
/// Its package set grows with each pipeline that registers it as build root,
/// so the root always carries the tools its dependents need.
pub struct BuildPipeline {
    base: Base,
    runner: String,
    packages: PackageSet,
    dependents: BTreeMap<PipelineName, Vec<String>>,
}

impl BuildPipeline {
    pub fn new(
        manifest: &Manifest,
        name: impl Into<PipelineName>,
        runner: impl Into<String>,
        packages: PackageSet,
    ) -> Self {
        Self {
            base: Base::new(manifest, name, None),
            runner: runner.into(),
            packages,
            dependents: BTreeMap::new(),
        }
    }

    /// Pipelines that use this one as their build root.
    pub fn dependents(&self) -> impl Iterator<Item = &PipelineName> + '_ {
        self.dependents.keys()
    }
}

impl Pipeline for BuildPipeline {
    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    fn package_set_chain(&self) -> Vec<PackageSet> {
        let mut include: Vec<String> = self
            .packages
            .include
            .iter()
            .chain(self.dependents.values().flatten())
            .cloned()
            .collect();
        include.sort();
        include.dedup();
        if include.is_empty() {
            return Vec::new();
        }
        vec![PackageSet {
            include,
            ..self.packages.clone()
        }]
    }

    fn package_specs(&self) -> Vec<PackageSpec> {
        self.base.resolved_specs()
    }

    fn add_dependent(&mut self, dependent: &PipelineName, build_packages: Vec<String>) {
        debug!(
            build = %self.base.name(),
            dependent = %dependent,
            packages = build_packages.len(),
            "build root gained dependent"
        );
        self.dependents.insert(dependent.clone(), build_packages);
    }

    fn runner(&self) -> Option<String> {
        Some(self.runner.clone())
    }

    fn stages(&self) -> Vec<Stage> {
        let specs = self.base.resolved_set(0);
        if specs.is_empty() {
            return Vec::new();
        }
        vec![rpm_stage(specs)]
    }
}
