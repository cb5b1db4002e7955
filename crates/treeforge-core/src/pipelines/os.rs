use super::rpm_stage;
use crate::manifest::{Manifest, ManifestId};
use crate::pipeline::{Base, Pipeline, PipelineHandle, Tree};
use serde_json::{json, Map, Value};
use tracing::warn;
use treeforge_schema::{
    CommitSpec, ContainerSpec, InlineFile, PackageSet, PackageSpec, PipelineName, Platform, Sources,
    Stage,
};

/// The operating system tree.
///
/// Installs a base package set and an optional extra set resolved on top of
/// it, then applies containers, inline files and basic system configuration.
pub struct OsTree {
    base: Base,
    platform: Platform,
    base_packages: PackageSet,
    extra_packages: Option<PackageSet>,
    hostname: Option<String>,
    timezone: Option<String>,
    locale: Option<String>,
    files: Vec<InlineFile>,
    containers: Vec<ContainerSpec>,
    ostree_parent: Option<CommitSpec>,
}

impl OsTree {
    pub fn new(
        manifest: &Manifest,
        name: impl Into<PipelineName>,
        build: &PipelineHandle,
        platform: Platform,
        packages: PackageSet,
    ) -> Self {
        Self {
            base: Base::new(manifest, name, Some(build)),
            platform,
            base_packages: packages,
            extra_packages: None,
            hostname: None,
            timezone: None,
            locale: None,
            files: Vec::new(),
            containers: Vec::new(),
            ostree_parent: None,
        }
    }

    pub fn with_extra_packages(mut self, packages: PackageSet) -> Self {
        self.extra_packages = Some(packages);
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_files(mut self, files: Vec<InlineFile>) -> Self {
        self.files = files;
        self
    }

    pub fn with_containers(mut self, containers: Vec<ContainerSpec>) -> Self {
        self.containers = containers;
        self
    }

    /// Commit whose user and group databases the tree must stay compatible
    /// with.
    pub fn with_ostree_parent(mut self, parent: CommitSpec) -> Self {
        self.ostree_parent = Some(parent);
        self
    }

    fn passwd_stage(parent: &CommitSpec) -> Stage {
        Stage::new("org.osbuild.ostree.passwd").with_inputs(json!({
            "commits": {
                "type": "org.osbuild.ostree",
                "origin": "org.osbuild.source",
                "references": [parent.checksum],
            }
        }))
    }

    fn skopeo_stage(&self) -> Stage {
        let references: Map<String, Value> = self
            .containers
            .iter()
            .map(|c| (c.digest.clone(), json!({ "name": c.local_name })))
            .collect();
        Stage::new("org.osbuild.skopeo")
            .with_inputs(json!({
                "images": {
                    "type": "org.osbuild.containers",
                    "origin": "org.osbuild.source",
                    "references": references,
                }
            }))
            .with_options(json!({ "destination": { "type": "containers-storage" } }))
    }

    fn copy_stage(&self) -> Stage {
        let ids: Vec<String> = self
            .files
            .iter()
            .map(|f| Sources::inline_id(&f.data))
            .collect();
        let paths: Vec<Value> = self
            .files
            .iter()
            .zip(&ids)
            .map(|(file, id)| {
                json!({
                    "from": format!("input://inlinefile/{id}"),
                    "to": format!("tree://{}", file.path),
                })
            })
            .collect();
        Stage::new("org.osbuild.copy")
            .with_inputs(json!({
                "inlinefile": {
                    "type": "org.osbuild.files",
                    "origin": "org.osbuild.source",
                    "references": ids,
                }
            }))
            .with_options(json!({ "paths": paths }))
    }
}

impl Pipeline for OsTree {
    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    fn build_packages(&self) -> Vec<String> {
        let mut packages = vec!["rpm".to_owned()];
        if !self.containers.is_empty() {
            packages.push("skopeo".to_owned());
        }
        if self.ostree_parent.is_some() {
            packages.push("ostree".to_owned());
        }
        packages.sort();
        packages
    }

    fn package_set_chain(&self) -> Vec<PackageSet> {
        std::iter::once(&self.base_packages)
            .chain(self.extra_packages.as_ref())
            .cloned()
            .collect()
    }

    fn package_specs(&self) -> Vec<PackageSpec> {
        self.base.resolved_specs()
    }

    fn ostree_commits(&self) -> Vec<CommitSpec> {
        self.ostree_parent.iter().cloned().collect()
    }

    fn container_specs(&self) -> Vec<ContainerSpec> {
        self.containers.clone()
    }

    fn inline(&self) -> Vec<String> {
        self.files.iter().map(|f| f.data.clone()).collect()
    }

    fn as_tree(&self) -> Option<&dyn Tree> {
        Some(self)
    }

    fn on_serialize_start(&mut self) {
        if self.base.resolved_set(0).is_empty() && !self.base_packages.include.is_empty() {
            warn!(
                pipeline = %self.base.name(),
                "base package set resolved to no packages"
            );
        }
    }

    fn stages(&self) -> Vec<Stage> {
        let mut stages = Vec::new();
        if let Some(parent) = &self.ostree_parent {
            stages.push(Self::passwd_stage(parent));
        }
        let specs = self.base.resolved_specs();
        if !specs.is_empty() {
            stages.push(rpm_stage(&specs));
        }
        if !self.containers.is_empty() {
            stages.push(self.skopeo_stage());
        }
        if !self.files.is_empty() {
            stages.push(self.copy_stage());
        }
        if let Some(hostname) = &self.hostname {
            stages.push(
                Stage::new("org.osbuild.hostname").with_options(json!({ "hostname": hostname })),
            );
        }
        if let Some(zone) = &self.timezone {
            stages.push(Stage::new("org.osbuild.timezone").with_options(json!({ "zone": zone })));
        }
        if let Some(language) = &self.locale {
            stages.push(
                Stage::new("org.osbuild.locale").with_options(json!({ "language": language })),
            );
        }
        stages
    }
}

impl Tree for OsTree {
    fn name(&self) -> &PipelineName {
        self.base.name()
    }

    fn manifest(&self) -> ManifestId {
        self.base.manifest()
    }

    fn platform(&self) -> &Platform {
        &self.platform
    }
}
