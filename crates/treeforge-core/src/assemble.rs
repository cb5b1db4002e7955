//! Compose file to manifest.
//!
//! [`assemble`] builds the pipeline graph of a normalized compose file: the
//! build root first, the OS tree on top of it and the optional archive of
//! that tree last. [`Composer`] wraps the whole flow from file to serialized
//! manifest.

use crate::manifest::{Manifest, ResolvedPackages};
use crate::pipeline::PipelineHandle;
use crate::pipelines::{BuildPipeline, OsTree, TarArchive};
use crate::resolve::Resolver;
use crate::CoreError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use treeforge_schema::{
    parse_compose_file, Artifact, ComposeLock, NormalizedCompose, PipelineName, SerializedManifest,
};

/// File name of the lock file kept next to a compose file.
pub const DEFAULT_LOCK_NAME: &str = "compose.lock";

/// A manifest built from a compose file, with handles to its pipelines.
#[derive(Debug)]
pub struct Assembled {
    pub manifest: Manifest,
    pub build: PipelineHandle,
    pub os: PipelineHandle,
    pub archive: Option<PipelineHandle>,
    pub artifact: Option<Artifact>,
}

/// Register the pipelines of `compose` into a fresh manifest.
pub fn assemble(compose: &NormalizedCompose) -> Result<Assembled, CoreError> {
    let mut manifest = Manifest::new();

    let build = BuildPipeline::new(
        &manifest,
        compose.build.name.clone(),
        compose.build.runner.clone(),
        compose.build.packages.clone(),
    );
    let build = manifest.add(build)?;
    if compose.build.checkpoint {
        manifest.checkpoint(&build);
    }

    let spec = &compose.os;
    let mut os = OsTree::new(
        &manifest,
        spec.name.clone(),
        &build,
        compose.platform.clone(),
        spec.base_packages.clone(),
    )
    .with_files(spec.files.clone())
    .with_containers(spec.containers.clone());
    if let Some(extra) = &spec.extra_packages {
        os = os.with_extra_packages(extra.clone());
    }
    if let Some(hostname) = &spec.hostname {
        os = os.with_hostname(hostname.clone());
    }
    if let Some(timezone) = &spec.timezone {
        os = os.with_timezone(timezone.clone());
    }
    if let Some(locale) = &spec.locale {
        os = os.with_locale(locale.clone());
    }
    if let Some(parent) = &spec.ostree_parent {
        os = os.with_ostree_parent(parent.clone());
    }
    let os = manifest.add(os)?;
    if spec.checkpoint {
        manifest.checkpoint(&os);
    }

    let (archive, artifact) = match &compose.archive {
        Some(archive) => {
            let tar = TarArchive::new(
                &manifest,
                archive.name.clone(),
                &build,
                &os,
                archive.filename.clone(),
            );
            let handle = manifest.add(tar)?;
            let artifact = manifest.export(&handle);
            (Some(handle), Some(artifact))
        }
        None => (None, None),
    };

    debug!("assembled {} pipelines", manifest.len());
    Ok(Assembled {
        manifest,
        build,
        os,
        archive,
        artifact,
    })
}

/// Result of a successful serialization.
#[derive(Debug)]
pub struct ComposeResult {
    pub manifest: SerializedManifest,
    pub checkpoints: Vec<PipelineName>,
    pub exports: Vec<PipelineName>,
    pub artifact: Option<Artifact>,
}

/// Drives a compose file through assembly, resolution and serialization.
#[derive(Debug)]
pub struct Composer {
    path: PathBuf,
    compose: NormalizedCompose,
}

impl Composer {
    /// Parse and normalize the compose file at `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        info!("loading compose file {}", path.display());
        let compose = parse_compose_file(&path)?.normalize()?;
        Ok(Self { path, compose })
    }

    pub fn from_normalized(path: impl Into<PathBuf>, compose: NormalizedCompose) -> Self {
        Self {
            path: path.into(),
            compose,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn compose(&self) -> &NormalizedCompose {
        &self.compose
    }

    /// `compose.lock` in the directory of the compose file.
    pub fn default_lock_path(&self) -> PathBuf {
        self.path
            .parent()
            .unwrap_or(Path::new("."))
            .join(DEFAULT_LOCK_NAME)
    }

    pub fn assemble(&self) -> Result<Assembled, CoreError> {
        assemble(&self.compose)
    }

    /// Resolve every pipeline through `resolver` and write the answers to a
    /// lock file at `path`.
    pub fn lock(&self, resolver: &dyn Resolver, path: &Path) -> Result<ComposeLock, CoreError> {
        let assembled = self.assemble()?;
        let resolved = assembled.manifest.resolve(resolver)?;
        let chains = assembled.manifest.dependencies().package_set_chains();
        let lock = ComposeLock::from_resolved(&chains, &resolved);
        lock.write_to_file(path)?;
        info!(
            "wrote lock file {} ({} pipelines, lock_id {})",
            path.display(),
            lock.pipelines.len(),
            &lock.lock_id[..12]
        );
        Ok(lock)
    }

    /// Load the lock file at `path` and check that it still matches the
    /// package-set chains the compose file declares.
    pub fn check_lock(&self, path: &Path) -> Result<ComposeLock, CoreError> {
        let lock = ComposeLock::read_from_file(path)?;
        lock.verify_integrity()?;
        let assembled = self.assemble()?;
        lock.verify_chains(&assembled.manifest.dependencies().package_set_chains())?;
        Ok(lock)
    }

    pub fn serialize(&self, resolver: &dyn Resolver) -> Result<ComposeResult, CoreError> {
        let mut assembled = self.assemble()?;
        let resolved: ResolvedPackages = assembled.manifest.resolve(resolver)?;
        let manifest = assembled.manifest.serialize(&resolved)?;
        Ok(ComposeResult {
            manifest,
            checkpoints: assembled.manifest.checkpoints(),
            exports: assembled.manifest.exports(),
            artifact: assembled.artifact,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::MockResolver;
    use treeforge_schema::parse_compose_str;

    const COMPOSE: &str = r#"
compose_version = 1

[platform]
arch = "x86_64"

[build]
runner = "org.osbuild.fedora40"
packages = ["rpm", "dnf"]
repositories = ["fedora"]
checkpoint = true

[os]
packages = ["bash", "kernel"]
extra_packages = ["vim-enhanced"]
hostname = "edge"

[archive]
filename = "root.tar"
"#;

    fn composer() -> Composer {
        let compose = parse_compose_str(COMPOSE).unwrap().normalize().unwrap();
        Composer::from_normalized("/srv/compose/compose.toml", compose)
    }

    #[test]
    fn assembles_in_dependency_order() {
        let assembled = composer().assemble().unwrap();
        let names: Vec<_> = assembled
            .manifest
            .pipelines()
            .map(|p| p.name().as_str())
            .collect();
        assert_eq!(names, vec!["build", "os", "archive"]);
        assert_eq!(assembled.manifest.checkpoints(), vec![PipelineName::new("build")]);
        assert_eq!(assembled.manifest.exports(), vec![PipelineName::new("archive")]);
        assert_eq!(assembled.artifact.unwrap().filename, "root.tar");
        assert!(assembled.manifest.tree("os").is_some());
    }

    #[test]
    fn build_root_carries_dependent_tools() {
        let assembled = composer().assemble().unwrap();
        let report = assembled.manifest.dependencies();
        let build = report.for_pipeline("build").unwrap();
        assert_eq!(build.package_sets[0].include, vec!["dnf", "rpm", "tar"]);
        assert_eq!(report.for_pipeline("os").unwrap().package_sets.len(), 2);
    }

    #[test]
    fn default_lock_path_is_next_to_compose() {
        assert_eq!(
            composer().default_lock_path(),
            PathBuf::from("/srv/compose/compose.lock")
        );
    }

    #[test]
    fn serialize_with_mock_resolver() {
        let result = composer().serialize(&MockResolver::new()).unwrap();
        let names: Vec<_> = result
            .manifest
            .pipelines
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["build", "os", "archive"]);
        assert_eq!(
            result.manifest.pipeline("archive").unwrap().build.as_deref(),
            Some("name:build")
        );
        assert_eq!(result.exports, vec![PipelineName::new("archive")]);
        assert!(!result.manifest.sources.curl.is_empty());
    }
}
