use crate::manifest::Manifest;
use crate::pipeline::{Base, Pipeline, PipelineError, PipelineHandle};
use serde_json::json;
use treeforge_schema::{Artifact, PipelineName, Stage};

pub const TAR_MIME_TYPE: &str = "application/x-tar";

/// Packs the output of another pipeline into a single tar file.
pub struct TarArchive {
    base: Base,
    tree: PipelineHandle,
    filename: String,
}

impl TarArchive {
    pub fn new(
        manifest: &Manifest,
        name: impl Into<PipelineName>,
        build: &PipelineHandle,
        tree: &PipelineHandle,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            base: Base::new(manifest, name, Some(build)),
            tree: tree.clone(),
            filename: filename.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl Pipeline for TarArchive {
    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    fn export(&mut self) -> Result<Artifact, PipelineError> {
        self.base.mark_export();
        Ok(Artifact::new(
            self.base.name().clone(),
            self.filename.clone(),
            TAR_MIME_TYPE,
        ))
    }

    fn build_packages(&self) -> Vec<String> {
        vec!["tar".to_owned()]
    }

    fn inputs(&self) -> Vec<PipelineHandle> {
        vec![self.tree.clone()]
    }

    fn stages(&self) -> Vec<Stage> {
        vec![Stage::new("org.osbuild.tar")
            .with_inputs(json!({
                "tree": {
                    "type": "org.osbuild.tree",
                    "origin": "org.osbuild.pipeline",
                    "references": [self.tree.name().reference()],
                }
            }))
            .with_options(json!({ "filename": self.filename }))]
    }
}
