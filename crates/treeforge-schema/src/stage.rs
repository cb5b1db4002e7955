//! Wire types emitted by serialization: one [`StageDescription`] per pipeline,
//! assembled into a [`SerializedManifest`] together with the content sources
//! the stages reference.

use crate::types::PipelineName;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Manifest format version written into every serialized manifest.
pub const MANIFEST_FORMAT_VERSION: &str = "2";

/// The serialized form of one pipeline.
///
/// `build` is present only when the pipeline has a build root, and always has
/// the form `name:<build root>`. Without it the engine runs the pipeline in the
/// host build environment and detects the runner itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageDescription {
    pub name: PipelineName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<Stage>,
}

impl StageDescription {
    pub fn new(name: PipelineName) -> Self {
        Self {
            name,
            build: None,
            runner: None,
            stages: Vec::new(),
        }
    }

    /// Name of the build root pipeline, if `build` is set.
    pub fn build_root(&self) -> Option<&str> {
        self.build.as_deref().and_then(|b| b.strip_prefix("name:"))
    }
}

/// A single typed step within a pipeline, e.g. `org.osbuild.rpm`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

impl Stage {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            inputs: None,
            options: None,
        }
    }

    pub fn with_inputs(mut self, inputs: serde_json::Value) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = Some(options);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurlSource {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InlineSource {
    pub encoding: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OstreeRemote {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OstreeSource {
    pub remote: OstreeRemote,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkopeoImage {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkopeoSource {
    pub image: SkopeoImage,
}

/// External content the engine must fetch before running any stage.
///
/// Each map is keyed by the content identity the stages refer to. `BTreeMap`
/// keeps the output byte-stable across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sources {
    #[serde(
        rename = "org.osbuild.curl",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub curl: BTreeMap<String, CurlSource>,
    #[serde(
        rename = "org.osbuild.inline",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub inline: BTreeMap<String, InlineSource>,
    #[serde(
        rename = "org.osbuild.ostree",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub ostree: BTreeMap<String, OstreeSource>,
    #[serde(
        rename = "org.osbuild.skopeo",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub skopeo: BTreeMap<String, SkopeoSource>,
}

impl Sources {
    /// Content identity of an inline blob, as referenced by stage inputs.
    pub fn inline_id(data: &str) -> String {
        format!("blake3:{}", blake3::hash(data.as_bytes()).to_hex())
    }

    /// Add an inline blob and return its identity.
    pub fn add_inline(&mut self, data: &str) -> String {
        let id = Self::inline_id(data);
        self.inline.entry(id.clone()).or_insert_with(|| InlineSource {
            encoding: "base64".to_owned(),
            data: STANDARD.encode(data.as_bytes()),
        });
        id
    }

    pub fn is_empty(&self) -> bool {
        self.curl.is_empty()
            && self.inline.is_empty()
            && self.ostree.is_empty()
            && self.skopeo.is_empty()
    }
}

/// A complete, engine-consumable build manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SerializedManifest {
    pub version: String,
    pub pipelines: Vec<StageDescription>,
    #[serde(default, skip_serializing_if = "Sources::is_empty")]
    pub sources: Sources,
}

impl SerializedManifest {
    pub fn new(pipelines: Vec<StageDescription>, sources: Sources) -> Self {
        Self {
            version: MANIFEST_FORMAT_VERSION.to_owned(),
            pipelines,
            sources,
        }
    }

    pub fn pipeline(&self, name: &str) -> Option<&StageDescription> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_description_has_only_name() {
        let desc = StageDescription::new(PipelineName::new("build"));
        let value = serde_json::to_value(&desc).unwrap();
        assert_eq!(value, json!({ "name": "build" }));
    }

    #[test]
    fn build_root_is_parsed_from_reference() {
        let mut desc = StageDescription::new(PipelineName::new("os"));
        desc.build = Some("name:build".to_owned());
        assert_eq!(desc.build_root(), Some("build"));
    }

    #[test]
    fn stage_type_key() {
        let stage = Stage::new("org.osbuild.hostname").with_options(json!({"hostname": "h"}));
        let value = serde_json::to_value(&stage).unwrap();
        assert_eq!(value["type"], "org.osbuild.hostname");
        assert!(value.get("inputs").is_none());
    }

    #[test]
    fn empty_sources_are_omitted() {
        let manifest = SerializedManifest::new(Vec::new(), Sources::default());
        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value, json!({ "version": "2", "pipelines": [] }));
    }

    #[test]
    fn inline_blobs_are_content_addressed() {
        let mut sources = Sources::default();
        let a = sources.add_inline("hello");
        let b = sources.add_inline("hello");
        assert_eq!(a, b);
        assert!(a.starts_with("blake3:"));
        assert_eq!(sources.inline.len(), 1);
        assert_eq!(sources.inline[&a].data, "aGVsbG8=");
        assert_eq!(sources.inline[&a].encoding, "base64");
    }

    #[test]
    fn source_sections_use_engine_names() {
        let mut sources = Sources::default();
        sources.curl.insert(
            "sha256:aa".to_owned(),
            CurlSource {
                url: "https://mirror.example/a.rpm".to_owned(),
            },
        );
        let value = serde_json::to_value(&sources).unwrap();
        assert_eq!(
            value["org.osbuild.curl"]["sha256:aa"]["url"],
            "https://mirror.example/a.rpm"
        );
        assert!(value.get("org.osbuild.inline").is_none());
    }
}
