//! Dependency descriptors: what a pipeline declares it needs, and what an
//! external resolver hands back.
//!
//! These are opaque to the pipeline layer. Pipelines store, forward, and
//! report them; they never interpret package metadata beyond rendering it
//! into stage options.

use crate::types::{Checksum, PipelineName};
use serde::{Deserialize, Serialize};

/// A set of package constraints to be resolved against the given repositories.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageSet {
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub repositories: Vec<String>,
}

impl PackageSet {
    pub fn new(include: Vec<String>, repositories: Vec<String>) -> Self {
        Self {
            include,
            exclude: Vec::new(),
            repositories,
        }
    }

    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
    }

    /// Content identity of the declared constraints.
    ///
    /// Lists are hashed in declaration order, so callers normalize them first.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (section, items) in [
            ("include", &self.include),
            ("exclude", &self.exclude),
            ("repo", &self.repositories),
        ] {
            for item in items {
                hasher.update(format!("{section}:{item}\n").as_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// A resolved package with pinned version and download location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct PackageSpec {
    pub name: String,
    #[serde(default)]
    pub epoch: u32,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub remote_location: String,
    pub checksum: Checksum,
}

impl PackageSpec {
    /// `name-[epoch:]version-release.arch`, epoch omitted when zero.
    pub fn nevra(&self) -> String {
        if self.epoch == 0 {
            format!(
                "{}-{}-{}.{}",
                self.name, self.version, self.release, self.arch
            )
        } else {
            format!(
                "{}-{}:{}-{}.{}",
                self.name, self.epoch, self.version, self.release, self.arch
            )
        }
    }
}

/// A resolved OSTree commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitSpec {
    #[serde(rename = "ref")]
    pub reference: String,
    pub url: String,
    pub checksum: String,
}

/// A container image pinned by digest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerSpec {
    pub source: String,
    pub digest: String,
    pub local_name: String,
}

/// A file whose content travels inside the manifest itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InlineFile {
    pub path: String,
    pub data: String,
}

/// Handle to the content a pipeline produces when it is exported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    pub pipeline: PipelineName,
    pub filename: String,
    pub mime_type: String,
}

impl Artifact {
    pub fn new(
        pipeline: PipelineName,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            filename: filename.into(),
            mime_type: mime_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(epoch: u32) -> PackageSpec {
        PackageSpec {
            name: "bash".to_owned(),
            epoch,
            version: "5.2.26".to_owned(),
            release: "3.fc40".to_owned(),
            arch: "x86_64".to_owned(),
            remote_location: "https://mirror.example/bash.rpm".to_owned(),
            checksum: Checksum::new("sha256:aa"),
        }
    }

    #[test]
    fn nevra_omits_zero_epoch() {
        assert_eq!(spec(0).nevra(), "bash-5.2.26-3.fc40.x86_64");
    }

    #[test]
    fn nevra_includes_epoch() {
        assert_eq!(spec(2).nevra(), "bash-2:5.2.26-3.fc40.x86_64");
    }

    #[test]
    fn commit_spec_uses_ref_key() {
        let commit = CommitSpec {
            reference: "fedora/x86_64/iot".to_owned(),
            url: "https://ostree.example/repo".to_owned(),
            checksum: "c0ffee".to_owned(),
        };
        let json = serde_json::to_value(&commit).unwrap();
        assert_eq!(json["ref"], "fedora/x86_64/iot");
    }

    #[test]
    fn package_set_omits_empty_exclude() {
        let set = PackageSet::new(vec!["rpm".to_owned()], vec!["fedora".to_owned()]);
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.get("exclude").is_none());
        assert!(!set.is_empty());
    }

    #[test]
    fn package_set_digest_tracks_content() {
        let base = PackageSet::new(vec!["bash".to_owned()], vec!["fedora".to_owned()]);
        let more = PackageSet::new(
            vec!["bash".to_owned(), "vim".to_owned()],
            vec!["fedora".to_owned()],
        );
        let moved = PackageSet::new(Vec::new(), vec!["bash".to_owned(), "fedora".to_owned()]);
        assert_eq!(base.digest(), base.clone().digest());
        assert_ne!(base.digest(), more.digest());
        assert_ne!(base.digest(), moved.digest());
        assert_ne!(
            base.digest(),
            base.clone().with_exclude(vec!["vim".to_owned()]).digest()
        );
    }
}
