//! Concrete pipeline kinds.
//!
//! A build produces a build root ([`BuildPipeline`]), an OS tree on top of it
//! ([`OsTree`]) and optionally a deliverable packed from that tree
//! ([`TarArchive`]).

mod build;
mod os;
mod tar;

pub use build::BuildPipeline;
pub use os::OsTree;
pub use tar::{TarArchive, TAR_MIME_TYPE};

use serde_json::json;
use treeforge_schema::{PackageSpec, Stage};

/// Stage installing `specs` from sources fetched by checksum.
pub(crate) fn rpm_stage(specs: &[PackageSpec]) -> Stage {
    let references: Vec<&str> = specs.iter().map(|s| s.checksum.as_str()).collect();
    Stage::new("org.osbuild.rpm").with_inputs(json!({
        "packages": {
            "type": "org.osbuild.files",
            "origin": "org.osbuild.source",
            "references": references,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeforge_schema::Checksum;

    #[test]
    fn rpm_stage_references_checksums_in_order() {
        let specs: Vec<PackageSpec> = ["b", "a"]
            .iter()
            .map(|n| PackageSpec {
                name: (*n).to_owned(),
                epoch: 0,
                version: "1".to_owned(),
                release: "1".to_owned(),
                arch: "noarch".to_owned(),
                remote_location: String::new(),
                checksum: Checksum::new(format!("sha256:{n}")),
            })
            .collect();
        let stage = rpm_stage(&specs);
        assert_eq!(stage.kind, "org.osbuild.rpm");
        assert_eq!(
            stage.inputs.unwrap()["packages"]["references"],
            json!(["sha256:b", "sha256:a"])
        );
    }
}
