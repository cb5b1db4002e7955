use crate::descriptor::{CommitSpec, InlineFile};
use crate::platform::Arch;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("failed to read compose file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse compose file: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported compose_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("invalid pipeline name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
    #[error("pipeline name '{0}' is used by more than one section")]
    DuplicateName(String),
    #[error("build.runner must not be empty")]
    EmptyRunner,
    #[error("os.packages must not be empty")]
    EmptyPackages,
    #[error("invalid hostname: '{0}'")]
    InvalidHostname(String),
    #[error("inline file path must be absolute: '{0}'")]
    RelativeFilePath(String),
    #[error("inline file '{0}' is declared more than once")]
    DuplicateFile(String),
    #[error("container '{source_ref}' is not pinned: digest must start with 'sha256:'")]
    UnpinnedContainer { source_ref: String },
    #[error("archive.filename must be a plain file name, got '{0}'")]
    InvalidArchiveFilename(String),
}

/// Top-level compose file, version 1.
///
/// Describes a build root, an OS tree built inside it, and optionally an
/// archive pipeline that exports the tree.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ComposeFileV1 {
    pub compose_version: u32,
    pub platform: PlatformSection,
    pub build: BuildSection,
    pub os: OsSection,
    #[serde(default)]
    pub archive: Option<ArchiveSection>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PlatformSection {
    pub arch: Arch,
    #[serde(default)]
    pub bios_platform: Option<String>,
    #[serde(default)]
    pub uefi_vendor: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    #[serde(default = "default_build_name")]
    pub name: String,
    pub runner: String,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub checkpoint: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OsSection {
    #[serde(default = "default_os_name")]
    pub name: String,
    pub packages: Vec<String>,
    #[serde(default)]
    pub extra_packages: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Repositories for the OS package sets. Empty means reuse `build.repositories`.
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub checkpoint: bool,
    #[serde(default)]
    pub files: Vec<InlineFile>,
    #[serde(default)]
    pub containers: Vec<ContainerSection>,
    #[serde(default)]
    pub ostree_parent: Option<CommitSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ContainerSection {
    pub source: String,
    pub digest: String,
    #[serde(default)]
    pub local_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ArchiveSection {
    #[serde(default = "default_archive_name")]
    pub name: String,
    pub filename: String,
}

fn default_build_name() -> String {
    "build".to_owned()
}

fn default_os_name() -> String {
    "os".to_owned()
}

fn default_archive_name() -> String {
    "archive".to_owned()
}

pub fn parse_compose_str(input: &str) -> Result<ComposeFileV1, ComposeError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_compose_file(path: impl AsRef<Path>) -> Result<ComposeFileV1, ComposeError> {
    let content = fs::read_to_string(path)?;
    parse_compose_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_compose() {
        let input = r#"
compose_version = 1

[platform]
arch = "x86_64"
bios_platform = "i386-pc"
uefi_vendor = "fedora"

[build]
runner = "org.osbuild.fedora40"
packages = ["rpm", "dnf"]
repositories = ["fedora"]
checkpoint = true

[os]
packages = ["@core", "kernel"]
extra_packages = ["vim-enhanced"]
hostname = "edge"
timezone = "UTC"

[[os.files]]
path = "/etc/motd"
data = "welcome"

[[os.containers]]
source = "registry.example/app:1"
digest = "sha256:0123"

[os.ostree_parent]
ref = "fedora/x86_64/iot"
url = "https://ostree.example/repo"
checksum = "c0ffee"

[archive]
filename = "root.tar"
"#;
        let compose = parse_compose_str(input).expect("should parse");
        assert_eq!(compose.compose_version, 1);
        assert_eq!(compose.platform.arch, Arch::X86_64);
        assert_eq!(compose.build.name, "build");
        assert!(compose.build.checkpoint);
        assert_eq!(compose.os.name, "os");
        assert_eq!(compose.os.files.len(), 1);
        assert_eq!(compose.os.containers[0].local_name, None);
        assert_eq!(
            compose.os.ostree_parent.as_ref().map(|c| c.reference.as_str()),
            Some("fedora/x86_64/iot")
        );
        assert_eq!(compose.archive.map(|a| a.name), Some("archive".to_owned()));
    }

    #[test]
    fn parses_minimal_compose() {
        let input = r#"
compose_version = 1
[platform]
arch = "aarch64"
[build]
runner = "org.osbuild.fedora40"
[os]
packages = ["@core"]
"#;
        let compose = parse_compose_str(input).expect("should parse");
        assert!(compose.archive.is_none());
        assert!(!compose.os.checkpoint);
        assert!(compose.os.repositories.is_empty());
    }

    #[test]
    fn rejects_unknown_fields() {
        let input = r#"
compose_version = 1
[platform]
arch = "x86_64"
[build]
runner = "org.osbuild.fedora40"
unknown_field = true
[os]
packages = ["@core"]
"#;
        assert!(parse_compose_str(input).is_err());
    }

    #[test]
    fn rejects_unknown_arch() {
        let input = r#"
compose_version = 1
[platform]
arch = "mips"
[build]
runner = "org.osbuild.fedora40"
[os]
packages = ["@core"]
"#;
        assert!(parse_compose_str(input).is_err());
    }

    #[test]
    fn rejects_missing_os() {
        let input = r#"
compose_version = 1
[platform]
arch = "x86_64"
[build]
runner = "org.osbuild.fedora40"
"#;
        assert!(parse_compose_str(input).is_err());
    }
}
