use crate::compose::{ComposeError, ComposeFileV1};
use crate::descriptor::{CommitSpec, ContainerSpec, InlineFile, PackageSet};
use crate::platform::Platform;
use crate::types::PipelineName;
use serde::{Deserialize, Serialize};

/// Canonical, validated representation of a parsed compose file.
///
/// Package lists are trimmed, sorted and deduplicated, names are validated,
/// and defaults are resolved. This is the input to manifest assembly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedCompose {
    pub platform: Platform,
    pub build: NormalizedBuild,
    pub os: NormalizedOs,
    pub archive: Option<NormalizedArchive>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedBuild {
    pub name: PipelineName,
    pub runner: String,
    pub packages: PackageSet,
    pub checkpoint: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedOs {
    pub name: PipelineName,
    pub base_packages: PackageSet,
    /// Second link of the chain; `None` when no extra packages were requested.
    pub extra_packages: Option<PackageSet>,
    pub hostname: Option<String>,
    pub timezone: Option<String>,
    pub locale: Option<String>,
    pub checkpoint: bool,
    pub files: Vec<InlineFile>,
    pub containers: Vec<ContainerSpec>,
    pub ostree_parent: Option<CommitSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedArchive {
    pub name: PipelineName,
    pub filename: String,
}

impl ComposeFileV1 {
    /// Normalize the compose file: validate fields, sort packages, resolve defaults.
    pub fn normalize(&self) -> Result<NormalizedCompose, ComposeError> {
        if self.compose_version != 1 {
            return Err(ComposeError::UnsupportedVersion(self.compose_version));
        }

        let build_name = validate_pipeline_name(&self.build.name)?;
        let os_name = validate_pipeline_name(&self.os.name)?;
        let archive_name = match &self.archive {
            Some(archive) => Some(validate_pipeline_name(&archive.name)?),
            None => None,
        };
        let mut names = vec![build_name.as_str(), os_name.as_str()];
        if let Some(name) = &archive_name {
            names.push(name.as_str());
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(ComposeError::DuplicateName((*name).to_owned()));
            }
        }

        let runner = self.build.runner.trim().to_owned();
        if runner.is_empty() {
            return Err(ComposeError::EmptyRunner);
        }

        let build_repos = normalize_string_list(&self.build.repositories);
        let build = NormalizedBuild {
            name: build_name,
            runner,
            packages: PackageSet::new(
                normalize_string_list(&self.build.packages),
                build_repos.clone(),
            ),
            checkpoint: self.build.checkpoint,
        };

        let os_packages = normalize_string_list(&self.os.packages);
        if os_packages.is_empty() {
            return Err(ComposeError::EmptyPackages);
        }
        let os_repos = if self.os.repositories.is_empty() {
            build_repos
        } else {
            normalize_string_list(&self.os.repositories)
        };
        let exclude = normalize_string_list(&self.os.exclude);
        let extra = normalize_string_list(&self.os.extra_packages);
        let extra_packages = if extra.is_empty() {
            None
        } else {
            Some(PackageSet::new(extra, os_repos.clone()).with_exclude(exclude.clone()))
        };

        let hostname = normalize_optional(self.os.hostname.as_deref());
        if let Some(h) = &hostname {
            validate_hostname(h)?;
        }

        let mut files = Vec::with_capacity(self.os.files.len());
        for file in &self.os.files {
            let path = file.path.trim().to_owned();
            if !path.starts_with('/') {
                return Err(ComposeError::RelativeFilePath(path));
            }
            if files.iter().any(|f: &InlineFile| f.path == path) {
                return Err(ComposeError::DuplicateFile(path));
            }
            files.push(InlineFile {
                path,
                data: file.data.clone(),
            });
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut containers = Vec::with_capacity(self.os.containers.len());
        for c in &self.os.containers {
            let source = c.source.trim().to_owned();
            let digest = c.digest.trim().to_owned();
            if !digest.starts_with("sha256:") {
                return Err(ComposeError::UnpinnedContainer { source_ref: source });
            }
            let local_name = normalize_optional(c.local_name.as_deref())
                .unwrap_or_else(|| source.clone());
            containers.push(ContainerSpec {
                source,
                digest,
                local_name,
            });
        }

        let archive = match (&self.archive, archive_name) {
            (Some(section), Some(name)) => {
                let filename = section.filename.trim().to_owned();
                if filename.is_empty()
                    || filename.contains('/')
                    || filename == "."
                    || filename == ".."
                {
                    return Err(ComposeError::InvalidArchiveFilename(filename));
                }
                Some(NormalizedArchive { name, filename })
            }
            _ => None,
        };

        Ok(NormalizedCompose {
            platform: Platform {
                arch: self.platform.arch,
                bios_platform: normalize_optional(self.platform.bios_platform.as_deref()),
                uefi_vendor: normalize_optional(self.platform.uefi_vendor.as_deref()),
            },
            build,
            os: NormalizedOs {
                name: os_name,
                base_packages: PackageSet::new(os_packages, os_repos).with_exclude(exclude),
                extra_packages,
                hostname,
                timezone: normalize_optional(self.os.timezone.as_deref()),
                locale: normalize_optional(self.os.locale.as_deref()),
                checkpoint: self.os.checkpoint,
                files,
                containers,
                ostree_parent: self.os.ostree_parent.clone(),
            },
            archive,
        })
    }
}

impl NormalizedCompose {
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Pipeline names end up in `name:<pipeline>` references and on engine
/// command lines, so they are restricted to `[a-zA-Z0-9_.-]{1,64}`.
pub fn validate_pipeline_name(name: &str) -> Result<PipelineName, ComposeError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.len() > 64 {
        return Err(ComposeError::InvalidName {
            name: name.to_owned(),
            reason: "must be 1-64 characters".to_owned(),
        });
    }
    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
    {
        return Err(ComposeError::InvalidName {
            name: name.to_owned(),
            reason: "must match [a-zA-Z0-9_.-]".to_owned(),
        });
    }
    Ok(PipelineName::new(trimmed))
}

fn validate_hostname(hostname: &str) -> Result<(), ComposeError> {
    let valid = hostname.len() <= 253
        && hostname.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        });
    if valid {
        Ok(())
    } else {
        Err(ComposeError::InvalidHostname(hostname.to_owned()))
    }
}

fn normalize_optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
}

fn normalize_string_list(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = values
        .iter()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}
