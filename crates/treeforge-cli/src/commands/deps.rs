use super::{json_pretty, load, EXIT_SUCCESS};
use std::path::Path;

pub fn run(compose: &Path, json: bool) -> Result<u8, String> {
    let assembled = load(compose)?.assemble().map_err(|e| e.to_string())?;
    let report = assembled.manifest.dependencies();

    if json {
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }

    for deps in &report.pipelines {
        println!("{}:", deps.pipeline);
        if !deps.build_packages.is_empty() {
            println!("  build packages: {}", deps.build_packages.join(", "));
        }
        for (i, set) in deps.package_sets.iter().enumerate() {
            println!("  package set {i}: {}", set.include.join(", "));
            if !set.exclude.is_empty() {
                println!("    exclude: {}", set.exclude.join(", "));
            }
            if !set.repositories.is_empty() {
                println!("    repositories: {}", set.repositories.join(", "));
            }
        }
        for commit in &deps.ostree_commits {
            println!("  ostree commit: {} ({})", commit.reference, commit.checksum);
        }
        for container in &deps.containers {
            println!("  container: {}@{}", container.source, container.digest);
        }
        if !deps.inline.is_empty() {
            println!("  inline blobs: {}", deps.inline.len());
        }
    }
    Ok(EXIT_SUCCESS)
}
