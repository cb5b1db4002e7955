use super::{colorize_flag, json_pretty, load, EXIT_SUCCESS};
use serde::Serialize;
use std::path::Path;
use treeforge_core::Pipeline;

#[derive(Serialize)]
struct PipelineInfo {
    name: String,
    build: Option<String>,
    package_sets: usize,
    inputs: Vec<String>,
    checkpoint: bool,
    export: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    arch: Option<String>,
}

pub fn run(compose: &Path, json: bool) -> Result<u8, String> {
    let assembled = load(compose)?.assemble().map_err(|e| e.to_string())?;
    let manifest = &assembled.manifest;
    let checkpoints = manifest.checkpoints();
    let exports = manifest.exports();

    let infos: Vec<PipelineInfo> = manifest
        .pipelines()
        .map(|p| PipelineInfo {
            name: p.name().to_string(),
            build: p.base().build().map(|b| b.name().to_string()),
            package_sets: p.package_set_chain().len(),
            inputs: p.inputs().iter().map(|h| h.name().to_string()).collect(),
            checkpoint: checkpoints.contains(p.name()),
            export: exports.contains(p.name()),
            arch: p.as_tree().map(|t| t.platform().arch.to_string()),
        })
        .collect();

    if json {
        println!("{}", json_pretty(&infos)?);
        return Ok(EXIT_SUCCESS);
    }

    for info in &infos {
        let mut flags = Vec::new();
        if info.checkpoint {
            flags.push(colorize_flag("checkpoint"));
        }
        if info.export {
            flags.push(colorize_flag("export"));
        }
        let build = info
            .build
            .clone()
            .unwrap_or_else(|| colorize_flag("host"));
        println!(
            "{:<12} build: {:<10} sets: {}  {}",
            info.name,
            build,
            info.package_sets,
            flags.join(" ")
        );
        if !info.inputs.is_empty() {
            println!("{:<12} inputs: {}", "", info.inputs.join(", "));
        }
        if let Some(arch) = &info.arch {
            println!("{:<12} arch: {arch}", "");
        }
    }
    if let Some(artifact) = &assembled.artifact {
        println!(
            "artifact: {} ({}, from {})",
            artifact.filename, artifact.mime_type, artifact.pipeline
        );
    }
    Ok(EXIT_SUCCESS)
}
