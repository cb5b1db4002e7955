use super::{json_pretty, load, write_atomic, EXIT_SUCCESS};
use std::path::Path;
use tracing::debug;
use treeforge_core::select_resolver;

pub fn run(
    compose: &Path,
    lock: Option<&Path>,
    resolver: &str,
    output: Option<&Path>,
    json: bool,
) -> Result<u8, String> {
    let composer = load(compose)?;
    let lock_path = lock.map_or_else(|| composer.default_lock_path(), Path::to_path_buf);
    if resolver == "lock" {
        composer.check_lock(&lock_path).map_err(|e| e.to_string())?;
    }
    let resolver = select_resolver(resolver, &lock_path)
        .map_err(|e| format!("resolve error: {e}"))?;
    debug!("serializing {} with {} resolver", compose.display(), resolver.name());

    let result = composer
        .serialize(&*resolver)
        .map_err(|e| e.to_string())?;
    let content = result
        .manifest
        .to_json_pretty()
        .map_err(|e| format!("JSON serialization failed: {e}"))?;

    match output {
        Some(path) => write_atomic(path, &content)?,
        None => println!("{content}"),
    }

    if json {
        let payload = serde_json::json!({
            "checkpoints": result.checkpoints,
            "exports": result.exports,
            "artifact": result.artifact,
        });
        eprintln!("{}", json_pretty(&payload)?);
    } else {
        for name in &result.checkpoints {
            eprintln!("--checkpoint={name}");
        }
        for name in &result.exports {
            eprintln!("--export={name}");
        }
        if let Some(path) = output {
            eprintln!("wrote {}", path.display());
        }
    }
    Ok(EXIT_SUCCESS)
}
