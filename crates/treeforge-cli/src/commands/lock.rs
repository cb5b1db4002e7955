use super::{json_pretty, load, EXIT_SUCCESS};
use std::path::Path;
use treeforge_core::select_resolver;

pub fn run(compose: &Path, lock: Option<&Path>, resolver: &str, json: bool) -> Result<u8, String> {
    let composer = load(compose)?;
    let lock_path = lock.map_or_else(|| composer.default_lock_path(), Path::to_path_buf);
    if resolver == "lock" {
        return Err(format!(
            "resolve error: cannot write {} from the lock resolver",
            lock_path.display()
        ));
    }
    let resolver = select_resolver(resolver, &lock_path)
        .map_err(|e| format!("resolve error: {e}"))?;

    let written = composer
        .lock(&*resolver, &lock_path)
        .map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "lock": lock_path,
            "lock_id": written.lock_id,
            "pipelines": written.pipelines.keys().collect::<Vec<_>>(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "wrote {} ({} pipelines)",
            lock_path.display(),
            written.pipelines.len()
        );
    }
    Ok(EXIT_SUCCESS)
}
