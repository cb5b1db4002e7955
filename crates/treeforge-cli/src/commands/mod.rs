pub mod completions;
pub mod deps;
pub mod inspect;
pub mod lock;
pub mod serialize;

use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use treeforge_core::Composer;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_COMPOSE_ERROR: u8 = 2;
pub const EXIT_LOCK_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn load(compose: &Path) -> Result<Composer, String> {
    Composer::load(compose).map_err(|e| e.to_string())
}

pub fn write_atomic(dest: &Path, content: &str) -> Result<(), String> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| format!("write temp file: {e}"))?;
    use std::io::Write;
    tmp.write_all(content.as_bytes())
        .map_err(|e| format!("write temp file: {e}"))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| format!("fsync temp file: {e}"))?;
    tmp.persist(dest)
        .map_err(|e| format!("persist {}: {}", dest.display(), e.error))?;
    Ok(())
}

pub fn colorize_flag(flag: &str) -> String {
    use console::Style;
    match flag {
        "checkpoint" => Style::new().cyan().apply_to(flag).to_string(),
        "export" => Style::new().green().bold().apply_to(flag).to_string(),
        "host" => Style::new().yellow().apply_to(flag).to_string(),
        other => other.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_object() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn colorize_flag_keeps_text() {
        assert!(colorize_flag("checkpoint").contains("checkpoint"));
        assert!(colorize_flag("export").contains("export"));
        assert!(colorize_flag("host").contains("host"));
        assert_eq!(colorize_flag("other"), "other");
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_COMPOSE_ERROR);
        assert_ne!(EXIT_COMPOSE_ERROR, EXIT_LOCK_ERROR);
    }

    #[test]
    fn write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_atomic(&path, "first").unwrap();
        write_atomic(&path, "second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn load_reports_compose_errors() {
        let err = load(Path::new("/nonexistent/compose.toml")).unwrap_err();
        assert!(err.starts_with("compose error:"));
    }
}
