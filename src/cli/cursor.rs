use crate::config::load_config;
use crate::storage::{CursorStore, JsonFileCursorStore};
use std::path::{Path, PathBuf};

/// Print the committed cursor as JSON. `file` bypasses configuration loading.
pub async fn show(
    config_path: Option<&Path>,
    file: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let cursor_path = match file {
        Some(path) => path,
        None => load_config(config_path)?.cursor.path,
    };

    let cursor = JsonFileCursorStore::new(&cursor_path).load().await?;
    eprintln!("{} ({} files)", cursor_path.display(), cursor.len());
    println!("{}", serde_json::to_string_pretty(&cursor)?);
    Ok(())
}
