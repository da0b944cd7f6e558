use crate::config::types::WatchConfig;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Finds session logs laid out as `root/<agent>/<sessions_dir>/*.<extension>`.
#[derive(Debug, Clone)]
pub struct FileDiscoverer {
    root: PathBuf,
    sessions_dir: String,
    /// `.<extension>`, matched against the end of the file name.
    suffix: String,
}

impl FileDiscoverer {
    pub fn new(
        root: impl Into<PathBuf>,
        sessions_dir: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        let extension: String = extension.into();
        Self {
            root: root.into(),
            sessions_dir: sessions_dir.into(),
            suffix: format!(".{}", extension.trim_start_matches('.')),
        }
    }

    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(&config.root, &config.sessions_dir, &config.extension)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every matching file that exists right now, sorted by path.
    ///
    /// A missing root or agent without a sessions directory contributes
    /// nothing. Other directory errors are logged and skipped.
    pub async fn discover(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for agent in list_dir(&self.root).await {
            if !is_dir(&agent).await {
                continue;
            }

            let sessions = agent.path().join(&self.sessions_dir);
            for entry in list_dir(&sessions).await {
                let name = entry.file_name();
                if name.to_string_lossy().ends_with(&self.suffix) && is_file(&entry).await {
                    files.push(entry.path());
                }
            }
        }

        files.sort();
        debug!(root = %self.root.display(), file_count = files.len(), "discovery complete");
        files
    }
}

/// Entries of `dir`; a listing error ends the listing early.
async fn list_dir(dir: &Path) -> Vec<fs::DirEntry> {
    let mut entries = Vec::new();

    let mut read_dir = match fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(e) => {
            log_dir_error(dir, &e);
            return entries;
        }
    };

    loop {
        match read_dir.next_entry().await {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => break,
            Err(e) => {
                log_dir_error(dir, &e);
                break;
            }
        }
    }

    entries
}

// Neither check follows symlinks.
async fn is_dir(entry: &fs::DirEntry) -> bool {
    entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false)
}

async fn is_file(entry: &fs::DirEntry) -> bool {
    entry.file_type().await.map(|t| t.is_file()).unwrap_or(false)
}

fn log_dir_error(dir: &Path, err: &io::Error) {
    if err.kind() == io::ErrorKind::NotFound {
        debug!(dir = %dir.display(), "directory does not exist yet; skipping");
    } else {
        warn!(dir = %dir.display(), error = %err, "failed to list directory; skipping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[tokio::test]
    async fn test_missing_root_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let discoverer = FileDiscoverer::new(dir.path().join("agents"), "sessions", "jsonl");
        assert!(discoverer.discover().await.is_empty());
    }

    #[tokio::test]
    async fn test_discovers_sessions_of_every_agent_sorted() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("ops/sessions/b.jsonl"));
        touch(&root.join("main/sessions/z.jsonl"));
        touch(&root.join("main/sessions/a.jsonl"));

        let files = FileDiscoverer::new(root, "sessions", "jsonl").discover().await;
        assert_eq!(
            files,
            vec![
                root.join("main/sessions/a.jsonl"),
                root.join("main/sessions/z.jsonl"),
                root.join("ops/sessions/b.jsonl"),
            ]
        );
    }

    #[tokio::test]
    async fn test_ignores_non_matching_entries() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("main/sessions/keep.jsonl"));
        touch(&root.join("main/sessions/notes.txt"));
        touch(&root.join("main/sessions/keep.jsonl.bak"));
        touch(&root.join("main/other/stray.jsonl"));
        touch(&root.join("main/sessions/nested/deep.jsonl"));
        touch(&root.join("top-level.jsonl"));
        fs::create_dir_all(root.join("idle-agent")).unwrap();
        fs::create_dir_all(root.join("main/sessions/dir.jsonl")).unwrap();

        let files = FileDiscoverer::new(root, "sessions", ".jsonl").discover().await;
        assert_eq!(files, vec![root.join("main/sessions/keep.jsonl")]);
    }

    #[tokio::test]
    async fn test_matches_on_file_name_suffix() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("main/sessions/.jsonl"));
        touch(&root.join("main/sessions/run.2.jsonl"));
        touch(&root.join("main/sessions/xjsonl"));

        let files = FileDiscoverer::new(root, "sessions", "jsonl").discover().await;
        assert_eq!(
            files,
            vec![
                root.join("main/sessions/.jsonl"),
                root.join("main/sessions/run.2.jsonl"),
            ]
        );
    }

    #[tokio::test]
    async fn test_from_config_uses_watch_settings() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a/logs/x.ndjson"));

        let config = WatchConfig {
            root: dir.path().to_path_buf(),
            sessions_dir: "logs".to_string(),
            extension: "ndjson".to_string(),
            ..WatchConfig::default()
        };
        let discoverer = FileDiscoverer::from_config(&config);
        assert_eq!(discoverer.root(), dir.path());
        assert_eq!(discoverer.discover().await, vec![dir.path().join("a/logs/x.ndjson")]);
    }
}
