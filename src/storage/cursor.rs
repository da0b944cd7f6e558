use super::traits::CursorStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("failed to read cursor file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("cursor file {} is not a valid offset map: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write cursor file {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to encode cursor: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Committed byte offsets, keyed by absolute file path.
///
/// Serializes as a flat JSON object `{ "<path>": <offset> }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor {
    offsets: BTreeMap<PathBuf, u64>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed offset for `path`, 0 when the file was never delivered.
    pub fn offset(&self, path: &Path) -> u64 {
        self.offsets.get(path).copied().unwrap_or(0)
    }

    pub fn get(&self, path: &Path) -> Option<u64> {
        self.offsets.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &u64)> {
        self.offsets.iter()
    }

    /// Apply proposed offsets. Returns how many entries changed.
    pub fn commit(&mut self, pending: PendingOffsets) -> usize {
        let mut changed = 0;
        for (path, offset) in pending.offsets {
            if self.offsets.insert(path, offset) != Some(offset) {
                changed += 1;
            }
        }
        changed
    }
}

impl FromIterator<(PathBuf, u64)> for Cursor {
    fn from_iter<I: IntoIterator<Item = (PathBuf, u64)>>(iter: I) -> Self {
        Self {
            offsets: iter.into_iter().collect(),
        }
    }
}

/// Offsets proposed by one cycle's reads, not yet acknowledged by the collector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingOffsets {
    offsets: BTreeMap<PathBuf, u64>,
}

impl PendingOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn propose(&mut self, path: PathBuf, offset: u64) {
        self.offsets.insert(path, offset);
    }

    pub fn get(&self, path: &Path) -> Option<u64> {
        self.offsets.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Cursor persisted as a single pretty-printed JSON file.
///
/// Saves go to a sibling temp file which is synced and then renamed over the
/// target, so readers only ever observe a complete snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileCursorStore {
    path: PathBuf,
}

impl JsonFileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let unique_id = COUNTER.fetch_add(1, Ordering::SeqCst);

        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".tmp.{}.{}", std::process::id(), unique_id));
        self.path.with_file_name(name)
    }

    fn write_error(&self, source: io::Error) -> CursorError {
        CursorError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl CursorStore for JsonFileCursorStore {
    async fn load(&self) -> Result<Cursor, CursorError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no cursor file yet; starting empty");
                return Ok(Cursor::new());
            }
            Err(source) => {
                return Err(CursorError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&bytes).map_err(|source| CursorError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn save(&self, cursor: &Cursor) -> Result<(), CursorError> {
        let bytes = serde_json::to_vec_pretty(cursor)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.write_error(e))?;
            }
        }

        let temp_path = self.temp_path();
        if let Err(e) = write_synced(&temp_path, &bytes).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(self.write_error(e));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(self.write_error(e));
        }

        // The rename is only durable once the directory entry is.
        sync_parent_dir(&self.path)
            .await
            .map_err(|e| self.write_error(e))?;

        tracing::debug!(path = %self.path.display(), files = cursor.len(), "cursor saved");
        Ok(())
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(unix)]
async fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    tokio::fs::File::open(parent).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// In-process store, for tests and dry runs. Counts saves and can be told to
/// fail them.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursor: Mutex<Cursor>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(cursor: Cursor) -> Self {
        Self {
            cursor: Mutex::new(cursor),
            ..Self::default()
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Cursor {
        self.cursor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self) -> Result<Cursor, CursorError> {
        Ok(self.snapshot())
    }

    async fn save(&self, cursor: &Cursor) -> Result<(), CursorError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CursorError::Write {
                path: PathBuf::from("<memory>"),
                source: io::Error::new(io::ErrorKind::Other, "saves disabled"),
            });
        }

        *self
            .cursor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = cursor.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
