// Local cache persisted as a JSON object on disk so it survives restarts
use crate::application::state_store::LocalCache;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Entries {
    items: BTreeMap<String, String>,
    revision: u64,
}

/// Writes happen off the caller's thread when a tokio runtime is around.
/// Each snapshot carries a revision and an older one never replaces a newer file.
#[derive(Debug)]
pub struct FileLocalCache {
    path: Arc<PathBuf>,
    entries: Mutex<Entries>,
    written: Arc<Mutex<u64>>,
}

impl FileLocalCache {
    /// Open the cache at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match Self::read(&path) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Starting with empty local cache: {:#}", e);
                BTreeMap::new()
            }
        };
        tracing::info!("Local cache at {} ({} entries)", path.display(), items.len());
        Self {
            path: Arc::new(path),
            entries: Mutex::new(Entries { items, revision: 0 }),
            written: Arc::new(Mutex::new(0)),
        }
    }

    fn read(path: &Path) -> Result<BTreeMap<String, String>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn snapshot(&self) -> Result<(u64, String)> {
        let entries = self.entries.lock();
        let raw = serde_json::to_string_pretty(&entries.items)?;
        Ok((entries.revision, raw))
    }
}

/// Replace the file with `raw` unless a newer revision is already on disk.
/// Returns whether the file was written.
fn write_snapshot(path: &Path, written: &Mutex<u64>, revision: u64, raw: &str) -> Result<bool> {
    let mut last = written.lock();
    if *last >= revision {
        return Ok(false);
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, raw).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    *last = revision;
    Ok(true)
}

impl LocalCache for FileLocalCache {
    fn get_item(&self, key: &str) -> Option<String> {
        self.entries.lock().items.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let (revision, raw) = {
            let mut entries = self.entries.lock();
            entries.items.insert(key.to_string(), value.to_string());
            entries.revision += 1;
            let raw = serde_json::to_string_pretty(&entries.items)?;
            (entries.revision, raw)
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let path = self.path.clone();
                let written = self.written.clone();
                runtime.spawn_blocking(move || {
                    if let Err(e) = write_snapshot(&path, &written, revision, &raw) {
                        tracing::warn!("Failed to flush local cache: {:#}", e);
                    }
                });
                Ok(())
            }
            Err(_) => write_snapshot(&self.path, &self.written, revision, &raw).map(|_| ()),
        }
    }

    fn flush(&self) -> Result<()> {
        let (revision, raw) = self.snapshot()?;
        write_snapshot(&self.path, &self.written, revision, &raw).map(|_| ())
    }
}
