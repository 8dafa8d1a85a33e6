use std::{
    collections::HashMap,
    fs, io,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use tracing::warn;

use crate::error::Result;

/// A flat key-value store holding whole documents as text.
pub trait Storage: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Stores each key as `<dir>/<key>.json`.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    // Bytes that are not UTF-8 come back replaced with U+FFFD, so the caller
    // sees a document that fails to decode rather than an I/O error.
    fn get(&self, key: &str) -> Result<Option<String>> {
        let bytes = match fs::read(self.path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match String::from_utf8(bytes) {
            Ok(s) => Ok(Some(s)),
            Err(e) => {
                warn!(key, "stored document is not valid UTF-8");
                Ok(Some(String::from_utf8_lossy(e.as_bytes()).into_owned()))
            }
        }
    }

    // Write to a sibling file and rename so a crash never leaves half a document.
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-memory store. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::default();
        storage.lock().insert(key.into(), value.into());
        storage
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.into(), value.into());
        Ok(())
    }
}

/// Wraps a [`MemoryStorage`] whose writes can be made to fail. Clones share
/// both the entries and the switch.
#[derive(Clone, Default)]
pub struct FailingStorage {
    inner: MemoryStorage,
    failing: Arc<AtomicBool>,
}

impl FailingStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self { inner, failing: Arc::default() }
    }

    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Storage for FailingStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(io::Error::other(format!("write to `{key}` refused")).into());
        }
        self.inner.set(key, value)
    }
}
