use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Persistent key-value store, as exposed by the settings subsystem the
/// provisioning channel also writes into. The pipeline only ever reads
/// provisioned keys; the device UUID is the one key it writes itself.
pub trait KvStore {
    fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>>;
    fn set(&mut self, key: &str, value: &[u8]) -> io::Result<()>;
}

impl<S: KvStore + ?Sized> KvStore for &mut S {
    fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &[u8]) -> io::Result<()> {
        (**self).set(key, value)
    }
}

/// File-backed store: one file per key under a namespace directory.
pub struct FileKvStore {
    root: PathBuf,
}

impl FileKvStore {
    /// Opens (and creates if needed) the namespace directory.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.key_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&mut self, key: &str, value: &[u8]) -> io::Result<()> {
        // Write-then-rename so a crash mid-write never leaves a torn value.
        let path = self.key_path(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)
    }
}

/// In-memory store for tests and host-side simulation.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> io::Result<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[allow(dead_code)]
fn _assert_object_safe(_: &dyn KvStore) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let mut store = MemoryKvStore::new();
        assert_eq!(store.get("missing").unwrap(), None);

        store.set("k", b"value").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some(&b"value"[..]));
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let root = std::env::temp_dir().join(format!("kv-test-{}", uuid::Uuid::new_v4()));

        {
            let mut store = FileKvStore::open(&root).unwrap();
            store.set("k", b"value").unwrap();
        }

        let store = FileKvStore::open(&root).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some(&b"value"[..]));

        std::fs::remove_dir_all(&root).ok();
    }
}
