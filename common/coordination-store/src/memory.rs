use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::store::{CoordinationStore, Guard, Versioned};

#[derive(Default)]
struct Inner {
    revision: i64,
    entries: BTreeMap<String, Versioned>,
    unavailable: bool,
}

impl Inner {
    fn write(&mut self, key: &str, value: &[u8]) {
        self.revision += 1;
        let version = self.entries.get(key).map_or(0, |v| v.version) + 1;
        self.entries.insert(
            key.to_string(),
            Versioned {
                value: value.to_vec(),
                version,
                mod_revision: self.revision,
            },
        );
    }

    fn mod_revision(&self, key: &str) -> i64 {
        self.entries.get(key).map_or(0, |v| v.mod_revision)
    }
}

/// In-process [`CoordinationStore`] with the same versioning rules as etcd:
/// a store-wide revision bumped on every write, and a per-key version that
/// starts at 1 on creation.
///
/// Used for tests and single-process deployments.
pub struct MemoryStore {
    prefix: String,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Make every subsequent operation fail as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.unavailable = unavailable;
        }
    }

    /// Snapshot of the raw value at `key`, for assertions.
    pub fn value(&self, key: &str) -> Option<String> {
        let inner = self.inner.lock().ok()?;
        inner
            .entries
            .get(key)
            .map(|v| String::from_utf8_lossy(&v.value).into_owned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| Error::InvalidState("memory store lock poisoned".to_string()))?;
        if inner.unavailable {
            return Err(Error::Unavailable("memory store marked unavailable".to_string()));
        }
        Ok(inner)
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn get(&self, key: &str) -> Result<Option<Versioned>> {
        Ok(self.lock()?.entries.get(key).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Versioned)>> {
        let inner = self.lock()?;
        Ok(inner
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.lock()?.write(key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.entries.remove(key).is_some() {
            inner.revision += 1;
        }
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let mut inner = self.lock()?;
        let before = inner.entries.len();
        inner.entries.retain(|k, _| !k.starts_with(prefix));
        if inner.entries.len() != before {
            inner.revision += 1;
        }
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected_version: i64,
        value: &[u8],
        guards: &[Guard],
    ) -> Result<bool> {
        let mut inner = self.lock()?;
        let current = inner.entries.get(key).map_or(0, |v| v.version);
        if current != expected_version {
            return Ok(false);
        }
        if guards
            .iter()
            .any(|g| inner.mod_revision(&g.key) != g.mod_revision)
        {
            return Ok(false);
        }
        inner.write(key, value);
        Ok(true)
    }
}
