use async_trait::async_trait;
use etcd_client::{
    Client, Compare, CompareOp, DeleteOptions, GetOptions, KeyValue, PutOptions, Txn, TxnOp,
};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub endpoints: Vec<String>,
    /// Key prefix for all operations.
    /// e.g. "/nakadi/" or "/test-commit-<uuid>/"
    pub prefix: String,
}

/// A value together with the metadata needed for compare-and-set.
///
/// `version` counts writes to this key since it was created and is the token
/// used to guard writes to the key itself. `mod_revision` is the store-wide
/// revision of the last write, and is what guards on *other* keys compare
/// against (it never repeats, even if a key is deleted and recreated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: Vec<u8>,
    pub version: i64,
    pub mod_revision: i64,
}

impl Versioned {
    pub fn value_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.value)
            .map_err(|e| Error::InvalidState(format!("value is not utf-8: {e}")))
    }
}

/// Extra condition for a compare-and-set: `key` must still be at
/// `mod_revision` when the write is applied. A revision of 0 means the key
/// must not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub key: String,
    pub mod_revision: i64,
}

/// A strongly consistent key-value store with read-with-version and
/// compare-and-set. Writes are linearizable per key: two compare-and-set calls
/// against the same version never both succeed.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Prefix prepended to every key built by callers.
    fn prefix(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<Versioned>>;

    /// All entries whose key starts with `prefix`, ordered by key.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, Versioned)>>;

    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn delete_prefix(&self, prefix: &str) -> Result<()>;

    /// Write `value` iff the key is at `expected_version` (0 = absent) and every
    /// guard still holds. Returns `Ok(false)` when any condition failed.
    async fn compare_and_set(
        &self,
        key: &str,
        expected_version: i64,
        value: &[u8],
        guards: &[Guard],
    ) -> Result<bool>;
}

/// Prefixed etcd client implementing [`CoordinationStore`].
///
/// `Client` is `Clone` (wraps an inner `Arc`), so each method clones it cheaply.
#[derive(Clone)]
pub struct EtcdStore {
    client: Client,
    config: StoreConfig,
}

impl EtcdStore {
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        let client = Client::connect(&config.endpoints, None).await?;
        tracing::info!(endpoints = ?config.endpoints, prefix = %config.prefix, "connected to etcd");
        Ok(Self { client, config })
    }

    /// Put a key bound to a lease; the key disappears when the lease expires.
    pub async fn put_with_lease(&self, key: &str, value: &[u8], lease_id: i64) -> Result<()> {
        let options = PutOptions::new().with_lease(lease_id);
        self.client
            .clone()
            .put(key, value.to_vec(), Some(options))
            .await?;
        Ok(())
    }

    // ── Lease operations ─────────────────────────────────────────

    pub async fn grant_lease(&self, ttl: i64) -> Result<i64> {
        let resp = self.client.clone().lease_grant(ttl, None).await?;
        Ok(resp.id())
    }

    pub async fn revoke_lease(&self, lease_id: i64) -> Result<()> {
        self.client.clone().lease_revoke(lease_id).await?;
        Ok(())
    }

    // ── Cleanup ──────────────────────────────────────────────────

    pub async fn delete_all(&self) -> Result<()> {
        self.delete_prefix(&self.config.prefix).await
    }
}

fn versioned(kv: &KeyValue) -> Versioned {
    Versioned {
        value: kv.value().to_vec(),
        version: kv.version(),
        mod_revision: kv.mod_revision(),
    }
}

#[async_trait]
impl CoordinationStore for EtcdStore {
    fn prefix(&self) -> &str {
        &self.config.prefix
    }

    async fn get(&self, key: &str) -> Result<Option<Versioned>> {
        let resp = self.client.clone().get(key, None).await?;
        Ok(resp.kvs().first().map(versioned))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Versioned)>> {
        let options = GetOptions::new().with_prefix();
        let resp = self.client.clone().get(prefix, Some(options)).await?;
        Ok(resp
            .kvs()
            .iter()
            .map(|kv| (String::from_utf8_lossy(kv.key()).into_owned(), versioned(kv)))
            .collect())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.client.clone().put(key, value.to_vec(), None).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client.clone().delete(key, None).await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let options = DeleteOptions::new().with_prefix();
        self.client.clone().delete(prefix, Some(options)).await?;
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected_version: i64,
        value: &[u8],
        guards: &[Guard],
    ) -> Result<bool> {
        let mut compares = Vec::with_capacity(guards.len() + 1);
        compares.push(Compare::version(key, CompareOp::Equal, expected_version));
        for guard in guards {
            compares.push(Compare::mod_revision(
                guard.key.as_str(),
                CompareOp::Equal,
                guard.mod_revision,
            ));
        }

        let txn = Txn::new()
            .when(compares)
            .and_then(vec![TxnOp::put(key, value.to_vec(), None)]);
        let resp = self.client.clone().txn(txn).await?;
        Ok(resp.succeeded())
    }
}
