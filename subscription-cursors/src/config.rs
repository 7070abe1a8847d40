use coordination_store::StoreConfig;
use envconfig::Envconfig;

use crate::coordinator::CommitConfig;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    // ── etcd ────────────────────────────────────────────────────────
    #[envconfig(default = "http://localhost:2379")]
    pub etcd_endpoints: String,

    #[envconfig(default = "/nakadi/")]
    pub etcd_prefix: String,

    // ── Commit protocol ─────────────────────────────────────────────
    /// Compare-and-set attempts per partition before a commit fails with a
    /// conflict.
    #[envconfig(default = "3")]
    pub max_cas_attempts: u32,

    #[envconfig(default = "18")]
    pub cursor_offset_width: usize,
}

impl Config {
    pub fn init_with_defaults() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    pub fn etcd_endpoint_list(&self) -> Vec<String> {
        self.etcd_endpoints
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            endpoints: self.etcd_endpoint_list(),
            prefix: self.etcd_prefix.clone(),
        }
    }

    pub fn commit_config(&self) -> CommitConfig {
        CommitConfig {
            max_cas_attempts: self.max_cas_attempts.max(1),
            offset_width: self.cursor_offset_width,
        }
    }
}
