//! Sync configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote data gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Query cache freshness and retry policy.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Durable snapshot settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Remote data gateway connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the REST API, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout for REST calls (seconds). Streams are not bounded.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Token bucket size for outgoing requests.
    #[serde(default = "default_requests_per_sec")]
    pub requests_per_sec: u32,

    /// Offer stream path; `{id}` is replaced with the fixture id.
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
}

/// Query cache policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entries older than this are served but revalidated.
    #[serde(default = "default_stale_secs")]
    pub stale_secs: u64,

    /// Idle entries are discarded after this long without subscribers.
    #[serde(default = "default_gc_secs")]
    pub gc_secs: u64,

    /// Extra attempts after a failed fetch.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base delay between attempts; doubles each retry.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Durable snapshot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// When false the cache runs purely in memory.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding one JSON blob per persisted key.
    #[serde(default = "default_snapshot_dir")]
    pub dir: String,

    /// Snapshots older than this are pruned at startup.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

impl CacheConfig {
    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_secs)
    }

    pub fn gc_time(&self) -> Duration {
        Duration::from_secs(self.gc_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "http://localhost:5000/api".into()
}
fn default_request_timeout() -> u64 {
    15
}
fn default_requests_per_sec() -> u32 {
    20
}
fn default_stream_path() -> String {
    "/fixtures/{id}/offers/stream".into()
}

fn default_stale_secs() -> u64 {
    300
}
fn default_gc_secs() -> u64 {
    1800
}
fn default_retries() -> u32 {
    2
}
fn default_retry_delay_ms() -> u64 {
    500
}

fn default_snapshot_dir() -> String {
    ".ticket-sync/cache".into()
}
fn default_max_age_secs() -> u64 {
    86_400
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            requests_per_sec: default_requests_per_sec(),
            stream_path: default_stream_path(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_secs: default_stale_secs(),
            gc_secs: default_gc_secs(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            dir: default_snapshot_dir(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            cache: CacheConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}
