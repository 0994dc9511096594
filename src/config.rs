//! Configuration Module
//!
//! Handles loading and managing cache and server configuration from
//! environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cache::{KeyHasher, MEMORY_BUDGET_DIVISOR};

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of the disk cache
    pub cache_dir: PathBuf,
    /// Application-defined cache version; a change wipes the disk cache
    pub app_version: u32,
    /// Maximum bytes of encoded blobs kept on disk
    pub disk_capacity_bytes: u64,
    /// Process memory budget the memory cache takes its share from
    pub memory_budget_bytes: u64,
    /// Upper bound on concurrently running fetch tasks
    pub max_concurrent_fetches: usize,
    /// Network request timeout in seconds
    pub fetch_timeout: u64,
    /// Digest used to derive cache keys
    pub key_hasher: KeyHasher,
    /// Side of the square assets are decoded to (0 = natural size)
    pub item_size: u32,
    /// HTTP server port
    pub server_port: u16,
    /// Background journal flush interval in seconds
    pub flush_interval: u64,
    /// How long an HTTP request waits for delivery, in seconds
    pub delivery_timeout: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DIR` - Disk cache directory (default: `<tmp>/photo_cache`)
    /// - `APP_VERSION` - Cache version (default: 1)
    /// - `DISK_CAPACITY_BYTES` - Disk cache bound (default: 10 MiB)
    /// - `MEMORY_BUDGET_BYTES` - Memory budget, 1/8 goes to the cache (default: 256 MiB)
    /// - `MAX_CONCURRENT_FETCHES` - Worker pool size (default: 4)
    /// - `FETCH_TIMEOUT` - Network timeout in seconds (default: 30)
    /// - `KEY_HASHER` - `sha256` or `fnv1a` (default: sha256)
    /// - `ITEM_SIZE` - Decode target side in pixels (default: 0)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `FLUSH_INTERVAL` - Journal flush frequency in seconds (default: 30)
    /// - `DELIVERY_TIMEOUT` - Request wait in seconds (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            cache_dir: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            app_version: parse_var("APP_VERSION").unwrap_or(defaults.app_version),
            disk_capacity_bytes: parse_var("DISK_CAPACITY_BYTES")
                .unwrap_or(defaults.disk_capacity_bytes),
            memory_budget_bytes: parse_var("MEMORY_BUDGET_BYTES")
                .unwrap_or(defaults.memory_budget_bytes),
            max_concurrent_fetches: parse_var("MAX_CONCURRENT_FETCHES")
                .unwrap_or(defaults.max_concurrent_fetches),
            fetch_timeout: parse_var("FETCH_TIMEOUT").unwrap_or(defaults.fetch_timeout),
            key_hasher: env::var("KEY_HASHER")
                .ok()
                .and_then(|v| KeyHasher::from_name(&v))
                .unwrap_or(defaults.key_hasher),
            item_size: parse_var("ITEM_SIZE").unwrap_or(defaults.item_size),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            flush_interval: parse_var("FLUSH_INTERVAL").unwrap_or(defaults.flush_interval),
            delivery_timeout: parse_var("DELIVERY_TIMEOUT").unwrap_or(defaults.delivery_timeout),
        }
    }

    /// Byte capacity of the memory cache: one-eighth of the memory budget.
    pub fn memory_capacity_bytes(&self) -> usize {
        usize::try_from(self.memory_budget_bytes / MEMORY_BUDGET_DIVISOR).unwrap_or(usize::MAX)
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: env::temp_dir().join("photo_cache"),
            app_version: 1,
            disk_capacity_bytes: 10 * 1024 * 1024,
            memory_budget_bytes: 256 * 1024 * 1024,
            max_concurrent_fetches: 4,
            fetch_timeout: 30,
            key_hasher: KeyHasher::Sha256,
            item_size: 0,
            server_port: 3000,
            flush_interval: 30,
            delivery_timeout: 30,
        }
    }
}
