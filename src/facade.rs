//! Photo Cache Facade
//!
//! Public surface over the two cache tiers and the fetch coordinator:
//! request an asset for a sink, plus the lifecycle hooks a host calls on
//! suspension (flush), teardown (cancel all) and layout change (resize).

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::cache::{CacheKey, CacheStats, KeyHasher, MemoryCache};
use crate::config::Config;
use crate::disk::{DiskCache, VALUE_SLOTS};
use crate::error::{CacheError, Result};
use crate::fetch::{Decoder, FetchCoordinator, FetchStats, Registration, Sink, SinkId, Transport};

// == Stats Snapshot ==
/// Combined statistics of both tiers and the coordinator.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoCacheStats {
    pub memory: CacheStats,
    pub disk: Option<CacheStats>,
    pub fetch: FetchStats,
}

// == Photo Cache ==
/// Two-level asset cache. Construct once per application and share by
/// reference (typically inside an `Arc`).
pub struct PhotoCache<D: Decoder> {
    hasher: KeyHasher,
    memory: Arc<Mutex<MemoryCache<D::Asset>>>,
    disk: Option<DiskCache>,
    coordinator: FetchCoordinator<D>,
}

impl<D: Decoder> PhotoCache<D> {
    // == Open ==
    /// Opens the disk tier under `config.cache_dir` and wires the tiers to
    /// `transport` and `decoder`. Must be called within a Tokio runtime.
    ///
    /// If the disk cache cannot be opened the cache runs memory-only.
    pub fn open(config: &Config, transport: Arc<dyn Transport>, decoder: D) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| CacheError::Internal(format!("no Tokio runtime: {}", e)))?;

        let decoder = Arc::new(decoder);
        let size_decoder = Arc::clone(&decoder);
        let memory = Arc::new(Mutex::new(MemoryCache::new(
            config.memory_capacity_bytes(),
            move |asset: &D::Asset| size_decoder.size_of(asset),
        )));

        let disk = match DiskCache::open(
            &config.cache_dir,
            config.app_version,
            VALUE_SLOTS,
            config.disk_capacity_bytes,
        ) {
            Ok(disk) => Some(disk),
            Err(e) => {
                warn!(
                    directory = %config.cache_dir.display(),
                    error = %e,
                    "Disk cache unavailable, running memory-only"
                );
                None
            }
        };

        let coordinator = FetchCoordinator::new(
            Arc::clone(&memory),
            disk.clone(),
            transport,
            decoder,
            config.max_concurrent_fetches,
            runtime,
        );
        coordinator.set_target_size(config.item_size);

        info!(
            memory_capacity = config.memory_capacity_bytes(),
            disk_backed = disk.is_some(),
            "Photo cache ready"
        );

        Ok(Self {
            hasher: config.key_hasher,
            memory,
            disk,
            coordinator,
        })
    }

    pub fn key_for(&self, identifier: &str) -> CacheKey {
        self.hasher.hash(identifier)
    }

    // == Request Asset ==
    /// Binds `sink` to `identifier` and delivers the asset to it, from memory
    /// right away or asynchronously once fetched. A sink re-bound before the
    /// fetch completes does not receive the earlier asset.
    pub fn request_asset(&self, identifier: &str, sink: Arc<dyn Sink<D::Asset>>) -> Registration {
        let key = self.key_for(identifier);
        let ticket = self.coordinator.bindings().bind(sink.id(), identifier);

        let hit = self.lock_memory().get(&key);
        if let Some(asset) = hit {
            if sink.is_single_use() {
                self.coordinator.bindings().release_ticket(&ticket);
            }
            sink.deliver(asset);
            return Registration::Delivered;
        }

        self.coordinator.register(key, identifier, sink, ticket)
    }

    /// Memory-tier lookup without fetching.
    pub fn cached(&self, identifier: &str) -> Option<Arc<D::Asset>> {
        let key = self.key_for(identifier);
        self.lock_memory().get(&key)
    }

    /// Drops a sink's binding so pending fetches skip it.
    pub fn forget_sink(&self, sink: SinkId) -> bool {
        self.coordinator.bindings().release(sink)
    }

    // == Lifecycle ==
    /// Durability checkpoint: syncs the disk journal. Call before suspension.
    pub fn flush(&self) -> Result<()> {
        if let Some(disk) = &self.disk {
            disk.flush()?;
        }
        Ok(())
    }

    /// Cancels all in-flight fetches. Call before teardown.
    pub fn cancel_all(&self) -> usize {
        self.coordinator.cancel_all()
    }

    /// Changes the decode target for future fetches. Cache keys are not
    /// affected.
    pub fn resize_viewport(&self, item_size: u32) {
        self.coordinator.set_target_size(item_size);
        info!(item_size, "Viewport resized");
    }

    pub fn item_size(&self) -> u32 {
        self.coordinator.target_size().unwrap_or(0)
    }

    // == Accessors ==
    pub fn is_disk_backed(&self) -> bool {
        self.disk.is_some()
    }

    pub fn disk(&self) -> Option<&DiskCache> {
        self.disk.as_ref()
    }

    pub fn coordinator(&self) -> &FetchCoordinator<D> {
        &self.coordinator
    }

    pub fn stats(&self) -> PhotoCacheStats {
        PhotoCacheStats {
            memory: self.lock_memory().stats(),
            disk: self.disk.as_ref().map(DiskCache::stats),
            fetch: self.coordinator.stats(),
        }
    }

    fn lock_memory(&self) -> MutexGuard<'_, MemoryCache<D::Asset>> {
        self.memory
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
