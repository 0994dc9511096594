//! Response DTOs for the photo cache API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::facade::PhotoCacheStats;
use crate::fetch::FetchStats;

/// Per-tier view with the derived hit rate
#[derive(Debug, Clone, Serialize)]
pub struct TierStats {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for TierStats {
    fn from(stats: CacheStats) -> Self {
        let hit_rate = stats.hit_rate();
        Self { stats, hit_rate }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub memory: TierStats,
    /// Absent when running memory-only
    pub disk: Option<TierStats>,
    pub fetch: FetchStats,
}

impl From<PhotoCacheStats> for StatsResponse {
    fn from(stats: PhotoCacheStats) -> Self {
        Self {
            memory: stats.memory.into(),
            disk: stats.disk.map(TierStats::from),
            fetch: stats.fetch,
        }
    }
}

/// Response body for POST /flush
#[derive(Debug, Clone, Serialize)]
pub struct FlushResponse {
    pub message: String,
    /// False when there is no disk tier to flush
    pub disk_backed: bool,
}

impl FlushResponse {
    pub fn new(disk_backed: bool) -> Self {
        Self {
            message: "Cache flushed successfully".to_string(),
            disk_backed,
        }
    }
}

/// Response body for POST /cancel
#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    /// Number of fetch tasks that were in flight
    pub cancelled: usize,
}

impl CancelResponse {
    pub fn new(cancelled: usize) -> Self {
        Self { cancelled }
    }
}

/// Response body for PUT /viewport
#[derive(Debug, Clone, Serialize)]
pub struct ViewportResponse {
    pub message: String,
    pub item_size: u32,
}

impl ViewportResponse {
    pub fn new(item_size: u32) -> Self {
        Self {
            message: format!("Viewport resized to {}px", item_size),
            item_size,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    /// Whether the disk tier is available
    pub disk_backed: bool,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(disk_backed: bool) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            disk_backed,
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
