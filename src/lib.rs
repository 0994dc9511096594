//! Photo Cache - A two-level image cache
//!
//! Decoded images live in a byte-bounded memory tier, encoded bytes in a
//! journaled, crash-safe disk tier. A fetch coordinator deduplicates
//! concurrent requests and streams network bodies straight into disk edits.

pub mod api;
pub mod cache;
pub mod config;
pub mod disk;
pub mod error;
pub mod facade;
pub mod fetch;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheKey, KeyHasher, MemoryCache};
pub use config::Config;
pub use disk::DiskCache;
pub use facade::{PhotoCache, PhotoCacheStats};
pub use fetch::{FetchCoordinator, ImageDecoder, Registration, Sink};
pub use tasks::spawn_flush_task;
