//! Cache Module
//!
//! Key hashing, LRU bookkeeping and the in-memory asset tier.

mod key;
mod lru;
mod memory;
mod stats;


// Re-export public types
pub use key::{CacheKey, KeyHasher, MAX_KEY_LENGTH};
pub use lru::LruTracker;
pub use memory::{MemoryCache, SizeFn};
pub use stats::CacheStats;

// == Public Constants ==
/// Share of the memory budget given to the decoded-asset cache (1/8).
pub const MEMORY_BUDGET_DIVISOR: u64 = 8;
