//! Disk Cache Module
//!
//! Persistent blob tier: journal format and the store built on it.

mod journal;
mod store;

pub use store::{BlobWriter, DiskCache, Editor, Snapshot};

// == Public Constants ==
/// Value slots per key used by the photo cache (the encoded image).
pub const VALUE_SLOTS: usize = 1;

/// Slot holding the encoded image bytes.
pub const IMAGE_SLOT: usize = 0;
