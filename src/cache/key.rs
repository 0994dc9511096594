//! Cache Key Module
//!
//! Maps arbitrary source identifiers (usually URLs) to fixed-length,
//! filesystem-safe keys shared by the memory and disk tiers.

use std::borrow::Borrow;
use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::StorageError;

/// Longest key accepted when parsing keys back from storage.
pub const MAX_KEY_LENGTH: usize = 120;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

// == Cache Key ==
/// Hashed storage key. Only `[a-z0-9_-]` characters, at most
/// [`MAX_KEY_LENGTH`] long.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Validates a raw key read from storage.
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let legal = !raw.is_empty()
            && raw.len() <= MAX_KEY_LENGTH
            && raw
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');

        if legal {
            Ok(Self(raw.to_string()))
        } else {
            Err(StorageError::InvalidKey(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// == Key Hasher ==
/// Digest used to derive cache keys.
///
/// `Fnv1a` is the degraded fallback: deterministic, but with 64-bit
/// collision resistance instead of 256-bit. Keys from the two algorithms
/// differ in length, so switching algorithms never aliases old entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyHasher {
    #[default]
    Sha256,
    Fnv1a,
}

impl KeyHasher {
    /// Parses a configuration name (`sha256` or `fnv1a`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Some(Self::Sha256),
            "fnv1a" | "fnv" => Some(Self::Fnv1a),
            _ => None,
        }
    }

    /// Hashes an identifier into a cache key. Pure and deterministic.
    pub fn hash(&self, identifier: &str) -> CacheKey {
        match self {
            KeyHasher::Sha256 => {
                let digest = Sha256::digest(identifier.as_bytes());
                CacheKey(hex::encode(digest))
            }
            KeyHasher::Fnv1a => {
                let hash = identifier.bytes().fold(FNV_OFFSET_BASIS, |acc, b| {
                    (acc ^ u64::from(b)).wrapping_mul(FNV_PRIME)
                });
                CacheKey(format!("{:016x}", hash))
            }
        }
    }
}
