//! Content fingerprints for detecting whether a pass changed a module.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 128-bit content fingerprint computed with XXH3.
///
/// The pipeline driver fingerprints every module before and after each pass;
/// two equal fingerprints mean the pass left the module untouched.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Computes a fingerprint from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Folds another fingerprint into this one, order-sensitively.
    pub fn combine(self, other: ContentHash) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..16].copy_from_slice(&self.0);
        bytes[16..].copy_from_slice(&other.0);
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}
