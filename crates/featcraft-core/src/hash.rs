//! Content digests for step lists, tables and artifacts (BLAKE3).

use serde::Serialize;

use crate::error::{Error, Result};

/// A 32-byte BLAKE3 digest. Displays as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    /// First `n` hex characters.
    pub fn short_hex(&self, n: usize) -> String {
        let mut s = self.to_hex();
        s.truncate(n);
        s
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    Hash256(*blake3::hash(bytes).as_bytes())
}

/// Digest of the canonical JSON encoding of `value`.
///
/// Struct fields serialize in declaration order and every map in the model
/// is a `BTreeMap`, so equal values always produce equal bytes.
pub fn hash_serde<T: Serialize>(value: &T) -> Result<Hash256> {
    let mut hasher = blake3::Hasher::new();
    serde_json::to_writer(&mut hasher, value).map_err(|e| Error::Hash(e.to_string()))?;
    Ok(Hash256(*hasher.finalize().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_and_buffered_digests_agree() {
        let value = vec![("a", 1), ("b", 2)];
        let buffered = hash_bytes(&serde_json::to_vec(&value).unwrap());
        assert_eq!(hash_serde(&value).unwrap(), buffered);
        assert_eq!(buffered.to_hex().len(), 64);
        assert_eq!(buffered.short_hex(8), buffered.to_hex()[..8]);
    }

    #[test]
    fn digest_tracks_content() {
        assert_ne!(hash_serde(&[1, 2, 3]).unwrap(), hash_serde(&[1, 2, 4]).unwrap());
    }
}
