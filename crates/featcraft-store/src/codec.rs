//! Artifact framing.
//!
//! Layout:
//! [ magic: u32 ][ version: u16 ][ reserved: u16 ][ payload_len: u64 ]
//! [ checksum: 32 bytes, blake3(header || payload) ]
//! [ payload: JSON bytes ]

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

pub const MAGIC: u32 = 0x4643_4654; // "FCFT"
pub const VERSION: u16 = 1;
pub const HEADER_LEN: usize = 4 + 2 + 2 + 8;
pub const FRAME_LEN: usize = HEADER_LEN + 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactHeader {
    pub magic: u32,
    pub version: u16,
    pub payload_len: u64,
}

impl ArtifactHeader {
    pub fn new(payload_len: u64) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            payload_len,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN);
        out.extend_from_slice(&self.magic.to_le_bytes());
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // reserved
        out.extend_from_slice(&self.payload_len.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(StoreError::Corrupt("short header".into()));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        let mut version = [0u8; 2];
        version.copy_from_slice(&bytes[4..6]);
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[8..16]);

        let header = Self {
            magic: u32::from_le_bytes(magic),
            version: u16::from_le_bytes(version),
            payload_len: u64::from_le_bytes(len),
        };
        if header.magic != MAGIC || header.version != VERSION {
            return Err(StoreError::Corrupt("bad magic/version".into()));
        }
        Ok(header)
    }
}

/// Serialize `value` as JSON and frame it with a checksummed header.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let payload =
        serde_json::to_vec(value).map_err(|e| StoreError::Codec(format!("json serialize: {e}")))?;
    let header = ArtifactHeader::new(payload.len() as u64).to_bytes();

    let mut hasher = blake3::Hasher::new();
    hasher.update(&header);
    hasher.update(&payload);
    let checksum: [u8; 32] = hasher.finalize().into();

    let mut out = Vec::with_capacity(FRAME_LEN + payload.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(&checksum);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Verify the frame and deserialize its payload.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let header = ArtifactHeader::from_bytes(bytes)?;
    if bytes.len() < FRAME_LEN {
        return Err(StoreError::Corrupt("short frame".into()));
    }
    let payload = &bytes[FRAME_LEN..];
    if payload.len() as u64 != header.payload_len {
        return Err(StoreError::Corrupt(format!(
            "payload is {} bytes, header says {}",
            payload.len(),
            header.payload_len
        )));
    }

    let mut hasher = blake3::Hasher::new();
    hasher.update(&bytes[..HEADER_LEN]);
    hasher.update(payload);
    let computed: [u8; 32] = hasher.finalize().into();
    if computed[..] != bytes[HEADER_LEN..FRAME_LEN] {
        return Err(StoreError::Corrupt("checksum mismatch".into()));
    }

    serde_json::from_slice(payload).map_err(|e| StoreError::Codec(format!("json deserialize: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_flipped_payload_byte() {
        let mut bytes = encode(&vec!["a", "b", "c"]).unwrap();
        let last = bytes.len() - 2;
        bytes[last] ^= 0x01;
        assert!(matches!(
            decode::<Vec<String>>(&bytes),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn detects_truncation_and_bad_magic() {
        let bytes = encode(&42u32).unwrap();
        assert!(decode::<u32>(&bytes[..bytes.len() - 1]).is_err());
        assert!(decode::<u32>(&bytes[..10]).is_err());

        let mut wrong = bytes.clone();
        wrong[0] = 0;
        assert!(matches!(decode::<u32>(&wrong), Err(StoreError::Corrupt(_))));
        assert_eq!(decode::<u32>(&bytes).unwrap(), 42);
    }

    #[test]
    fn floats_come_back_bit_exact() {
        // values whose shortest decimal form needs all 17 digits
        let values: Vec<f64> = (1..2000)
            .map(|i| (i as f64 * 0.1 - 37.3) / 3.0_f64.sqrt())
            .chain([-0.185_695_338_177_051_86, f64::MIN_POSITIVE, 1e-300, f64::MAX])
            .collect();
        let back: Vec<f64> = decode(&encode(&values).unwrap()).unwrap();
        for (a, b) in values.iter().zip(&back) {
            assert_eq!(a.to_bits(), b.to_bits(), "{a} decoded as {b}");
        }
    }
}
