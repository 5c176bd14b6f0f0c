//! Schema fingerprints for de-duplication and container sync markers

use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 fingerprint of a schema's canonical form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Checksum([u8; 32]);

impl Checksum {
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 16 digest bytes, used to delimit blocks in container files
    pub fn sync_marker(&self) -> [u8; 16] {
        let mut marker = [0u8; 16];
        marker.copy_from_slice(&self.0[..16]);
        marker
    }
}

/// Lowercase hex
impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_consistency() {
        let content = r#"{"name":"generic_avro","type":"record"}"#;
        assert_eq!(Checksum::from_str(content), Checksum::from_str(content));
        assert_ne!(Checksum::from_str(content), Checksum::from_str(r#"{"name":"v2"}"#));
    }

    #[test]
    fn test_hex_and_sync_marker() {
        let checksum = Checksum::from_str("abc");
        assert_eq!(
            checksum.to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(&checksum.sync_marker()[..], &checksum.digest()[..16]);
    }
}
