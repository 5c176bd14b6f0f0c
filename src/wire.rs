//! Wire framing for payloads that reference their writer schema by registry id
//!
//! `[0x00 magic][u32 big-endian schema id][record bytes]`

use crate::error::{Result, SchemaError};
use crate::registry::SchemaId;

pub const MAGIC_BYTE: u8 = 0x00;

/// Length of the magic byte plus schema id
pub const HEADER_LEN: usize = 5;

/// Prefix an encoded record with its schema id
pub fn frame(id: SchemaId, body: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(HEADER_LEN + body.len());
    framed.push(MAGIC_BYTE);
    framed.extend_from_slice(&id.0.to_be_bytes());
    framed.extend_from_slice(body);
    framed
}

/// Split a framed payload into its schema id and record bytes
pub fn unframe(payload: &[u8]) -> Result<(SchemaId, &[u8])> {
    if payload.len() < HEADER_LEN {
        return Err(SchemaError::malformed(
            payload.len(),
            format!("payload of {} bytes is shorter than the {}-byte header", payload.len(), HEADER_LEN),
        ));
    }
    if payload[0] != MAGIC_BYTE {
        return Err(SchemaError::malformed(
            0,
            format!("invalid magic byte: expected {}, got {}", MAGIC_BYTE, payload[0]),
        ));
    }
    let id = u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
    Ok((SchemaId(id), &payload[HEADER_LEN..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let framed = frame(SchemaId(258), &[9, 9]);
        assert_eq!(framed, vec![0, 0, 0, 1, 2, 9, 9]);

        let (id, body) = unframe(&framed).unwrap();
        assert_eq!(id, SchemaId(258));
        assert_eq!(body, &[9, 9]);
    }

    #[test]
    fn test_bad_frames() {
        assert!(matches!(unframe(&[0, 0, 1]), Err(SchemaError::MalformedPayload { .. })));
        assert!(matches!(unframe(&[1, 0, 0, 0, 1]), Err(SchemaError::MalformedPayload { offset: 0, .. })));
    }
}
