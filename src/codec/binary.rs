//! Primitive binary encodings
//!
//! Fixed-width numerics are little-endian. Lengths, counts and union discriminants are
//! unsigned LEB128 varints.

use std::io::Read;

use crate::error::{Result, SchemaError};

/// Longest LEB128 encoding of a u64
const MAX_VARINT_LEN: usize = 10;

/// Most items accepted in one array or map whose items can encode to zero bytes
pub(crate) const MAX_ZERO_WIDTH_ITEMS: usize = 1 << 20;

pub(crate) fn write_varint(out: &mut Vec<u8>, mut n: u64) {
    while n >= 0x80 {
        out.push((n as u8) | 0x80);
        n >>= 7;
    }
    out.push(n as u8);
}

pub(crate) fn write_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    write_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

/// Read a varint from a stream; `Ok(None)` on a clean end of stream
pub(crate) fn read_varint_from<R: Read>(source: &mut R, offset: usize) -> Result<Option<u64>> {
    let mut value = 0u64;
    for i in 0..MAX_VARINT_LEN {
        let mut byte = [0u8; 1];
        if source.read(&mut byte)? == 0 {
            if i == 0 {
                return Ok(None);
            }
            return Err(SchemaError::malformed(offset + i, "stream ended inside a varint"));
        }
        value |= u64::from(byte[0] & 0x7f) << (7 * i);
        if byte[0] & 0x80 == 0 {
            return Ok(Some(value));
        }
    }
    Err(SchemaError::malformed(offset, "varint longer than 10 bytes"))
}

/// Cursor over an encoded payload
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(SchemaError::malformed(
                self.pos,
                format!("needed {} bytes, {} left", n, self.remaining()),
            ));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    pub(crate) fn read_varint(&mut self) -> Result<u64> {
        let start = self.pos;
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.take(1)?[0];
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(SchemaError::malformed(start, "varint longer than 10 bytes"))
    }

    /// An item count. Items at least `min_width` bytes wide must all fit in what is left;
    /// zero-width items are capped at [`MAX_ZERO_WIDTH_ITEMS`].
    pub(crate) fn read_count(&mut self, min_width: usize) -> Result<usize> {
        let start = self.pos;
        let count = self.read_varint()?;
        let limit = match min_width {
            0 => MAX_ZERO_WIDTH_ITEMS,
            width => self.remaining() / width,
        };
        match usize::try_from(count) {
            Ok(count) if count <= limit => Ok(count),
            _ => Err(SchemaError::malformed(
                start,
                format!("count {} exceeds the {} items that can follow", count, limit),
            )),
        }
    }

    /// A byte length, bounded by what could still be in the payload
    pub(crate) fn read_len(&mut self) -> Result<usize> {
        let start = self.pos;
        let len = self.read_varint()?;
        match usize::try_from(len) {
            Ok(len) if len <= self.remaining() => Ok(len),
            _ => Err(SchemaError::malformed(
                start,
                format!("length {} exceeds the {} remaining bytes", len, self.remaining()),
            )),
        }
    }

    pub(crate) fn read_bool(&mut self) -> Result<bool> {
        let start = self.pos;
        match self.take(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SchemaError::malformed(start, format!("invalid boolean byte {:#04x}", other))),
        }
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_len()?;
        self.take(len)
    }

    pub(crate) fn read_string(&mut self) -> Result<String> {
        let start = self.pos;
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes)
            .map(String::from)
            .map_err(|e| SchemaError::malformed(start, format!("string is not UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_boundaries() {
        for n in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut out = Vec::new();
            write_varint(&mut out, n);
            let mut reader = ByteReader::new(&out);
            assert_eq!(reader.read_varint().unwrap(), n);
            assert!(reader.is_empty());
        }

        let mut out = Vec::new();
        write_varint(&mut out, 300);
        assert_eq!(out, vec![0xac, 0x02]);
    }

    #[test]
    fn test_overlong_varint_is_malformed() {
        let data = [0xffu8; 11];
        let mut reader = ByteReader::new(&data);
        assert!(matches!(reader.read_varint(), Err(SchemaError::MalformedPayload { .. })));
    }

    #[test]
    fn test_length_larger_than_payload_is_malformed() {
        let mut data = Vec::new();
        write_varint(&mut data, 1_000_000);
        data.extend_from_slice(b"short");
        let mut reader = ByteReader::new(&data);
        assert!(matches!(reader.read_bytes(), Err(SchemaError::MalformedPayload { offset: 0, .. })));
    }

    #[test]
    fn test_counts_bounded_by_item_width() {
        // Three zero-width items need no further bytes
        assert_eq!(ByteReader::new(&[3]).read_count(0).unwrap(), 3);

        // Three 4-byte items cannot fit in 8 bytes
        let data = [3u8, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            ByteReader::new(&data).read_count(4),
            Err(SchemaError::MalformedPayload { offset: 0, .. })
        ));
        assert_eq!(ByteReader::new(&data[..]).read_count(2).unwrap(), 3);

        let mut huge = Vec::new();
        write_varint(&mut huge, MAX_ZERO_WIDTH_ITEMS as u64 + 1);
        assert!(ByteReader::new(&huge).read_count(0).is_err());
    }

    #[test]
    fn test_invalid_utf8_and_bool() {
        let mut data = Vec::new();
        write_len_prefixed(&mut data, &[0xff, 0xfe]);
        assert!(ByteReader::new(&data).read_string().is_err());
        assert!(ByteReader::new(&[2]).read_bool().is_err());
    }

    #[test]
    fn test_stream_varint() {
        let mut out = Vec::new();
        write_varint(&mut out, 16_384);
        let mut source = &out[..];
        assert_eq!(read_varint_from(&mut source, 0).unwrap(), Some(16_384));
        assert_eq!(read_varint_from(&mut source, 3).unwrap(), None);

        let mut truncated = &[0x80u8][..];
        assert!(read_varint_from(&mut truncated, 0).is_err());
    }
}
