//! Binary record codec
//!
//! [`encode`] writes a record value against one writer schema. [`decode`] parses bytes
//! strictly in the writer schema's layout and resolves them onto a reader schema, which
//! may be an older or newer version of the writer.
//!
//! Both operations are pure: no I/O, no shared state, and they either succeed completely
//! or fail without producing a partial record.

mod binary;
mod decode;
mod encode;

pub(crate) use binary::{read_varint_from, write_len_prefixed, write_varint, ByteReader};
pub(crate) use decode::matching_variant;

use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::schema::Schema;
use crate::value::Value;

use decode::Resolver;
use encode::Encoder;

/// Encode a record value against `schema`
pub fn encode(schema: &Schema, value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_into(schema, value, &mut out)?;
    Ok(out)
}

/// Encode a record value, appending to `out`.
///
/// On error `out` is left as it was.
pub fn encode_into(schema: &Schema, value: &Value, out: &mut Vec<u8>) -> Result<()> {
    let start = out.len();
    let result = Encoder::new(schema).encode_root(value, out);
    match result {
        Ok(()) => {
            debug!(schema = %schema.name(), bytes = out.len() - start, "encoded record");
            Ok(())
        }
        Err(e) => {
            out.truncate(start);
            Err(e)
        }
    }
}

/// Decode a payload written with `writer` into the shape of `reader`
pub fn decode(writer: &Schema, reader: &Schema, bytes: &[u8]) -> Result<Value> {
    SchemaPair::new(writer, reader).decode(bytes)
}

/// The writer/reader resolution context of a decode
#[derive(Debug, Clone, Copy)]
pub struct SchemaPair<'a> {
    writer: &'a Schema,
    reader: &'a Schema,
}

impl<'a> SchemaPair<'a> {
    pub fn new(writer: &'a Schema, reader: &'a Schema) -> Self {
        Self { writer, reader }
    }

    pub fn writer(&self) -> &'a Schema {
        self.writer
    }

    pub fn reader(&self) -> &'a Schema {
        self.reader
    }

    /// Decode exactly one record; trailing bytes are an error
    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let mut input = ByteReader::new(bytes);
        let value = self.decode_next(&mut input)?;
        if !input.is_empty() {
            return Err(SchemaError::malformed(
                input.position(),
                format!("{} trailing bytes after the record", input.remaining()),
            ));
        }
        Ok(value)
    }

    /// Decode the next record of a concatenated sequence
    pub(crate) fn decode_next(&self, input: &mut ByteReader<'_>) -> Result<Value> {
        let start = input.position();
        let value = Resolver::new(self.writer, self.reader).read_root(input)?;
        debug!(
            writer = %self.writer.name(),
            reader = %self.reader.name(),
            bytes = input.position() - start,
            "decoded record"
        );
        Ok(value)
    }
}
