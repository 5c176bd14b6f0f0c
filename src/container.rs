//! Self-describing record files
//!
//! A container stores its writer schema once in the header, followed by blocks of
//! records encoded with it:
//!
//! ```text
//! header: "SEV\x01" | varint len | schema JSON | sync (16 bytes)
//! block:  varint count | varint byte size | records | sync
//! ```
//!
//! The sync marker is derived from the schema fingerprint; a block whose trailing marker
//! does not match is treated as corrupt.

use std::io::{self, Read, Write};

use tracing::debug;

use crate::codec::{encode_into, read_varint_from, write_len_prefixed, write_varint, ByteReader, SchemaPair};
use crate::config::ContainerConfig;
use crate::error::{Result, SchemaError};
use crate::schema::Schema;
use crate::value::Value;

pub const CONTAINER_MAGIC: [u8; 4] = *b"SEV\x01";

const SYNC_LEN: usize = 16;

pub struct ContainerWriter<W: Write> {
    inner: W,
    schema: Schema,
    sync: [u8; SYNC_LEN],
    records_per_block: usize,
    block: Vec<u8>,
    pending: usize,
}

impl<W: Write> ContainerWriter<W> {
    /// Write the header and prepare to append records
    pub fn new(mut inner: W, schema: Schema, config: &ContainerConfig) -> Result<Self> {
        let sync = schema.fingerprint().sync_marker();

        let mut header = Vec::new();
        header.extend_from_slice(&CONTAINER_MAGIC);
        write_len_prefixed(&mut header, schema.canonical_form().as_bytes());
        header.extend_from_slice(&sync);
        inner.write_all(&header)?;

        Ok(Self {
            inner,
            schema,
            sync,
            records_per_block: config.records_per_block.max(1),
            block: Vec::new(),
            pending: 0,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Encode and buffer one record; a full block is written out
    pub fn append(&mut self, value: &Value) -> Result<()> {
        encode_into(&self.schema, value, &mut self.block)?;
        self.pending += 1;
        if self.pending >= self.records_per_block {
            self.write_block()?;
        }
        Ok(())
    }

    /// Write any buffered records as a block and flush the underlying writer
    pub fn flush(&mut self) -> Result<()> {
        self.write_block()?;
        self.inner.flush()?;
        Ok(())
    }

    /// Flush and return the underlying writer
    pub fn finish(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.inner)
    }

    fn write_block(&mut self) -> Result<()> {
        if self.pending == 0 {
            return Ok(());
        }
        let mut prefix = Vec::new();
        write_varint(&mut prefix, self.pending as u64);
        write_varint(&mut prefix, self.block.len() as u64);

        self.inner.write_all(&prefix)?;
        self.inner.write_all(&self.block)?;
        self.inner.write_all(&self.sync)?;
        debug!(records = self.pending, bytes = self.block.len(), "Wrote container block");

        self.block.clear();
        self.pending = 0;
        Ok(())
    }
}

/// Iterates the records of a container, oldest first
pub struct ContainerReader<R: Read> {
    inner: R,
    writer: Schema,
    reader: Option<Schema>,
    sync: [u8; SYNC_LEN],
    /// Bytes consumed from `inner`
    offset: usize,
    block: Vec<u8>,
    block_pos: usize,
    block_remaining: u64,
    done: bool,
}

impl<R: Read> ContainerReader<R> {
    /// Read and validate the header
    pub fn new(mut inner: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        read_exact(&mut inner, &mut magic, 0)?;
        if magic != CONTAINER_MAGIC {
            return Err(SchemaError::malformed(0, "not a container file"));
        }

        let len = read_varint_from(&mut inner, 4)?
            .ok_or_else(|| SchemaError::malformed(4, "missing schema in header"))?;
        let len = usize::try_from(len).map_err(|_| SchemaError::malformed(4, "schema length overflows"))?;
        let mut text = Vec::new();
        (&mut inner).take(len as u64).read_to_end(&mut text)?;
        if text.len() != len {
            return Err(SchemaError::malformed(4, "header ends inside the schema"));
        }
        let text = String::from_utf8(text).map_err(|_| SchemaError::malformed(4, "schema is not UTF-8"))?;
        let writer = Schema::parse_str(&text)?;

        // magic + varint length + schema
        let mut offset = 4 + varint_len(len as u64) + len;
        let mut sync = [0u8; SYNC_LEN];
        read_exact(&mut inner, &mut sync, offset)?;
        if sync != writer.fingerprint().sync_marker() {
            return Err(SchemaError::malformed(offset, "sync marker does not match the header schema"));
        }
        offset += SYNC_LEN;

        Ok(Self {
            inner,
            writer,
            reader: None,
            sync,
            offset,
            block: Vec::new(),
            block_pos: 0,
            block_remaining: 0,
            done: false,
        })
    }

    /// Decode records into `reader` instead of the writer schema
    pub fn with_reader_schema(mut self, reader: Schema) -> Self {
        self.reader = Some(reader);
        self
    }

    /// The schema the records were written with
    pub fn writer_schema(&self) -> &Schema {
        &self.writer
    }

    /// Load the next block; `Ok(false)` at a clean end of file
    fn next_block(&mut self) -> Result<bool> {
        let start = self.offset;
        let Some(count) = read_varint_from(&mut self.inner, start)? else {
            return Ok(false);
        };
        self.offset += varint_len(count);

        let size = read_varint_from(&mut self.inner, self.offset)?
            .ok_or_else(|| SchemaError::malformed(self.offset, "block ends before its size"))?;
        self.offset += varint_len(size);
        let size = usize::try_from(size).map_err(|_| SchemaError::malformed(start, "block size overflows"))?;

        self.block.clear();
        (&mut self.inner).take(size as u64).read_to_end(&mut self.block)?;
        if self.block.len() != size {
            return Err(SchemaError::malformed(self.offset, "file ends inside a block"));
        }
        self.offset += size;

        let mut sync = [0u8; SYNC_LEN];
        read_exact(&mut self.inner, &mut sync, self.offset)?;
        if sync != self.sync {
            return Err(SchemaError::malformed(self.offset, "block sync marker mismatch"));
        }
        self.offset += SYNC_LEN;

        self.block_pos = 0;
        self.block_remaining = count;
        Ok(true)
    }

    fn next_record(&mut self) -> Result<Option<Value>> {
        while self.block_remaining == 0 {
            if self.block_pos != self.block.len() {
                return Err(SchemaError::malformed(self.offset, "block has bytes past its last record"));
            }
            if !self.next_block()? {
                return Ok(None);
            }
        }

        let reader = self.reader.as_ref().unwrap_or(&self.writer);
        let mut input = ByteReader::new(&self.block[self.block_pos..]);
        let value = SchemaPair::new(&self.writer, reader).decode_next(&mut input)?;
        self.block_pos += input.position();
        self.block_remaining -= 1;
        Ok(Some(value))
    }
}

impl<R: Read> Iterator for ContainerReader<R> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn read_exact<R: Read>(source: &mut R, buf: &mut [u8], offset: usize) -> Result<()> {
    source.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => SchemaError::malformed(offset, "unexpected end of file"),
        _ => SchemaError::Io(e),
    })
}

fn varint_len(mut n: u64) -> usize {
    let mut len = 1;
    while n >= 0x80 {
        n >>= 7;
        len += 1;
    }
    len
}
