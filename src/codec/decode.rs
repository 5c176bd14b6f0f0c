//! Decoding with writer/reader schema resolution
//!
//! Bytes are always framed by the writer schema. Each writer value is projected onto the
//! reader's declared type as it is read; writer fields unknown to the reader are parsed
//! and dropped, reader fields unknown to the writer take their defaults.

use std::collections::BTreeMap;
use std::mem::discriminant;

use crate::codec::binary::ByteReader;
use crate::error::{Result, SchemaError};
use crate::schema::{FieldType, RecordSchema, Schema, UnionSchema};
use crate::value::{Record, Value};

/// Nesting deeper than this is treated as a corrupt payload
const MAX_DEPTH: usize = 512;

/// Index of the reader union variant that reads a (resolved) writer type.
///
/// Named writer types match reader variants by name or alias; unnamed types match the
/// first reader variant of the same kind.
pub(crate) fn matching_variant(writer_type: &FieldType, reader: &Schema, union: &UnionSchema) -> Option<usize> {
    union.variants().iter().position(|variant| {
        let Ok(variant) = reader.resolve(variant) else {
            return false;
        };
        match (writer_type, variant) {
            (FieldType::Record(w), FieldType::Record(r)) => r.answers_to(w.name()),
            (FieldType::Fixed(w), FieldType::Fixed(r)) => r.answers_to(w.name()),
            (FieldType::Record(_), _) | (FieldType::Fixed(_), _) => false,
            (FieldType::Union(_), _) | (FieldType::Ref(_), _) => false,
            (w, r) => discriminant(w) == discriminant(r),
        }
    })
}

/// Fewest bytes any value of a writer type can encode to.
///
/// A record met again while its own fields are being measured counts as zero.
fn min_width<'s>(schema: &'s Schema, field_type: &'s FieldType, open: &mut Vec<&'s str>) -> usize {
    let Ok(field_type) = schema.resolve(field_type) else {
        return 0;
    };
    match field_type {
        FieldType::Null | FieldType::Ref(_) => 0,
        FieldType::Boolean | FieldType::String | FieldType::Bytes => 1,
        FieldType::Array(_) | FieldType::Map(_) | FieldType::Union(_) => 1,
        FieldType::Int | FieldType::Float => 4,
        FieldType::Long | FieldType::Double => 8,
        FieldType::Fixed(fixed) => fixed.size(),
        FieldType::Record(record) => {
            let name = record.name().fullname();
            if open.contains(&name) {
                return 0;
            }
            open.push(name);
            let width = record
                .fields()
                .iter()
                .map(|f| min_width(schema, f.field_type(), open))
                .fold(0usize, usize::saturating_add);
            open.pop();
            width
        }
    }
}

pub(crate) struct Resolver<'a> {
    writer: &'a Schema,
    reader: &'a Schema,
    path: Vec<&'a str>,
    depth: usize,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(writer: &'a Schema, reader: &'a Schema) -> Self {
        Self {
            writer,
            reader,
            path: Vec::new(),
            depth: 0,
        }
    }

    fn path(&self) -> String {
        self.path.join(".")
    }

    fn incompatible(&self, writer: &FieldType, reader: &FieldType) -> SchemaError {
        SchemaError::SchemaResolution {
            path: self.path(),
            writer: writer.describe(),
            reader: reader.describe(),
        }
    }

    fn item_width(&self, items: &FieldType) -> usize {
        min_width(self.writer, items, &mut Vec::new())
    }

    /// Map entries always carry a key of at least one byte
    fn entry_width(&self, values: &FieldType) -> usize {
        1usize.saturating_add(self.item_width(values))
    }

    fn descend(&mut self, input: &ByteReader<'_>) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(SchemaError::malformed(
                input.position(),
                format!("nesting deeper than {} levels", MAX_DEPTH),
            ));
        }
        Ok(())
    }

    pub(crate) fn read_root(&mut self, input: &mut ByteReader<'_>) -> Result<Value> {
        let writer = self.writer.root();
        let reader = self.reader.root();
        self.read_record(writer, reader, input).map(Value::Record)
    }

    fn read(&mut self, writer: &'a FieldType, reader: &'a FieldType, input: &mut ByteReader<'_>) -> Result<Value> {
        self.descend(input)?;
        let value = self.read_resolved(writer, reader, input);
        self.depth -= 1;
        value
    }

    fn read_resolved(&mut self, writer: &'a FieldType, reader: &'a FieldType, input: &mut ByteReader<'_>) -> Result<Value> {
        let writer = self.writer.resolve(writer)?;
        let reader = self.reader.resolve(reader)?;

        match (writer, reader) {
            (FieldType::Union(union), _) => {
                let start = input.position();
                let index = input.read_varint()?;
                let variant = usize::try_from(index)
                    .ok()
                    .and_then(|i| union.variant(i))
                    .ok_or_else(|| {
                        SchemaError::malformed(
                            start,
                            format!("union discriminant {} out of range ({} variants)", index, union.variants().len()),
                        )
                    })?;
                self.read(variant, reader, input)
            }
            (_, FieldType::Union(union)) => match matching_variant(writer, self.reader, union) {
                Some(index) => self.read(writer, &union.variants()[index], input),
                None => Err(match writer.named() {
                    Some(name) => SchemaError::UnresolvedUnionVariant {
                        path: self.path(),
                        detail: format!("reader {} has no variant named {}", reader.describe(), name),
                    },
                    None => self.incompatible(writer, reader),
                }),
            },
            (FieldType::Null, FieldType::Null) => Ok(Value::Null),
            (FieldType::Boolean, FieldType::Boolean) => input.read_bool().map(Value::Boolean),
            (FieldType::Int, FieldType::Int) => input.read_i32().map(Value::Int),
            (FieldType::Long, FieldType::Long) => input.read_i64().map(Value::Long),
            (FieldType::Float, FieldType::Float) => input.read_f32().map(Value::Float),
            (FieldType::Double, FieldType::Double) => input.read_f64().map(Value::Double),
            (FieldType::String, FieldType::String) => input.read_string().map(Value::String),
            (FieldType::Bytes, FieldType::Bytes) => input.read_bytes().map(|b| Value::Bytes(b.to_vec())),
            (FieldType::Fixed(w), FieldType::Fixed(r)) if w.size() == r.size() && r.answers_to(w.name()) => {
                input.take(w.size()).map(|b| Value::Fixed(b.to_vec()))
            }
            (FieldType::Array(w), FieldType::Array(r)) => {
                let count = input.read_count(self.item_width(w))?;
                let mut items = Vec::with_capacity(count.min(input.remaining()));
                self.path.push("[]");
                for _ in 0..count {
                    items.push(self.read(w, r, input)?);
                }
                self.path.pop();
                Ok(Value::Array(items))
            }
            (FieldType::Map(w), FieldType::Map(r)) => {
                let count = input.read_count(self.entry_width(w))?;
                let mut entries = BTreeMap::new();
                self.path.push("{}");
                for _ in 0..count {
                    let key = input.read_string()?;
                    let value = self.read(w, r, input)?;
                    entries.insert(key, value);
                }
                self.path.pop();
                Ok(Value::Map(entries))
            }
            (FieldType::Record(w), FieldType::Record(r)) => self.read_record(w, r, input).map(Value::Record),
            (writer, reader) => Err(self.incompatible(writer, reader)),
        }
    }

    fn read_record(&mut self, writer: &'a RecordSchema, reader: &'a RecordSchema, input: &mut ByteReader<'_>) -> Result<Record> {
        let mut slots: Vec<Option<Value>> = vec![None; reader.fields().len()];

        for (writer_field, binding) in writer.fields().iter().zip(reader.bind_writer_fields(writer)) {
            self.path.push(writer_field.name());
            match binding {
                Some(position) => {
                    let reader_field = &reader.fields()[position];
                    slots[position] = Some(self.read(writer_field.field_type(), reader_field.field_type(), input)?);
                }
                None => self.skip(writer_field.field_type(), input)?,
            }
            self.path.pop();
        }

        let mut record = Record::with_capacity(reader.name().fullname(), slots.len());
        for (reader_field, slot) in reader.fields().iter().zip(slots) {
            let value = match (slot, reader_field.default()) {
                (Some(value), _) => value,
                (None, Some(default)) => default.clone(),
                (None, None) => {
                    return Err(SchemaError::MissingField {
                        record: reader.name().fullname().to_string(),
                        field: reader_field.name().to_string(),
                    })
                }
            };
            record.put(reader_field.name(), value);
        }
        Ok(record)
    }

    /// Parse a writer value only to stay framing-correct
    fn skip(&mut self, writer: &'a FieldType, input: &mut ByteReader<'_>) -> Result<()> {
        self.descend(input)?;
        let writer = self.writer.resolve(writer)?;
        match writer {
            FieldType::Null => {}
            FieldType::Boolean => {
                input.read_bool()?;
            }
            FieldType::Int | FieldType::Float => {
                input.take(4)?;
            }
            FieldType::Long | FieldType::Double => {
                input.take(8)?;
            }
            FieldType::String => {
                input.read_string()?;
            }
            FieldType::Bytes => {
                input.read_bytes()?;
            }
            FieldType::Fixed(fixed) => {
                input.take(fixed.size())?;
            }
            FieldType::Array(items) => {
                for _ in 0..input.read_count(self.item_width(items))? {
                    self.skip(items, input)?;
                }
            }
            FieldType::Map(values) => {
                for _ in 0..input.read_count(self.entry_width(values))? {
                    input.read_bytes()?;
                    self.skip(values, input)?;
                }
            }
            FieldType::Record(record) => {
                for field in record.fields() {
                    self.skip(field.field_type(), input)?;
                }
            }
            FieldType::Union(union) => {
                let start = input.position();
                let index = input.read_varint()?;
                let variant = usize::try_from(index)
                    .ok()
                    .and_then(|i| union.variant(i))
                    .ok_or_else(|| SchemaError::malformed(start, format!("union discriminant {} out of range", index)))?;
                self.skip(variant, input)?;
            }
            FieldType::Ref(name) => {
                return Err(SchemaError::invalid(format!("unresolved reference '{}'", name)));
            }
        }
        self.depth -= 1;
        Ok(())
    }
}
