//! Encoding values against a writer schema

use crate::codec::binary::{write_len_prefixed, write_varint};
use crate::error::{Result, SchemaError};
use crate::schema::{FieldType, RecordSchema, Schema, UnionSchema};
use crate::value::{Record, Value};

pub(crate) struct Encoder<'s> {
    schema: &'s Schema,
    path: Vec<&'s str>,
}

impl<'s> Encoder<'s> {
    pub(crate) fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            path: Vec::new(),
        }
    }

    fn path(&self) -> String {
        self.path.join(".")
    }

    fn mismatch(&self, expected: &FieldType, value: &Value) -> SchemaError {
        SchemaError::TypeMismatch {
            path: self.path(),
            expected: expected.describe(),
            actual: value.kind().to_string(),
        }
    }

    pub(crate) fn encode_root(&mut self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        let root = self.schema.root();
        match value {
            Value::Record(record) => self.encode_record(root, record, out),
            other => Err(SchemaError::TypeMismatch {
                path: String::new(),
                expected: format!("record {}", root.name()),
                actual: other.kind().to_string(),
            }),
        }
    }

    fn encode_record(&mut self, schema: &'s RecordSchema, record: &Record, out: &mut Vec<u8>) -> Result<()> {
        for field in schema.fields() {
            self.path.push(field.name());
            let value = match (record.get(field.name()), field.default()) {
                (Some(value), _) => value,
                (None, Some(default)) => default,
                (None, None) => {
                    return Err(SchemaError::MissingField {
                        record: schema.name().fullname().to_string(),
                        field: field.name().to_string(),
                    })
                }
            };
            self.encode_value(field.field_type(), value, out)?;
            self.path.pop();
        }
        Ok(())
    }

    fn encode_value(&mut self, field_type: &'s FieldType, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        let field_type = self.schema.resolve(field_type)?;
        match (field_type, value) {
            (FieldType::Union(union), value) => {
                let (index, variant_value) = self.select_variant(union, value)?;
                write_varint(out, index as u64);
                self.encode_value(&union.variants()[index], variant_value, out)
            }
            (FieldType::Null, Value::Null) => Ok(()),
            (FieldType::Boolean, Value::Boolean(b)) => {
                out.push(u8::from(*b));
                Ok(())
            }
            (FieldType::Int, Value::Int(i)) => {
                out.extend_from_slice(&i.to_le_bytes());
                Ok(())
            }
            (FieldType::Long, Value::Long(l)) => {
                out.extend_from_slice(&l.to_le_bytes());
                Ok(())
            }
            (FieldType::Float, Value::Float(f)) => {
                out.extend_from_slice(&f.to_le_bytes());
                Ok(())
            }
            (FieldType::Double, Value::Double(d)) => {
                out.extend_from_slice(&d.to_le_bytes());
                Ok(())
            }
            (FieldType::String, Value::String(s)) => {
                write_len_prefixed(out, s.as_bytes());
                Ok(())
            }
            (FieldType::Bytes, Value::Bytes(b)) => {
                write_len_prefixed(out, b);
                Ok(())
            }
            (FieldType::Fixed(fixed), Value::Fixed(b) | Value::Bytes(b)) => {
                if b.len() != fixed.size() {
                    return Err(SchemaError::FixedSizeMismatch {
                        path: self.path(),
                        expected: fixed.size(),
                        actual: b.len(),
                    });
                }
                out.extend_from_slice(b);
                Ok(())
            }
            (FieldType::Array(items), Value::Array(values)) => {
                write_varint(out, values.len() as u64);
                self.path.push("[]");
                for item in values {
                    self.encode_value(items, item, out)?;
                }
                self.path.pop();
                Ok(())
            }
            (FieldType::Map(values), Value::Map(entries)) => {
                write_varint(out, entries.len() as u64);
                self.path.push("{}");
                for (key, entry) in entries {
                    write_len_prefixed(out, key.as_bytes());
                    self.encode_value(values, entry, out)?;
                }
                self.path.pop();
                Ok(())
            }
            (FieldType::Record(record_schema), Value::Record(record)) => {
                self.encode_record(record_schema, record, out)
            }
            (expected, value) => Err(self.mismatch(expected, value)),
        }
    }

    /// Pick the union variant a value is written as
    fn select_variant<'v>(&self, union: &'s UnionSchema, value: &'v Value) -> Result<(usize, &'v Value)> {
        let unresolved = |detail: String| SchemaError::UnresolvedUnionVariant {
            path: self.path(),
            detail,
        };

        if let Value::Union(index, inner) = value {
            return match union.variant(*index) {
                Some(_) => Ok((*index, inner.as_ref())),
                None => Err(unresolved(format!(
                    "variant index {} out of range for {}",
                    index,
                    FieldType::Union(union.clone()).describe()
                ))),
            };
        }

        for (index, variant) in union.variants().iter().enumerate() {
            let variant = self.schema.resolve(variant)?;
            let accepts = match (variant, value) {
                (FieldType::Record(schema), Value::Record(record)) => schema.name().matches(record.name()),
                (FieldType::Fixed(fixed), Value::Fixed(bytes)) => fixed.size() == bytes.len(),
                (FieldType::Null, Value::Null)
                | (FieldType::Boolean, Value::Boolean(_))
                | (FieldType::Int, Value::Int(_))
                | (FieldType::Long, Value::Long(_))
                | (FieldType::Float, Value::Float(_))
                | (FieldType::Double, Value::Double(_))
                | (FieldType::String, Value::String(_))
                | (FieldType::Bytes, Value::Bytes(_))
                | (FieldType::Array(_), Value::Array(_))
                | (FieldType::Map(_), Value::Map(_)) => true,
                _ => false,
            };
            if accepts {
                return Ok((index, value));
            }
        }

        if let Value::Fixed(bytes) = value {
            let mut fixed_sizes = union.variants().iter().filter_map(|v| match self.schema.resolve(v) {
                Ok(FieldType::Fixed(fixed)) => Some(fixed.size()),
                _ => None,
            });
            if let (Some(expected), None) = (fixed_sizes.next(), fixed_sizes.next()) {
                return Err(SchemaError::FixedSizeMismatch {
                    path: self.path(),
                    expected,
                    actual: bytes.len(),
                });
            }
        }

        let shape = match value {
            Value::Record(record) => format!("record {}", record.name()),
            other => other.kind().to_string(),
        };
        Err(unresolved(format!(
            "no variant of {} accepts a {}",
            FieldType::Union(union.clone()).describe(),
            shape
        )))
    }
}
