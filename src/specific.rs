//! Typed records
//!
//! Implement [`SpecificRecord`] for a struct to send and receive it directly instead of
//! going through [`Value`] by hand.

use crate::error::{Result, SchemaError};
use crate::schema::Schema;
use crate::value::{Record, Value};

/// A Rust type with a fixed record schema
pub trait SpecificRecord: Sized {
    /// The schema this type is written and read with
    fn schema() -> Schema;

    /// The record value of `self`
    fn to_value(&self) -> Value;

    /// Build `Self` from a record decoded against [`SpecificRecord::schema`]
    fn from_value(value: Value) -> Result<Self>;
}

/// Unwrap the record of a decoded value
pub fn expect_record(value: Value) -> Result<Record> {
    match value {
        Value::Record(record) => Ok(record),
        other => Err(SchemaError::TypeMismatch {
            path: String::new(),
            expected: "record".to_string(),
            actual: other.kind().to_string(),
        }),
    }
}

/// Remove a field from a record, failing if it is absent
pub fn take_field(record: &mut Record, field: &str) -> Result<Value> {
    record.take(field).ok_or_else(|| SchemaError::MissingField {
        record: record.name().to_string(),
        field: field.to_string(),
    })
}

/// Remove a field and convert it, failing with a type mismatch when `convert` declines
pub fn take_as<T>(
    record: &mut Record,
    field: &str,
    expected: &str,
    convert: impl FnOnce(&Value) -> Option<T>,
) -> Result<T> {
    let value = take_field(record, field)?;
    convert(&value).ok_or_else(|| SchemaError::TypeMismatch {
        path: field.to_string(),
        expected: expected.to_string(),
        actual: value.kind().to_string(),
    })
}
