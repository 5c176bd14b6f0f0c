//! Schema compatibility checking
//!
//! A candidate schema is checked against existing versions by asking whether one side can
//! read data written with the other, using the same resolution rules as the decoder:
//!
//! - BACKWARD: a reader using the candidate can read data written with the existing schema
//! - FORWARD: a reader using the existing schema can read data written with the candidate
//! - FULL: both
//!
//! Transitive levels check every existing version, the others only the latest.

use std::collections::HashSet;
use std::fmt;
use std::mem::discriminant;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

use crate::codec::matching_variant;
use crate::error::SchemaError;
use crate::schema::{FieldSpec, FieldType, RecordSchema, Schema};

/// Compatibility level enforced when a new schema version is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityLevel {
    None,
    #[default]
    Backward,
    BackwardTransitive,
    Forward,
    ForwardTransitive,
    Full,
    FullTransitive,
}

impl CompatibilityLevel {
    pub fn is_backward(&self) -> bool {
        matches!(
            self,
            CompatibilityLevel::Backward
                | CompatibilityLevel::BackwardTransitive
                | CompatibilityLevel::Full
                | CompatibilityLevel::FullTransitive
        )
    }

    pub fn is_forward(&self) -> bool {
        matches!(
            self,
            CompatibilityLevel::Forward
                | CompatibilityLevel::ForwardTransitive
                | CompatibilityLevel::Full
                | CompatibilityLevel::FullTransitive
        )
    }

    pub fn is_transitive(&self) -> bool {
        matches!(
            self,
            CompatibilityLevel::BackwardTransitive
                | CompatibilityLevel::ForwardTransitive
                | CompatibilityLevel::FullTransitive
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompatibilityLevel::None => "NONE",
            CompatibilityLevel::Backward => "BACKWARD",
            CompatibilityLevel::BackwardTransitive => "BACKWARD_TRANSITIVE",
            CompatibilityLevel::Forward => "FORWARD",
            CompatibilityLevel::ForwardTransitive => "FORWARD_TRANSITIVE",
            CompatibilityLevel::Full => "FULL",
            CompatibilityLevel::FullTransitive => "FULL_TRANSITIVE",
        }
    }
}

impl fmt::Display for CompatibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompatibilityLevel {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "NONE" => CompatibilityLevel::None,
            "BACKWARD" => CompatibilityLevel::Backward,
            "BACKWARD_TRANSITIVE" => CompatibilityLevel::BackwardTransitive,
            "FORWARD" => CompatibilityLevel::Forward,
            "FORWARD_TRANSITIVE" => CompatibilityLevel::ForwardTransitive,
            "FULL" => CompatibilityLevel::Full,
            "FULL_TRANSITIVE" => CompatibilityLevel::FullTransitive,
            _ => return Err(SchemaError::invalid(format!("unknown compatibility level '{}'", s))),
        };
        Ok(level)
    }
}

/// Result of a compatibility check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityResult {
    /// Whether the schemas are compatible
    pub is_compatible: bool,
    /// List of changes detected
    pub changes: Vec<SchemaChange>,
    /// Summary of the compatibility check
    pub summary: String,
}

impl CompatibilityResult {
    fn from_changes(changes: Vec<SchemaChange>) -> Self {
        let breaking = changes.iter().filter(|c| c.is_breaking).count();
        let summary = if breaking > 0 {
            format!("{} breaking changes detected", breaking)
        } else if changes.is_empty() {
            "No changes detected".to_string()
        } else {
            format!("{} compatible changes detected", changes.len())
        };
        Self {
            is_compatible: breaking == 0,
            changes,
            summary,
        }
    }

    /// Descriptions of the breaking changes only
    pub fn messages(&self) -> Vec<String> {
        self.changes
            .iter()
            .filter(|c| c.is_breaking)
            .map(|c| c.description.clone())
            .collect()
    }
}

/// A detected change between schema versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChange {
    /// Type of change
    pub change_type: ChangeType,
    /// Dotted path to the changed field (e.g. "payload.addressFrom")
    pub path: String,
    /// Whether this change is breaking at the checked level
    pub is_breaking: bool,
    /// Human-readable description
    pub description: String,
}

/// Type of schema change, from the candidate's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// A new field was added
    FieldAdded,
    /// A field was removed
    FieldRemoved,
    /// A field's type changed
    TypeChanged,
    /// A named union variant has no counterpart on the reading side
    UnionVariantRemoved,
    /// A fixed type changed size
    FixedSizeChanged,
}

/// Compatibility checker for schema versions
pub struct CompatibilityChecker {
    level: CompatibilityLevel,
}

impl CompatibilityChecker {
    pub fn new(level: CompatibilityLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> CompatibilityLevel {
        self.level
    }

    /// Check a candidate against existing versions, ordered oldest first
    pub fn check(&self, candidate: &Schema, existing: &[Schema]) -> CompatibilityResult {
        if self.level == CompatibilityLevel::None {
            return CompatibilityResult::from_changes(Vec::new());
        }

        let against: &[Schema] = if self.level.is_transitive() {
            existing
        } else {
            existing.last().map(std::slice::from_ref).unwrap_or(&[])
        };

        let mut changes: Vec<SchemaChange> = Vec::new();
        for previous in against {
            let mut found = Vec::new();
            if self.level.is_backward() {
                found.extend(ReadCheck::run(previous, candidate, true));
            }
            if self.level.is_forward() {
                found.extend(ReadCheck::run(candidate, previous, false));
            }
            for change in found {
                if !changes.contains(&change) {
                    changes.push(change);
                }
            }
        }

        CompatibilityResult::from_changes(changes)
    }

    /// Check a single existing/candidate pair
    pub fn check_pair(&self, existing: &Schema, candidate: &Schema) -> CompatibilityResult {
        self.check(candidate, std::slice::from_ref(existing))
    }
}

impl Default for CompatibilityChecker {
    fn default() -> Self {
        Self::new(CompatibilityLevel::default())
    }
}

/// Whether a reader using `candidate` can decode every payload written with `existing`
pub fn is_backward_compatible(existing: &Schema, candidate: &Schema) -> bool {
    can_read(existing, candidate)
}

/// Whether data written with `writer` can be decoded with `reader`
pub fn can_read(writer: &Schema, reader: &Schema) -> bool {
    ReadCheck::run(writer, reader, true).iter().all(|c| !c.is_breaking)
}

/// Unified line diff of two schemas' pretty-printed canonical JSON
pub fn schema_diff(old: &Schema, new: &Schema) -> String {
    let old_text = pretty(old);
    let new_text = pretty(new);
    let diff = TextDiff::from_lines(&old_text, &new_text);

    let mut out = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => ' ',
        };
        out.push(sign);
        out.push_str(change.value());
        if change.missing_newline() {
            out.push('\n');
        }
    }
    out
}

fn pretty(schema: &Schema) -> String {
    serde_json::to_string_pretty(&schema.to_json()).unwrap_or_else(|_| schema.canonical_form())
}

/// One direction of a compatibility check: can `reader` read what `writer` wrote?
struct ReadCheck<'a> {
    writer: &'a Schema,
    reader: &'a Schema,
    /// Whether the reader side is the candidate; decides how changes are named
    reader_is_candidate: bool,
    /// Record pairs already being checked, so recursive types terminate
    visited: HashSet<(String, String)>,
    changes: Vec<SchemaChange>,
}

impl<'a> ReadCheck<'a> {
    fn run(writer: &'a Schema, reader: &'a Schema, reader_is_candidate: bool) -> Vec<SchemaChange> {
        let mut check = Self {
            writer,
            reader,
            reader_is_candidate,
            visited: HashSet::new(),
            changes: Vec::new(),
        };
        check.check_record("", writer.root(), reader.root());
        check.changes
    }

    fn push(&mut self, change_type: ChangeType, path: &str, is_breaking: bool, description: String) {
        self.changes.push(SchemaChange {
            change_type,
            path: path.to_string(),
            is_breaking,
            description,
        });
    }

    fn check_record(&mut self, path: &str, writer: &'a RecordSchema, reader: &'a RecordSchema) {
        let key = (writer.name().fullname().to_string(), reader.name().fullname().to_string());
        if !self.visited.insert(key) {
            return;
        }

        let bindings = reader.bind_writer_fields(writer);
        let mut sources: Vec<Option<&'a FieldSpec>> = vec![None; reader.fields().len()];
        for (writer_field, binding) in writer.fields().iter().zip(&bindings) {
            if let Some(position) = binding {
                sources[*position] = Some(writer_field);
            }
        }

        for (reader_field, source) in reader.fields().iter().zip(sources) {
            let field_path = join(path, reader_field.name());
            match source {
                Some(writer_field) => {
                    self.check_type(&field_path, writer_field.field_type(), reader_field.field_type());
                }
                None => {
                    let change_type = if self.reader_is_candidate {
                        ChangeType::FieldAdded
                    } else {
                        ChangeType::FieldRemoved
                    };
                    let verb = if self.reader_is_candidate { "added" } else { "removed" };
                    if reader_field.has_default() {
                        self.push(
                            change_type,
                            &field_path,
                            false,
                            format!("Field '{}' was {}; readers fill it from its default", field_path, verb),
                        );
                    } else {
                        self.push(
                            change_type,
                            &field_path,
                            true,
                            format!(
                                "Field '{}' was {} without a default; data without it cannot be read",
                                field_path, verb
                            ),
                        );
                    }
                }
            }
        }

        for (writer_field, binding) in writer.fields().iter().zip(&bindings) {
            if binding.is_some() {
                continue;
            }
            let field_path = join(path, writer_field.name());
            let (change_type, verb) = if self.reader_is_candidate {
                (ChangeType::FieldRemoved, "removed")
            } else {
                (ChangeType::FieldAdded, "added")
            };
            self.push(
                change_type,
                &field_path,
                false,
                format!("Field '{}' was {}; readers skip it", field_path, verb),
            );
        }
    }

    fn check_type(&mut self, path: &str, writer: &'a FieldType, reader: &'a FieldType) {
        let (writer, reader) = match (self.writer.resolve(writer), self.reader.resolve(reader)) {
            (Ok(w), Ok(r)) => (w, r),
            _ => {
                self.push(
                    ChangeType::TypeChanged,
                    path,
                    true,
                    format!("Field '{}' refers to an undefined named type", path),
                );
                return;
            }
        };

        match (writer, reader) {
            (FieldType::Union(union), _) => {
                for variant in union.variants() {
                    self.check_type(path, variant, reader);
                }
            }
            (_, FieldType::Union(union)) => match matching_variant(writer, self.reader, union) {
                Some(index) => self.check_type(path, writer, &union.variants()[index]),
                None => match writer.named() {
                    Some(name) => self.push(
                        ChangeType::UnionVariantRemoved,
                        path,
                        true,
                        format!(
                            "Field '{}': {} has no variant matching {} (an alias is needed for renamed types)",
                            path,
                            reader.describe(),
                            name
                        ),
                    ),
                    None => self.type_changed(path, writer, reader),
                },
            },
            (FieldType::Record(w), FieldType::Record(r)) => self.check_record(path, w, r),
            (FieldType::Fixed(w), FieldType::Fixed(r)) => {
                if w.size() != r.size() {
                    self.push(
                        ChangeType::FixedSizeChanged,
                        path,
                        true,
                        format!("Field '{}' fixed size changed from {} to {}", path, w.size(), r.size()),
                    );
                } else if !r.answers_to(w.name()) {
                    self.type_changed(path, writer, reader);
                }
            }
            (FieldType::Array(w), FieldType::Array(r)) | (FieldType::Map(w), FieldType::Map(r)) => {
                self.check_type(&join(path, "[]"), w, r)
            }
            (w, r) if discriminant(w) == discriminant(r) => {}
            (w, r) => self.type_changed(path, w, r),
        }
    }

    fn type_changed(&mut self, path: &str, writer: &FieldType, reader: &FieldType) {
        self.push(
            ChangeType::TypeChanged,
            path,
            true,
            format!(
                "Field '{}' type changed: {} cannot be read as {}",
                path,
                writer.describe(),
                reader.describe()
            ),
        );
    }
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn simple() -> Schema {
        Schema::build(json!({
            "namespace": "keyar.domain", "type": "record", "name": "generic_avro",
            "fields": [
                {"name": "name", "type": "string"},
                {"name": "value", "type": "float"}
            ]
        }))
        .unwrap()
    }

    fn with_ip(default: Option<&str>) -> Schema {
        let mut ip = json!({"name": "ip", "type": "string"});
        if let Some(d) = default {
            ip["default"] = json!(d);
        }
        Schema::build(json!({
            "namespace": "keyar.domain", "type": "record", "name": "generic_avro",
            "fields": [
                ip,
                {"name": "name", "type": "string"},
                {"name": "value", "type": "float"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_compatible_field_addition() {
        let result = CompatibilityChecker::default().check_pair(&simple(), &with_ip(Some("DEFAULT")));
        assert!(result.is_compatible);
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].change_type, ChangeType::FieldAdded);
        assert!(is_backward_compatible(&simple(), &with_ip(Some("DEFAULT"))));
    }

    #[test]
    fn test_breaking_field_addition() {
        let result = CompatibilityChecker::default().check_pair(&simple(), &with_ip(None));
        assert!(!result.is_compatible);
        assert_eq!(result.changes[0].path, "ip");
        assert!(result.changes[0].is_breaking);
        assert!(!is_backward_compatible(&simple(), &with_ip(None)));
    }

    #[test]
    fn test_field_removal_is_backward_but_not_forward_compatible() {
        // Candidate drops the required "ip" field
        let existing = with_ip(None);
        let candidate = simple();

        assert!(CompatibilityChecker::new(CompatibilityLevel::Backward)
            .check_pair(&existing, &candidate)
            .is_compatible);

        let forward = CompatibilityChecker::new(CompatibilityLevel::Forward).check_pair(&existing, &candidate);
        assert!(!forward.is_compatible);
        assert_eq!(forward.changes[0].change_type, ChangeType::FieldRemoved);
    }

    #[test]
    fn test_type_change_is_breaking() {
        let candidate = Schema::build(json!({
            "namespace": "keyar.domain", "type": "record", "name": "generic_avro",
            "fields": [
                {"name": "name", "type": "string"},
                {"name": "value", "type": "double"}
            ]
        }))
        .unwrap();
        let result = CompatibilityChecker::default().check_pair(&simple(), &candidate);
        assert!(!result.is_compatible);
        assert_eq!(result.changes[0].change_type, ChangeType::TypeChanged);
        assert_eq!(result.changes[0].path, "value");
    }

    #[test]
    fn test_none_level_accepts_anything() {
        let result = CompatibilityChecker::new(CompatibilityLevel::None).check_pair(&simple(), &with_ip(None));
        assert!(result.is_compatible);
    }

    #[test]
    fn test_transitive_checks_every_version() {
        let v1 = simple();
        let v2 = with_ip(Some("DEFAULT"));
        // v3 keeps ip but without a default: fine against v2, not against v1
        let v3 = with_ip(None);

        let latest_only = CompatibilityChecker::new(CompatibilityLevel::Backward).check(&v3, &[v1.clone(), v2.clone()]);
        assert!(latest_only.is_compatible);

        let transitive = CompatibilityChecker::new(CompatibilityLevel::BackwardTransitive).check(&v3, &[v1, v2]);
        assert!(!transitive.is_compatible);
    }

    #[test]
    fn test_renamed_union_record_needs_alias() {
        let writer = Schema::build(json!({
            "type": "record", "name": "Msg", "fields": [
                {"name": "payload", "type": [
                    {"type": "record", "name": "Email", "fields": [{"name": "text", "type": "string"}]}
                ]}
            ]
        }))
        .unwrap();
        let without_alias = Schema::build(json!({
            "type": "record", "name": "Msg", "fields": [
                {"name": "payload", "type": [
                    {"type": "record", "name": "EmailV2", "fields": [{"name": "text", "type": "string"}]}
                ]}
            ]
        }))
        .unwrap();
        let with_alias = Schema::build(json!({
            "type": "record", "name": "Msg", "fields": [
                {"name": "payload", "type": [
                    {"type": "record", "name": "EmailV2", "aliases": ["Email"], "fields": [
                        {"name": "addressFrom", "type": "string", "default": "andrzej@test.pl"},
                        {"name": "text", "type": "string"}
                    ]}
                ]}
            ]
        }))
        .unwrap();

        let result = CompatibilityChecker::default().check_pair(&writer, &without_alias);
        assert!(!result.is_compatible);
        assert_eq!(result.changes[0].change_type, ChangeType::UnionVariantRemoved);

        assert!(is_backward_compatible(&writer, &with_alias));
    }

    #[test]
    fn test_recursive_schemas_terminate() {
        let node = Schema::build(json!({
            "type": "record", "name": "Node", "fields": [
                {"name": "next", "type": ["null", "Node"], "default": null}
            ]
        }))
        .unwrap();
        assert!(CompatibilityChecker::new(CompatibilityLevel::FullTransitive)
            .check_pair(&node, &node)
            .is_compatible);
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("backward".parse::<CompatibilityLevel>().unwrap(), CompatibilityLevel::Backward);
        assert_eq!(
            "full-transitive".parse::<CompatibilityLevel>().unwrap(),
            CompatibilityLevel::FullTransitive
        );
        assert!("sideways".parse::<CompatibilityLevel>().is_err());
        assert_eq!(CompatibilityLevel::ForwardTransitive.to_string(), "FORWARD_TRANSITIVE");
    }

    #[test]
    fn test_schema_diff_marks_added_lines() {
        let diff = schema_diff(&simple(), &with_ip(Some("DEFAULT")));
        assert!(diff.lines().any(|l| l.starts_with('+') && l.contains("\"ip\"")));
        assert!(!diff.lines().any(|l| l.starts_with('-')));
        assert!(schema_diff(&simple(), &simple()).lines().all(|l| l.starts_with(' ')));
    }
}
