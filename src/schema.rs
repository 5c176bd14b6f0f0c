//! Schema types and construction
//!
//! A [`Schema`] is an immutable tree of record fields. It is built once from a JSON
//! definition (Avro schema syntax), validated, and never mutated afterwards: evolving a
//! schema means building a new one.
//!
//! ```
//! use schema_evolution::Schema;
//!
//! let schema = Schema::build(serde_json::json!({
//!     "type": "record",
//!     "name": "generic_avro",
//!     "namespace": "keyar.domain",
//!     "fields": [
//!         {"name": "name", "type": "string"},
//!         {"name": "value", "type": "float"}
//!     ]
//! })).unwrap();
//!
//! assert_eq!(schema.name().fullname(), "keyar.domain.generic_avro");
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map as JsonMap};

use crate::checksum::Checksum;
use crate::error::{Result, SchemaError};
use crate::value::{Record, Value};

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid name pattern"))
}

fn validate_identifier(identifier: &str, what: &str) -> Result<()> {
    if name_pattern().is_match(identifier) {
        Ok(())
    } else {
        Err(SchemaError::invalid(format!("invalid {} '{}'", what, identifier)))
    }
}

/// Name of a record or fixed type, optionally namespaced
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    name: String,
    namespace: Option<String>,
    fullname: String,
}

impl Name {
    /// Create a name; a `name` containing dots is treated as fully qualified
    pub fn new(name: &str, namespace: Option<&str>) -> Result<Self> {
        let (namespace, name) = match name.rsplit_once('.') {
            Some((ns, simple)) => (Some(ns), simple),
            None => (namespace.filter(|ns| !ns.is_empty()), name),
        };

        validate_identifier(name, "name")?;
        if let Some(ns) = namespace {
            for part in ns.split('.') {
                validate_identifier(part, "namespace")?;
            }
        }

        let fullname = match namespace {
            Some(ns) => format!("{}.{}", ns, name),
            None => name.to_string(),
        };

        Ok(Self {
            name: name.to_string(),
            namespace: namespace.map(String::from),
            fullname,
        })
    }

    /// Unqualified name
    pub fn simple(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn fullname(&self) -> &str {
        &self.fullname
    }

    /// Whether a record name given by a caller or another schema refers to this name.
    ///
    /// Both the qualified and the unqualified form are accepted.
    pub fn matches(&self, other: &str) -> bool {
        self.fullname == other || self.name == other
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fullname)
    }
}

/// A `fixed(N)` type: exactly `size` raw bytes
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSchema {
    name: Name,
    aliases: Vec<Name>,
    size: usize,
}

impl FixedSchema {
    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn aliases(&self) -> &[Name] {
        &self.aliases
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether a writer-side name refers to this type, directly or through an alias
    pub fn answers_to(&self, writer_name: &Name) -> bool {
        answers_to(&self.name, &self.aliases, writer_name)
    }
}

/// A single field of a record
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: String,
    field_type: FieldType,
    default: Option<Value>,
    aliases: Vec<String>,
    doc: Option<String>,
}

impl FieldSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

/// A record: an ordered list of uniquely named fields
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    name: Name,
    aliases: Vec<Name>,
    doc: Option<String>,
    fields: Vec<FieldSpec>,
    index: BTreeMap<String, usize>,
}

impl RecordSchema {
    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn aliases(&self) -> &[Name] {
        &self.aliases
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// For each field of `writer`, in writer order, the position of the field of this
    /// (reader) record that reads it.
    ///
    /// Exact names bind first. An alias only binds a reader field that no writer field
    /// claimed by name, and no reader field is bound twice.
    pub fn bind_writer_fields(&self, writer: &RecordSchema) -> Vec<Option<usize>> {
        let mut claimed = vec![false; self.fields.len()];
        let mut bindings = Vec::with_capacity(writer.fields.len());
        for writer_field in &writer.fields {
            let position = self.index.get(writer_field.name()).copied();
            if let Some(position) = position {
                claimed[position] = true;
            }
            bindings.push(position);
        }

        for (binding, writer_field) in bindings.iter_mut().zip(&writer.fields) {
            if binding.is_some() {
                continue;
            }
            let by_alias = self
                .fields
                .iter()
                .enumerate()
                .position(|(i, f)| !claimed[i] && f.aliases.iter().any(|a| a == writer_field.name()));
            if let Some(position) = by_alias {
                claimed[position] = true;
                *binding = Some(position);
            }
        }
        bindings
    }

    /// Whether a writer-side name refers to this record, directly or through an alias
    pub fn answers_to(&self, writer_name: &Name) -> bool {
        answers_to(&self.name, &self.aliases, writer_name)
    }
}

fn answers_to(name: &Name, aliases: &[Name], writer_name: &Name) -> bool {
    name.fullname() == writer_name.fullname()
        || name.simple() == writer_name.simple()
        || aliases
            .iter()
            .any(|a| a.fullname() == writer_name.fullname() || a.simple() == writer_name.simple())
}

/// Ordered union variants, each with a distinct discriminant
#[derive(Debug, Clone, PartialEq)]
pub struct UnionSchema {
    variants: Vec<FieldType>,
}

impl UnionSchema {
    pub fn variants(&self) -> &[FieldType] {
        &self.variants
    }

    pub fn variant(&self, index: usize) -> Option<&FieldType> {
        self.variants.get(index)
    }

    pub fn is_nullable(&self) -> bool {
        self.variants.iter().any(|v| matches!(v, FieldType::Null))
    }
}

/// The type of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Null,
    Boolean,
    /// int32
    Int,
    /// int64
    Long,
    /// float32
    Float,
    /// float64
    Double,
    String,
    Bytes,
    Fixed(Arc<FixedSchema>),
    Record(Arc<RecordSchema>),
    Map(Box<FieldType>),
    Array(Box<FieldType>),
    Union(UnionSchema),
    /// Reference to a named type defined elsewhere in the same schema
    Ref(Name),
}

impl FieldType {
    /// `union(null, inner)`
    pub fn nullable(inner: FieldType) -> FieldType {
        FieldType::Union(UnionSchema {
            variants: vec![FieldType::Null, inner],
        })
    }

    fn primitive(name: &str) -> Option<FieldType> {
        Some(match name {
            "null" => FieldType::Null,
            "boolean" => FieldType::Boolean,
            "int" => FieldType::Int,
            "long" => FieldType::Long,
            "float" => FieldType::Float,
            "double" => FieldType::Double,
            "string" => FieldType::String,
            "bytes" => FieldType::Bytes,
            _ => return None,
        })
    }

    /// Name of a named type (record, fixed or a reference to one)
    pub fn named(&self) -> Option<&Name> {
        match self {
            FieldType::Fixed(f) => Some(&f.name),
            FieldType::Record(r) => Some(&r.name),
            FieldType::Ref(name) => Some(name),
            _ => None,
        }
    }

    /// Discriminant used to keep union variants distinguishable
    fn variant_key(&self) -> String {
        match self.named() {
            Some(name) => name.fullname().to_string(),
            None => self.describe(),
        }
    }

    /// Human-readable type description for error messages
    pub fn describe(&self) -> String {
        match self {
            FieldType::Null => "null".to_string(),
            FieldType::Boolean => "boolean".to_string(),
            FieldType::Int => "int".to_string(),
            FieldType::Long => "long".to_string(),
            FieldType::Float => "float".to_string(),
            FieldType::Double => "double".to_string(),
            FieldType::String => "string".to_string(),
            FieldType::Bytes => "bytes".to_string(),
            FieldType::Fixed(f) => format!("fixed {}({})", f.name, f.size),
            FieldType::Record(r) => format!("record {}", r.name),
            FieldType::Map(_) => "map".to_string(),
            FieldType::Array(_) => "array".to_string(),
            FieldType::Union(u) => {
                let variants: Vec<String> = u.variants.iter().map(FieldType::describe).collect();
                format!("union[{}]", variants.join(", "))
            }
            FieldType::Ref(name) => name.fullname().to_string(),
        }
    }
}

#[derive(Debug, PartialEq)]
struct SchemaInner {
    root: Arc<RecordSchema>,
    names: BTreeMap<String, FieldType>,
}

/// An immutable, validated record schema
///
/// Cloning is cheap; clones share the same tree and may be used from many threads at once.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

impl Schema {
    /// Build a schema from a fully specified JSON definition
    pub fn build(definition: serde_json::Value) -> Result<Self> {
        let mut parser = Parser::default();
        let root = match parser.parse_type(&definition, None)? {
            FieldType::Record(record) => record,
            other => {
                return Err(SchemaError::invalid(format!(
                    "top-level type must be a record, found {}",
                    other.describe()
                )))
            }
        };

        Ok(Self {
            inner: Arc::new(SchemaInner {
                root,
                names: parser.names,
            }),
        })
    }

    /// Parse a schema from its JSON text
    pub fn parse_str(text: &str) -> Result<Self> {
        let definition: serde_json::Value = serde_json::from_str(text)?;
        Self::build(definition)
    }

    pub fn root(&self) -> &RecordSchema {
        &self.inner.root
    }

    pub fn name(&self) -> &Name {
        &self.inner.root.name
    }

    /// Follow a named reference to its definition; other types resolve to themselves
    pub fn resolve<'a>(&'a self, field_type: &'a FieldType) -> Result<&'a FieldType> {
        match field_type {
            FieldType::Ref(name) => self.inner.names.get(name.fullname()).ok_or_else(|| {
                SchemaError::invalid(format!("unknown named type '{}'", name))
            }),
            other => Ok(other),
        }
    }

    /// Look up a named type by full name
    pub fn named_type(&self, fullname: &str) -> Option<&FieldType> {
        self.inner.names.get(fullname)
    }

    /// Canonical JSON definition; [`Schema::build`] accepts it back
    pub fn to_json(&self) -> serde_json::Value {
        let mut emitted = HashSet::new();
        record_to_json(&self.inner.root, &mut emitted)
    }

    /// Compact canonical text form (object keys sorted)
    pub fn canonical_form(&self) -> String {
        self.to_json().to_string()
    }

    /// SHA256 fingerprint of the canonical form
    pub fn fingerprint(&self) -> Checksum {
        Checksum::from_str(&self.canonical_form())
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_form())
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let definition = serde_json::Value::deserialize(deserializer)?;
        Schema::build(definition).map_err(serde::de::Error::custom)
    }
}

#[derive(Default)]
struct Parser {
    names: BTreeMap<String, FieldType>,
    /// Records whose fields are being parsed; they may refer to themselves
    defining: Vec<String>,
}

impl Parser {
    fn parse_type(&mut self, json: &serde_json::Value, namespace: Option<&str>) -> Result<FieldType> {
        match json {
            serde_json::Value::String(type_name) => self.parse_reference(type_name, namespace),
            serde_json::Value::Array(variants) => self.parse_union(variants, namespace),
            serde_json::Value::Object(object) => {
                let type_name = object
                    .get("type")
                    .ok_or_else(|| SchemaError::invalid("type definition without 'type'"))?;
                match type_name.as_str() {
                    Some("record") | Some("error") => self.parse_record(object, namespace),
                    Some("fixed") => self.parse_fixed(object, namespace),
                    Some("map") => {
                        let values = object
                            .get("values")
                            .ok_or_else(|| SchemaError::invalid("map without 'values'"))?;
                        Ok(FieldType::Map(Box::new(self.parse_type(values, namespace)?)))
                    }
                    Some("array") => {
                        let items = object
                            .get("items")
                            .ok_or_else(|| SchemaError::invalid("array without 'items'"))?;
                        Ok(FieldType::Array(Box::new(self.parse_type(items, namespace)?)))
                    }
                    Some(other) => self.parse_reference(other, namespace),
                    None => self.parse_type(type_name, namespace),
                }
            }
            other => Err(SchemaError::invalid(format!("unsupported type definition {}", other))),
        }
    }

    fn parse_reference(&self, type_name: &str, namespace: Option<&str>) -> Result<FieldType> {
        if let Some(primitive) = FieldType::primitive(type_name) {
            return Ok(primitive);
        }

        let qualified = Name::new(type_name, namespace)?;
        if self.is_known(qualified.fullname()) {
            return Ok(FieldType::Ref(qualified));
        }
        // Unqualified references may also point at a type in the null namespace
        if !type_name.contains('.') && namespace.is_some() {
            let bare = Name::new(type_name, None)?;
            if self.is_known(bare.fullname()) {
                return Ok(FieldType::Ref(bare));
            }
        }

        Err(SchemaError::invalid(format!("unknown type '{}'", type_name)))
    }

    fn is_known(&self, fullname: &str) -> bool {
        self.names.contains_key(fullname) || self.defining.iter().any(|n| n == fullname)
    }

    fn parse_union(&mut self, json: &[serde_json::Value], namespace: Option<&str>) -> Result<FieldType> {
        if json.is_empty() {
            return Err(SchemaError::invalid("union must have at least one variant"));
        }

        let mut variants = Vec::with_capacity(json.len());
        let mut keys = HashSet::new();
        for definition in json {
            let variant = self.parse_type(definition, namespace)?;
            if matches!(variant, FieldType::Union(_)) {
                return Err(SchemaError::invalid("unions may not directly contain unions"));
            }
            let key = variant.variant_key();
            if !keys.insert(key.clone()) {
                return Err(SchemaError::invalid(format!("duplicate union variant '{}'", key)));
            }
            variants.push(variant);
        }

        Ok(FieldType::Union(UnionSchema { variants }))
    }

    fn declared_name(
        &self,
        object: &JsonMap<String, serde_json::Value>,
        namespace: Option<&str>,
    ) -> Result<(Name, Vec<Name>)> {
        let raw = object
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| SchemaError::invalid("named type without a string 'name'"))?;
        let explicit_ns = object.get("namespace").and_then(|n| n.as_str());
        let name = Name::new(raw, explicit_ns.or(namespace))?;

        if self.is_known(name.fullname()) {
            return Err(SchemaError::invalid(format!("named type '{}' is defined twice", name)));
        }

        let aliases = match object.get("aliases") {
            None => Vec::new(),
            Some(serde_json::Value::Array(aliases)) => aliases
                .iter()
                .map(|a| {
                    a.as_str()
                        .ok_or_else(|| SchemaError::invalid(format!("alias of '{}' must be a string", name)))
                        .and_then(|a| Name::new(a, name.namespace()))
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(SchemaError::invalid(format!("aliases of '{}' must be an array", name))),
        };

        Ok((name, aliases))
    }

    fn parse_fixed(
        &mut self,
        object: &JsonMap<String, serde_json::Value>,
        namespace: Option<&str>,
    ) -> Result<FieldType> {
        let (name, aliases) = self.declared_name(object, namespace)?;
        let size = match object.get("size") {
            Some(size) => size.as_i64().ok_or_else(|| {
                SchemaError::invalid(format!("fixed '{}' size must be an integer", name))
            })?,
            None => return Err(SchemaError::invalid(format!("fixed '{}' without 'size'", name))),
        };
        if size <= 0 {
            return Err(SchemaError::invalid(format!(
                "fixed '{}' must have a positive size, got {}",
                name, size
            )));
        }

        let fixed = FieldType::Fixed(Arc::new(FixedSchema {
            name: name.clone(),
            aliases,
            size: size as usize,
        }));
        self.names.insert(name.fullname().to_string(), fixed.clone());
        Ok(fixed)
    }

    fn parse_record(
        &mut self,
        object: &JsonMap<String, serde_json::Value>,
        namespace: Option<&str>,
    ) -> Result<FieldType> {
        let (name, aliases) = self.declared_name(object, namespace)?;
        let doc = object.get("doc").and_then(|d| d.as_str()).map(String::from);
        let field_definitions = object
            .get("fields")
            .and_then(|f| f.as_array())
            .ok_or_else(|| SchemaError::invalid(format!("record '{}' without a 'fields' array", name)))?;

        self.defining.push(name.fullname().to_string());
        let fields = self.parse_fields(&name, field_definitions);
        self.defining.pop();
        let fields = fields?;

        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        let record = FieldType::Record(Arc::new(RecordSchema {
            name: name.clone(),
            aliases,
            doc,
            fields,
            index,
        }));
        self.names.insert(name.fullname().to_string(), record.clone());
        Ok(record)
    }

    fn parse_fields(&mut self, record: &Name, definitions: &[serde_json::Value]) -> Result<Vec<FieldSpec>> {
        let mut fields: Vec<FieldSpec> = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let object = definition
                .as_object()
                .ok_or_else(|| SchemaError::invalid(format!("field of '{}' must be an object", record)))?;
            let name = object
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or_else(|| SchemaError::invalid(format!("field of '{}' without a string 'name'", record)))?;
            validate_identifier(name, "field name")?;
            if fields.iter().any(|f| f.name == name) {
                return Err(SchemaError::invalid(format!(
                    "field '{}' repeats in record '{}'",
                    name, record
                )));
            }

            let type_definition = object
                .get("type")
                .ok_or_else(|| SchemaError::invalid(format!("field '{}' without 'type'", name)))?;
            let field_type = self.parse_type(type_definition, record.namespace())?;

            let default = match object.get("default") {
                Some(json) => Some(self.default_value(json, &field_type).map_err(|reason| {
                    SchemaError::invalid(format!(
                        "default of field '{}' in '{}' does not match {}: {}",
                        name,
                        record,
                        field_type.describe(),
                        reason
                    ))
                })?),
                None => None,
            };

            let aliases = match object.get("aliases") {
                None => Vec::new(),
                Some(serde_json::Value::Array(aliases)) => aliases
                    .iter()
                    .map(|a| {
                        a.as_str().map(String::from).ok_or_else(|| {
                            SchemaError::invalid(format!("alias of field '{}' in '{}' must be a string", name, record))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
                Some(_) => {
                    return Err(SchemaError::invalid(format!(
                        "aliases of field '{}' in '{}' must be an array",
                        name, record
                    )))
                }
            };
            let doc = object.get("doc").and_then(|d| d.as_str()).map(String::from);

            fields.push(FieldSpec {
                name: name.to_string(),
                field_type,
                default,
                aliases,
                doc,
            });
        }
        Ok(fields)
    }

    /// Convert a JSON default literal into a value of the declared type
    fn default_value(&self, json: &serde_json::Value, field_type: &FieldType) -> std::result::Result<Value, String> {
        let mismatch = || format!("found {}", json);
        match field_type {
            FieldType::Null => json.is_null().then_some(Value::Null).ok_or_else(mismatch),
            FieldType::Boolean => json.as_bool().map(Value::Boolean).ok_or_else(mismatch),
            FieldType::Int => json
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .map(Value::Int)
                .ok_or_else(mismatch),
            FieldType::Long => json.as_i64().map(Value::Long).ok_or_else(mismatch),
            FieldType::Float => json.as_f64().map(|f| Value::Float(f as f32)).ok_or_else(mismatch),
            FieldType::Double => json.as_f64().map(Value::Double).ok_or_else(mismatch),
            FieldType::String => json.as_str().map(|s| Value::String(s.to_string())).ok_or_else(mismatch),
            FieldType::Bytes => json_bytes(json).map(Value::Bytes).ok_or_else(mismatch),
            FieldType::Fixed(fixed) => {
                let bytes = json_bytes(json).ok_or_else(mismatch)?;
                if bytes.len() != fixed.size {
                    return Err(format!("expected {} bytes, found {}", fixed.size, bytes.len()));
                }
                Ok(Value::Fixed(bytes))
            }
            FieldType::Array(items) => json
                .as_array()
                .ok_or_else(mismatch)?
                .iter()
                .map(|item| self.default_value(item, items))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::Array),
            FieldType::Map(values) => json
                .as_object()
                .ok_or_else(mismatch)?
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.default_value(v, values)?)))
                .collect::<std::result::Result<BTreeMap<_, _>, String>>()
                .map(Value::Map),
            FieldType::Record(record) => {
                let object = json.as_object().ok_or_else(mismatch)?;
                let mut value = Record::with_capacity(record.name.fullname(), record.fields.len());
                for field in &record.fields {
                    let field_value = match (object.get(&field.name), &field.default) {
                        (Some(json), _) => self.default_value(json, &field.field_type)?,
                        (None, Some(default)) => default.clone(),
                        (None, None) => return Err(format!("missing field '{}'", field.name)),
                    };
                    value.put(field.name.clone(), field_value);
                }
                Ok(Value::Record(value))
            }
            // Union defaults always describe the first variant
            FieldType::Union(union) => self.default_value(json, &union.variants[0]),
            FieldType::Ref(name) => match self.names.get(name.fullname()) {
                Some(resolved) => self.default_value(json, resolved),
                None => Err(format!("'{}' is not fully defined yet", name)),
            },
        }
    }
}

/// Bytes defaults are strings whose code points are the byte values
fn json_bytes(json: &serde_json::Value) -> Option<Vec<u8>> {
    json.as_str()?
        .chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect()
}

fn record_to_json(record: &RecordSchema, emitted: &mut HashSet<String>) -> serde_json::Value {
    if !emitted.insert(record.name.fullname().to_string()) {
        return json!(record.name.fullname());
    }

    let fields: Vec<serde_json::Value> = record
        .fields
        .iter()
        .map(|field| {
            let mut object = JsonMap::new();
            object.insert("name".into(), json!(field.name));
            object.insert("type".into(), type_to_json(&field.field_type, emitted));
            if let Some(default) = &field.default {
                object.insert("default".into(), default.to_json());
            }
            if !field.aliases.is_empty() {
                object.insert("aliases".into(), json!(field.aliases));
            }
            if let Some(doc) = &field.doc {
                object.insert("doc".into(), json!(doc));
            }
            serde_json::Value::Object(object)
        })
        .collect();

    let mut object = named_header("record", &record.name, &record.aliases);
    if let Some(doc) = &record.doc {
        object.insert("doc".into(), json!(doc));
    }
    object.insert("fields".into(), serde_json::Value::Array(fields));
    serde_json::Value::Object(object)
}

fn named_header(kind: &str, name: &Name, aliases: &[Name]) -> JsonMap<String, serde_json::Value> {
    let mut object = JsonMap::new();
    object.insert("type".into(), json!(kind));
    object.insert("name".into(), json!(name.simple()));
    if let Some(ns) = name.namespace() {
        object.insert("namespace".into(), json!(ns));
    }
    if !aliases.is_empty() {
        let aliases: Vec<&str> = aliases.iter().map(Name::fullname).collect();
        object.insert("aliases".into(), json!(aliases));
    }
    object
}

fn type_to_json(field_type: &FieldType, emitted: &mut HashSet<String>) -> serde_json::Value {
    match field_type {
        FieldType::Null => json!("null"),
        FieldType::Boolean => json!("boolean"),
        FieldType::Int => json!("int"),
        FieldType::Long => json!("long"),
        FieldType::Float => json!("float"),
        FieldType::Double => json!("double"),
        FieldType::String => json!("string"),
        FieldType::Bytes => json!("bytes"),
        FieldType::Fixed(fixed) => {
            if !emitted.insert(fixed.name.fullname().to_string()) {
                return json!(fixed.name.fullname());
            }
            let mut object = named_header("fixed", &fixed.name, &fixed.aliases);
            object.insert("size".into(), json!(fixed.size));
            serde_json::Value::Object(object)
        }
        FieldType::Record(record) => record_to_json(record, emitted),
        FieldType::Map(values) => json!({"type": "map", "values": type_to_json(values, emitted)}),
        FieldType::Array(items) => json!({"type": "array", "items": type_to_json(items, emitted)}),
        FieldType::Union(union) => serde_json::Value::Array(
            union.variants.iter().map(|v| type_to_json(v, emitted)).collect(),
        ),
        FieldType::Ref(name) => json!(name.fullname()),
    }
}
