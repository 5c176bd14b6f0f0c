//! Schema registry collaborator
//!
//! Producers register the schema they write with under a subject and embed the returned
//! id in every payload; consumers fetch the writer schema back by that id. Registration
//! runs the compatibility check against the versions already under the subject.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::checksum::Checksum;
use crate::compatibility::{CompatibilityChecker, CompatibilityLevel};
use crate::config::RegistryConfig;
use crate::schema::Schema;

/// Registry-assigned schema id, shared by every subject the schema is registered under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(pub u32);

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One registered version of a subject
#[derive(Debug, Clone, Serialize)]
pub struct SubjectVersion {
    pub subject: String,
    /// Starts at 1 for the first schema registered under the subject
    pub version: u32,
    pub id: SchemaId,
    pub schema: Schema,
    pub registered_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Schema for subject '{subject}' is incompatible: {}", messages.join("; "))]
    Incompatible { subject: String, messages: Vec<String> },

    #[error("Schema {0} not found")]
    SchemaNotFound(SchemaId),

    #[error("Subject '{0}' not found")]
    SubjectNotFound(String),

    #[error("Registry unreachable: {0}")]
    Unreachable(String),
}

/// Schema registry client interface
pub trait Registry: Send + Sync {
    /// Register a schema under a subject, returning its id.
    ///
    /// Registering a schema already present under the subject returns the existing id.
    fn register(&self, subject: &str, schema: &Schema) -> Result<SchemaId, RegistryError>;

    /// Fetch a schema by id
    fn fetch(&self, id: SchemaId) -> Result<Schema, RegistryError>;

    /// Id of `schema` if it is already registered under `subject`
    fn lookup(&self, subject: &str, schema: &Schema) -> Result<Option<SchemaId>, RegistryError>;

    /// Latest version registered under `subject`
    fn latest(&self, subject: &str) -> Result<Option<SubjectVersion>, RegistryError>;
}

/// How a topic and record schema map to a registry subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectNameStrategy {
    /// `<topic>-value`
    #[default]
    TopicName,
    /// The record's full name
    RecordName,
    /// `<topic>-<record full name>`
    TopicRecordName,
}

impl SubjectNameStrategy {
    pub fn subject(&self, topic: &str, schema: &Schema) -> String {
        match self {
            SubjectNameStrategy::TopicName => format!("{}-value", topic),
            SubjectNameStrategy::RecordName => schema.name().fullname().to_string(),
            SubjectNameStrategy::TopicRecordName => format!("{}-{}", topic, schema.name().fullname()),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    next_id: u32,
    schemas: BTreeMap<SchemaId, Schema>,
    /// Fingerprint -> id, so one schema gets one id across subjects
    fingerprints: HashMap<Checksum, SchemaId>,
    subjects: BTreeMap<String, Vec<SubjectVersion>>,
    levels: HashMap<String, CompatibilityLevel>,
}

/// In-process registry for tests, demos and single-process pipelines
pub struct InMemoryRegistry {
    default_level: CompatibilityLevel,
    state: RwLock<RegistryState>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::with_compatibility(CompatibilityLevel::default())
    }

    /// Registry whose subjects default to `level`
    pub fn with_compatibility(level: CompatibilityLevel) -> Self {
        Self {
            default_level: level,
            state: RwLock::new(RegistryState {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Registry using the configured default level
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::with_compatibility(config.compatibility)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RegistryState>, RegistryError> {
        self.state
            .read()
            .map_err(|_| RegistryError::Unreachable("registry lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryState>, RegistryError> {
        self.state
            .write()
            .map_err(|_| RegistryError::Unreachable("registry lock poisoned".to_string()))
    }

    /// Override the compatibility level of one subject
    pub fn set_compatibility(&self, subject: &str, level: CompatibilityLevel) -> Result<(), RegistryError> {
        self.write()?.levels.insert(subject.to_string(), level);
        info!(subject, level = %level, "Set subject compatibility");
        Ok(())
    }

    /// Compatibility level in force for a subject
    pub fn compatibility(&self, subject: &str) -> Result<CompatibilityLevel, RegistryError> {
        Ok(self.read()?.levels.get(subject).copied().unwrap_or(self.default_level))
    }

    /// All versions of a subject, oldest first
    pub fn versions(&self, subject: &str) -> Result<Vec<SubjectVersion>, RegistryError> {
        self.read()?
            .subjects
            .get(subject)
            .cloned()
            .ok_or_else(|| RegistryError::SubjectNotFound(subject.to_string()))
    }

    pub fn subjects(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.read()?.subjects.keys().cloned().collect())
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry for InMemoryRegistry {
    fn register(&self, subject: &str, schema: &Schema) -> Result<SchemaId, RegistryError> {
        let fingerprint = schema.fingerprint();
        let mut state = self.write()?;

        let existing: Vec<Schema> = match state.subjects.get(subject) {
            Some(versions) => {
                if let Some(found) = versions.iter().find(|v| v.schema.fingerprint() == fingerprint) {
                    debug!(subject, id = %found.id, "Schema already registered");
                    return Ok(found.id);
                }
                versions.iter().map(|v| v.schema.clone()).collect()
            }
            None => Vec::new(),
        };

        let level = state.levels.get(subject).copied().unwrap_or(self.default_level);
        let result = CompatibilityChecker::new(level).check(schema, &existing);
        if !result.is_compatible {
            let messages = result.messages();
            warn!(subject, level = %level, ?messages, "Rejected incompatible schema");
            return Err(RegistryError::Incompatible {
                subject: subject.to_string(),
                messages,
            });
        }

        let known = state.fingerprints.get(&fingerprint).copied();
        let id = match known {
            Some(id) => id,
            None => {
                let id = SchemaId(state.next_id);
                state.next_id += 1;
                state.schemas.insert(id, schema.clone());
                state.fingerprints.insert(fingerprint, id);
                id
            }
        };

        let versions = state.subjects.entry(subject.to_string()).or_default();
        let version = versions.len() as u32 + 1;
        versions.push(SubjectVersion {
            subject: subject.to_string(),
            version,
            id,
            schema: schema.clone(),
            registered_at: Utc::now(),
        });

        info!(subject, version, id = %id, schema = %schema.name(), "Registered schema version");
        Ok(id)
    }

    fn fetch(&self, id: SchemaId) -> Result<Schema, RegistryError> {
        self.read()?
            .schemas
            .get(&id)
            .cloned()
            .ok_or(RegistryError::SchemaNotFound(id))
    }

    fn lookup(&self, subject: &str, schema: &Schema) -> Result<Option<SchemaId>, RegistryError> {
        let fingerprint = schema.fingerprint();
        Ok(self.read()?.subjects.get(subject).and_then(|versions| {
            versions
                .iter()
                .find(|v| v.schema.fingerprint() == fingerprint)
                .map(|v| v.id)
        }))
    }

    fn latest(&self, subject: &str) -> Result<Option<SubjectVersion>, RegistryError> {
        Ok(self
            .read()?
            .subjects
            .get(subject)
            .and_then(|versions| versions.last().cloned()))
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

    fn with_ip(default: bool) -> Schema {
        let mut ip = json!({"name": "ip", "type": "string"});
        if default {
            ip["default"] = json!("DEFAULT");
        }
        Schema::build(json!({
            "namespace": "keyar.domain", "type": "record", "name": "generic_avro",
            "fields": [ip, {"name": "name", "type": "string"}, {"name": "value", "type": "float"}]
        }))
        .unwrap()
    }

    #[test]
    fn test_register_and_fetch() {
        let registry = InMemoryRegistry::new();
        let id = registry.register("metrics-value", &simple()).unwrap();
        assert_eq!(id, SchemaId(1));
        assert_eq!(registry.fetch(id).unwrap(), simple());

        let latest = registry.latest("metrics-value").unwrap().unwrap();
        assert_eq!(latest.version, 1);
        assert_eq!(latest.id, id);
    }

    #[test]
    fn test_reregistering_returns_existing_id() {
        let registry = InMemoryRegistry::new();
        let first = registry.register("a-value", &simple()).unwrap();
        let again = registry.register("a-value", &simple()).unwrap();
        assert_eq!(first, again);
        assert_eq!(registry.versions("a-value").unwrap().len(), 1);

        // Same schema under another subject keeps its global id
        let other = registry.register("b-value", &simple()).unwrap();
        assert_eq!(first, other);
        assert_eq!(registry.lookup("b-value", &simple()).unwrap(), Some(first));
    }

    #[test]
    fn test_incompatible_registration_rejected() {
        let registry = InMemoryRegistry::new();
        registry.register("metrics-value", &simple()).unwrap();

        match registry.register("metrics-value", &with_ip(false)) {
            Err(RegistryError::Incompatible { subject, messages }) => {
                assert_eq!(subject, "metrics-value");
                assert!(messages[0].contains("ip"));
            }
            other => panic!("Expected Incompatible, got {:?}", other),
        }

        let id = registry.register("metrics-value", &with_ip(true)).unwrap();
        assert_eq!(id, SchemaId(2));
        assert_eq!(registry.latest("metrics-value").unwrap().unwrap().version, 2);
    }

    #[test]
    fn test_subject_compatibility_override() {
        let registry = InMemoryRegistry::new();
        registry.register("free-value", &simple()).unwrap();
        registry.set_compatibility("free-value", CompatibilityLevel::None).unwrap();
        assert!(registry.register("free-value", &with_ip(false)).is_ok());
        assert_eq!(registry.compatibility("other").unwrap(), CompatibilityLevel::Backward);
    }

    #[test]
    fn test_configured_level_applies_to_new_subjects() {
        let config = RegistryConfig {
            compatibility: CompatibilityLevel::Forward,
            ..RegistryConfig::default()
        };
        let registry = InMemoryRegistry::from_config(&config);
        assert_eq!(registry.compatibility("any").unwrap(), CompatibilityLevel::Forward);

        // Forward: old readers must read the candidate, so a required addition is fine
        // and dropping a required field is not
        registry.register("f-value", &simple()).unwrap();
        assert!(registry.register("f-value", &with_ip(false)).is_ok());
        let without_name = Schema::build(json!({
            "namespace": "keyar.domain", "type": "record", "name": "generic_avro",
            "fields": [{"name": "ip", "type": "string"}, {"name": "value", "type": "float"}]
        }))
        .unwrap();
        assert!(matches!(
            registry.register("f-value", &without_name),
            Err(RegistryError::Incompatible { .. })
        ));
    }

    #[test]
    fn test_missing_lookups() {
        let registry = InMemoryRegistry::new();
        assert!(matches!(registry.fetch(SchemaId(9)), Err(RegistryError::SchemaNotFound(SchemaId(9)))));
        assert!(registry.latest("nope").unwrap().is_none());
        assert!(matches!(registry.versions("nope"), Err(RegistryError::SubjectNotFound(_))));
        assert_eq!(registry.lookup("nope", &simple()).unwrap(), None);
    }

    #[test]
    fn test_subject_name_strategies() {
        let schema = simple();
        assert_eq!(SubjectNameStrategy::TopicName.subject("metrics", &schema), "metrics-value");
        assert_eq!(SubjectNameStrategy::RecordName.subject("metrics", &schema), "keyar.domain.generic_avro");
        assert_eq!(
            SubjectNameStrategy::TopicRecordName.subject("metrics", &schema),
            "metrics-keyar.domain.generic_avro"
        );
    }
}
