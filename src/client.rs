//! Producer and consumer wrappers
//!
//! A [`Sender`] encodes records, registers the writer schema and ships framed payloads.
//! A [`Receiver`] polls once, fetches each payload's writer schema by id and decodes it
//! against the reader schema of its choice. Callers needing continuous consumption loop
//! over [`Receiver::receive`] themselves.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::checksum::Checksum;
use crate::codec::{encode, SchemaPair};
use crate::config::ClientConfig;
use crate::error::{Result, SchemaError};
use crate::registry::{Registry, RegistryError, SchemaId, SubjectNameStrategy};
use crate::schema::Schema;
use crate::specific::SpecificRecord;
use crate::transport::{DeliveryAck, Transport};
use crate::value::Value;
use crate::wire::{frame, unframe};

pub struct Sender {
    topic: String,
    transport: Arc<dyn Transport>,
    registry: Arc<dyn Registry>,
    strategy: SubjectNameStrategy,
    auto_register: bool,
    /// Schema fingerprint -> registered id
    ids: Mutex<HashMap<Checksum, SchemaId>>,
}

impl Sender {
    pub fn new(
        topic: impl Into<String>,
        transport: Arc<dyn Transport>,
        registry: Arc<dyn Registry>,
        config: &ClientConfig,
    ) -> Self {
        let topic = topic.into();
        info!(topic = %topic, strategy = ?config.registry.subject_strategy, "Created sender");
        Self {
            topic,
            transport,
            registry,
            strategy: config.registry.subject_strategy,
            auto_register: config.registry.auto_register,
            ids: Mutex::new(HashMap::new()),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Encode `value` with `schema` and send it.
    ///
    /// The value is encoded before the schema is registered, so bad data never creates a
    /// schema version.
    pub fn send(&self, schema: &Schema, value: &Value) -> Result<DeliveryAck> {
        let body = encode(schema, value)?;
        let id = self.schema_id(schema)?;

        match self.transport.send(&self.topic, frame(id, &body)) {
            Ok(ack) => {
                debug!(topic = %ack.topic, offset = ack.offset, schema_id = %id, "Sent record");
                Ok(ack)
            }
            Err(e) => {
                warn!(topic = %self.topic, error = %e, "Couldn't send record");
                Err(e.into())
            }
        }
    }

    /// Send a typed record with its own schema
    pub fn send_record<T: SpecificRecord>(&self, record: &T) -> Result<DeliveryAck> {
        self.send(&T::schema(), &record.to_value())
    }

    fn schema_id(&self, schema: &Schema) -> Result<SchemaId> {
        let fingerprint = schema.fingerprint();
        if let Some(id) = self.cached_id(&fingerprint)? {
            return Ok(id);
        }

        let subject = self.strategy.subject(&self.topic, schema);
        let id = if self.auto_register {
            self.registry.register(&subject, schema)
        } else {
            self.registry
                .lookup(&subject, schema)?
                .ok_or_else(|| RegistryError::SubjectNotFound(subject.clone()))
        };
        let id = id.inspect_err(|e| warn!(subject = %subject, error = %e, "Schema registration failed"))?;

        self.ids
            .lock()
            .map_err(|_| SchemaError::from(RegistryError::Unreachable("schema id cache poisoned".to_string())))?
            .insert(fingerprint, id);
        Ok(id)
    }

    fn cached_id(&self, fingerprint: &Checksum) -> Result<Option<SchemaId>> {
        let ids = self
            .ids
            .lock()
            .map_err(|_| SchemaError::from(RegistryError::Unreachable("schema id cache poisoned".to_string())))?;
        Ok(ids.get(fingerprint).copied())
    }
}

pub struct Receiver {
    topic: String,
    transport: Arc<dyn Transport>,
    registry: Arc<dyn Registry>,
    reader: Option<Schema>,
    poll_timeout: Duration,
    /// Writer schemas fetched so far
    writers: Mutex<HashMap<SchemaId, Schema>>,
}

impl Receiver {
    pub fn new(
        topic: impl Into<String>,
        transport: Arc<dyn Transport>,
        registry: Arc<dyn Registry>,
        config: &ClientConfig,
    ) -> Self {
        let topic = topic.into();
        info!(topic = %topic, "Created receiver");
        Self {
            topic,
            transport,
            registry,
            reader: None,
            poll_timeout: config.consumer.poll_timeout(),
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Decode every payload into this schema instead of its writer schema
    pub fn with_reader_schema(mut self, reader: Schema) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Poll once and decode whatever arrived
    pub fn receive(&self) -> Result<Vec<Value>> {
        let reader = self.reader.clone();
        self.receive_with(reader.as_ref())
    }

    /// Poll once and decode into `T`
    pub fn receive_records<T: SpecificRecord>(&self) -> Result<Vec<T>> {
        let reader = T::schema();
        self.receive_with(Some(&reader))?
            .into_iter()
            .map(T::from_value)
            .collect()
    }

    fn receive_with(&self, reader: Option<&Schema>) -> Result<Vec<Value>> {
        let payloads = self.transport.receive_batch(&self.topic, self.poll_timeout)?;
        let mut values = Vec::with_capacity(payloads.len());
        for payload in &payloads {
            let (id, body) = unframe(payload)?;
            let writer = self.writer_schema(id)?;
            let reader = reader.unwrap_or(&writer);
            values.push(SchemaPair::new(&writer, reader).decode(body)?);
        }
        if !values.is_empty() {
            debug!(topic = %self.topic, count = values.len(), "Received records");
        }
        Ok(values)
    }

    fn writer_schema(&self, id: SchemaId) -> Result<Schema> {
        let mut writers = self
            .writers
            .lock()
            .map_err(|_| SchemaError::from(RegistryError::Unreachable("writer schema cache poisoned".to_string())))?;
        if let Some(schema) = writers.get(&id) {
            return Ok(schema.clone());
        }
        let schema = self.registry.fetch(id)?;
        writers.insert(id, schema.clone());
        Ok(schema)
    }
}
