//! Schema Evolution
//!
//! Schema-driven binary serialization of structured records, with writer/reader schema
//! resolution so producers and consumers can evolve their schemas independently.
//!
//! ## Features
//!
//! - **Schemas**: Avro-syntax JSON definitions with records, unions, fixed, maps, arrays,
//!   namespaces, aliases and recursive references
//! - **Codec**: Compact binary encoding, decoded in the writer's layout and projected
//!   onto the reader's schema (defaults, skipped fields, union dispatch by name or alias)
//! - **Compatibility Checking**: Backward, forward and full checks, transitive or not
//! - **Registry and Transport**: Collaborator interfaces with in-memory implementations,
//!   wire framing by schema id, and sender/receiver wrappers
//! - **Containers**: Files that carry their writer schema in the header
//!
//! ## Data flow
//!
//! ```text
//! Value --encode(writer)--> bytes --frame(id)--> Transport
//! Transport --unframe--> (id, bytes) --Registry.fetch(id)--> writer
//!   --decode(writer, reader)--> Value
//! ```

pub mod checksum;
pub mod client;
pub mod codec;
pub mod compatibility;
pub mod config;
pub mod container;
pub mod error;
pub mod registry;
pub mod schema;
pub mod specific;
pub mod transport;
pub mod value;
pub mod wire;

pub use checksum::Checksum;
pub use client::{Receiver, Sender};
pub use codec::{decode, encode, encode_into, SchemaPair};
pub use compatibility::{
    can_read, is_backward_compatible, ChangeType, CompatibilityChecker, CompatibilityLevel, CompatibilityResult,
    SchemaChange,
};
pub use config::ClientConfig;
pub use container::{ContainerReader, ContainerWriter};
pub use error::{Result, SchemaError};
pub use registry::{InMemoryRegistry, Registry, RegistryError, SchemaId, SubjectNameStrategy, SubjectVersion};
pub use schema::{FieldSpec, FieldType, Name, Schema};
pub use specific::SpecificRecord;
pub use transport::{DeliveryAck, InMemoryBroker, InMemoryTransport, OffsetReset, Transport, TransportError};
pub use value::{Record, Value};
pub use wire::{frame, unframe};
