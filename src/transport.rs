//! Transport collaborator
//!
//! Moves opaque payloads to and from topics. The codec never calls a transport itself;
//! [`crate::client::Sender`] and [`crate::client::Receiver`] wire the two together.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport unreachable: {0}")]
    Unreachable(String),

    #[error("Topic '{topic}' rejected the payload: {reason}")]
    Rejected { topic: String, reason: String },
}

/// Broker acknowledgment of one delivered payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryAck {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
}

/// Message transport interface
pub trait Transport: Send + Sync {
    /// Send one payload, returning once the broker has acknowledged it
    fn send(&self, topic: &str, payload: Vec<u8>) -> Result<DeliveryAck, TransportError>;

    /// One polling round: payloads that arrived since the last round, oldest first.
    ///
    /// Waits at most `max_wait` for something to arrive and returns an empty batch if
    /// nothing did.
    fn receive_batch(&self, topic: &str, max_wait: Duration) -> Result<Vec<Vec<u8>>, TransportError>;
}

/// Where a new consumer starts reading a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    /// From the first payload ever written
    #[default]
    Earliest,
    /// Only payloads written after the first poll
    Latest,
}

#[derive(Default)]
struct BrokerShared {
    topics: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    appended: Condvar,
}

/// In-process broker of append-only, single-partition topic logs
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    shared: Arc<BrokerShared>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport handle acting as its own consumer group
    pub fn transport(&self, reset: OffsetReset, max_batch: usize) -> InMemoryTransport {
        InMemoryTransport {
            shared: Arc::clone(&self.shared),
            reset,
            max_batch: max_batch.max(1),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Number of payloads written to a topic
    pub fn topic_len(&self, topic: &str) -> Result<usize, TransportError> {
        Ok(lock(&self.shared.topics)?.get(topic).map_or(0, Vec::len))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, TransportError> {
    mutex.lock().map_err(poisoned)
}

fn poisoned<T>(_: PoisonError<T>) -> TransportError {
    TransportError::Unreachable("broker lock poisoned".to_string())
}

/// Producer and consumer handle onto an [`InMemoryBroker`]
pub struct InMemoryTransport {
    shared: Arc<BrokerShared>,
    reset: OffsetReset,
    max_batch: usize,
    /// Next offset to read, per topic
    cursors: Mutex<HashMap<String, usize>>,
}

impl Transport for InMemoryTransport {
    fn send(&self, topic: &str, payload: Vec<u8>) -> Result<DeliveryAck, TransportError> {
        if topic.is_empty() {
            return Err(TransportError::Rejected {
                topic: String::new(),
                reason: "empty topic name".to_string(),
            });
        }

        let offset = {
            let mut topics = lock(&self.shared.topics)?;
            let log = topics.entry(topic.to_string()).or_default();
            log.push(payload);
            (log.len() - 1) as u64
        };
        self.shared.appended.notify_all();

        trace!(topic, offset, "Appended payload");
        Ok(DeliveryAck {
            topic: topic.to_string(),
            partition: 0,
            offset,
        })
    }

    fn receive_batch(&self, topic: &str, max_wait: Duration) -> Result<Vec<Vec<u8>>, TransportError> {
        // A wait too long to represent as an instant has no deadline
        let deadline = Instant::now().checked_add(max_wait);
        let mut topics = lock(&self.shared.topics)?;

        loop {
            {
                // Held only while reading and advancing, never across the wait
                let mut cursors = lock(&self.cursors)?;
                let cursor = *cursors.entry(topic.to_string()).or_insert_with(|| match self.reset {
                    OffsetReset::Earliest => 0,
                    OffsetReset::Latest => topics.get(topic).map_or(0, Vec::len),
                });

                let available = topics.get(topic).map_or(0, Vec::len);
                if available > cursor {
                    let end = available.min(cursor + self.max_batch);
                    let batch = topics
                        .get(topic)
                        .map(|log| log[cursor..end].to_vec())
                        .unwrap_or_default();
                    cursors.insert(topic.to_string(), end);
                    debug!(topic, from = cursor, count = batch.len(), "Polled batch");
                    return Ok(batch);
                }
            }

            topics = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(Vec::new());
                    }
                    self.shared
                        .appended
                        .wait_timeout(topics, deadline - now)
                        .map_err(poisoned)?
                        .0
                }
                None => self.shared.appended.wait(topics).map_err(poisoned)?,
            };
        }
    }
}
