//! MQTT messages and their conversion to and from structured samples.
//!
//! A [`Message`] is what the transport delivers and publishes. A [`Sample`] is
//! the structured representation handed to applications; [`codec`] converts
//! between the two.

pub mod codec;

use serde::{Deserialize, Serialize};

use crate::types::{QosLevel, Time};
use crate::utils::error::Result;

pub use codec::{MessageInfo, Sample, from_sample, to_sample};

/// A raw MQTT message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QosLevel,
    pub retained: bool,
    pub metadata: Option<MessageMetadata>,
}

/// Per-message metadata that is not part of the MQTT publish itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub timestamp: Option<Time>,
    pub content_type: Option<String>,
}

impl MessageMetadata {
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none() && self.content_type.is_none()
    }
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            ..Default::default()
        }
    }

    pub fn with_qos(mut self, qos: QosLevel) -> Self {
        self.qos = qos;
        self
    }

    pub fn with_retained(mut self, retained: bool) -> Self {
        self.retained = retained;
        self
    }

    /// Stamps the reception time, keeping any metadata already present.
    pub fn stamped(mut self, at: Time) -> Self {
        let metadata = self.metadata.get_or_insert_with(MessageMetadata::default);
        if metadata.timestamp.is_none() {
            metadata.timestamp = Some(at);
        }
        self
    }

    pub fn to_sample(&self) -> Result<Sample> {
        to_sample(self)
    }

    pub fn from_sample(sample: &Sample) -> Result<Self> {
        from_sample(sample)
    }
}

#[cfg(test)]
mod tests;
