//! Conversion between [`Message`] and the structured [`Sample`] document.
//!
//! Layout of a sample:
//!
//! ```json
//! {
//!   "info": { "topic": "a/b", "qos_level": 1, "retained": false,
//!             "timestamp": { "sec": 1, "nanosec": 0 }, "content_type": "text/plain" },
//!   "payload": { "data": [104, 105] }
//! }
//! ```
//!
//! `info` is optional. A sample without it decodes to an empty topic at QoS 0,
//! not retained. Topic, payload, QoS and retained flag survive a round trip
//! unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{Message, MessageMetadata};
use crate::types::{QosLevel, Time};
use crate::utils::error::{Error, Result};

/// A structured message sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample(Value);

/// Publication settings carried by a sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub topic: String,
    #[serde(default)]
    pub qos_level: QosLevel,
    #[serde(default)]
    pub retained: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Time>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct SampleRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<MessageInfo>,
    #[serde(default)]
    payload: PayloadRepr,
}

#[derive(Default, Serialize, Deserialize)]
struct PayloadRepr {
    #[serde(default)]
    data: Vec<u8>,
}

impl Sample {
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// A sample carrying only a payload, to be written with a publication's
    /// own settings.
    pub fn from_payload(payload: impl Into<Vec<u8>>) -> Self {
        let data: Vec<Value> = payload.into().into_iter().map(Value::from).collect();
        let mut body = serde_json::Map::new();
        body.insert("data".to_string(), Value::Array(data));
        let mut root = serde_json::Map::new();
        root.insert("payload".to_string(), Value::Object(body));
        Self(Value::Object(root))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// The sample's publication settings, if it carries any.
    pub fn info(&self) -> Result<Option<MessageInfo>> {
        Ok(self.decode()?.info)
    }

    pub fn payload(&self) -> Result<Vec<u8>> {
        Ok(self.decode()?.payload.data)
    }

    fn decode(&self) -> Result<SampleRepr> {
        SampleRepr::deserialize(&self.0).map_err(|e| Error::Codec(e.to_string()))
    }
}

pub fn to_sample(message: &Message) -> Result<Sample> {
    let metadata = message.metadata.clone().unwrap_or_default();
    let repr = SampleRepr {
        info: Some(MessageInfo {
            topic: message.topic.clone(),
            qos_level: message.qos,
            retained: message.retained,
            timestamp: metadata.timestamp,
            content_type: metadata.content_type,
        }),
        payload: PayloadRepr {
            data: message.payload.clone(),
        },
    };
    serde_json::to_value(repr)
        .map(Sample)
        .map_err(|e| Error::Codec(e.to_string()))
}

pub fn from_sample(sample: &Sample) -> Result<Message> {
    let repr = sample.decode()?;
    let payload = repr.payload.data;
    let Some(info) = repr.info else {
        return Ok(Message {
            payload,
            ..Default::default()
        });
    };

    let metadata = MessageMetadata {
        timestamp: info.timestamp,
        content_type: info.content_type,
    };
    Ok(Message {
        topic: info.topic,
        payload,
        qos: info.qos_level,
        retained: info.retained,
        metadata: (!metadata.is_empty()).then_some(metadata),
    })
}
