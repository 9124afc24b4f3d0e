use serde::{Deserialize, Serialize};

use crate::subscription::topic;
use crate::types::{QosLevel, Time};
use crate::utils::error::{Error, Result};

/// Configuration of a [`Subscription`](crate::Subscription).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    pub topic_filters: Vec<String>,
    /// Highest QoS requested. The broker may grant less.
    pub max_qos: QosLevel,
    /// Queue capacity; `0` means unbounded.
    pub message_queue_size: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            topic_filters: Vec::new(),
            max_qos: QosLevel::Two,
            message_queue_size: 0,
        }
    }
}

impl SubscriptionConfig {
    pub fn new<I, S>(topic_filters: I, max_qos: QosLevel) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topic_filters: topic_filters.into_iter().map(Into::into).collect(),
            max_qos,
            ..Default::default()
        }
    }

    pub fn with_queue_size(mut self, size: usize) -> Self {
        self.message_queue_size = size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.topic_filters.is_empty() {
            return Err(Error::Configuration("subscription needs at least one topic filter".into()));
        }
        for filter in &self.topic_filters {
            topic::validate_filter(filter)?;
        }
        Ok(())
    }
}

/// Configuration of a [`Publication`](crate::Publication).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicationConfig {
    pub topic: String,
    pub qos: QosLevel,
    pub retained: bool,
    /// Take topic, QoS and retained flag from each written sample instead.
    pub use_message_info: bool,
    /// Bound on the acknowledgement wait of QoS 1 and 2 writes.
    pub max_wait_time: Time,
}

impl Default for PublicationConfig {
    fn default() -> Self {
        Self {
            topic: String::new(),
            qos: QosLevel::Zero,
            retained: false,
            use_message_info: false,
            max_wait_time: Time::from_secs(10),
        }
    }
}

impl PublicationConfig {
    pub fn new(topic: impl Into<String>, qos: QosLevel) -> Self {
        Self {
            topic: topic.into(),
            qos,
            ..Default::default()
        }
    }

    pub fn with_retained(mut self, retained: bool) -> Self {
        self.retained = retained;
        self
    }

    pub fn with_message_info(mut self) -> Self {
        self.use_message_info = true;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.use_message_info && self.topic.is_empty() {
            return Ok(());
        }
        topic::validate_topic_name(&self.topic)
    }
}

/// Settings for a single raw write, independent of any publication config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteParams {
    pub qos_level: QosLevel,
    pub retained: bool,
}

impl WriteParams {
    pub fn new(qos_level: QosLevel, retained: bool) -> Self {
        Self { qos_level, retained }
    }
}
