use std::collections::HashMap;

use crate::types::QosLevel;

pub type SessionId = String;

/// A subscribed topic filter and the sessions subscribed to it, with the QoS
/// granted to each.
#[derive(Debug, Default)]
pub(crate) struct Topic {
    pub filter: String,
    pub subscribers: HashMap<SessionId, QosLevel>,
}

impl Topic {
    pub fn new(filter: &str) -> Self {
        Self {
            filter: filter.to_string(),
            subscribers: HashMap::new(),
        }
    }

    /// Adds or upgrades a subscriber.
    pub fn subscribe(&mut self, id: SessionId, qos: QosLevel) {
        self.subscribers.insert(id, qos);
    }

    pub fn unsubscribe(&mut self, id: &str) -> bool {
        self.subscribers.remove(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
