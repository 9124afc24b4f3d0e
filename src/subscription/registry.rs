use std::sync::Arc;

use tracing::warn;

use crate::config::SubscriptionConfig;
use crate::message::Message;
use crate::subscription::queue::MessageQueue;
use crate::subscription::{DataAvailableListener, topic};
use crate::types::QosLevel;

pub type SubscriptionId = u64;

pub(crate) struct SubscriptionEntry {
    pub(crate) id: SubscriptionId,
    pub(crate) filters: Vec<String>,
    pub(crate) requested_qos: QosLevel,
    /// Granted QoS, one per filter.
    pub(crate) granted: Vec<QosLevel>,
    pub(crate) queue: MessageQueue,
    pub(crate) listener: Option<Arc<dyn DataAvailableListener>>,
}

impl SubscriptionEntry {
    /// Lowest QoS the broker granted across the filters.
    pub(crate) fn qos(&self) -> QosLevel {
        self.granted.iter().copied().min().unwrap_or(QosLevel::Zero)
    }

    pub(crate) fn matches(&self, topic_name: &str) -> bool {
        self.filters.iter().any(|f| topic::matches(f, topic_name))
    }
}

/// The subscriptions owned by one client, in creation order.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    entries: Vec<SubscriptionEntry>,
    next_id: SubscriptionId,
}

impl SubscriptionRegistry {
    pub(crate) fn insert(&mut self, config: &SubscriptionConfig, granted: Vec<QosLevel>) -> SubscriptionId {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.push(SubscriptionEntry {
            id,
            filters: config.topic_filters.clone(),
            requested_qos: config.max_qos,
            granted,
            queue: MessageQueue::new(config.message_queue_size),
            listener: None,
        });
        id
    }

    pub(crate) fn get(&self, id: SubscriptionId) -> Option<&SubscriptionEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: SubscriptionId) -> Option<&mut SubscriptionEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> Option<SubscriptionEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &SubscriptionEntry> {
        self.entries.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut SubscriptionEntry> {
        self.entries.iter_mut()
    }

    pub(crate) fn ids(&self) -> Vec<SubscriptionId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Enqueues `message` into every matching subscription and returns the
    /// subscriptions to notify, with their listener if one is set.
    pub(crate) fn deliver(
        &mut self,
        message: &Message,
    ) -> Vec<(SubscriptionId, Option<Arc<dyn DataAvailableListener>>)> {
        let mut notified = Vec::new();
        for entry in self.entries.iter_mut().filter(|e| e.matches(&message.topic)) {
            if let Some(dropped) = entry.queue.push(message.clone()) {
                warn!(
                    subscription = entry.id,
                    topic = %dropped.topic,
                    total_dropped = entry.queue.dropped(),
                    "queue full, dropped oldest message"
                );
            }
            notified.push((entry.id, entry.listener.clone()));
        }
        notified
    }
}
