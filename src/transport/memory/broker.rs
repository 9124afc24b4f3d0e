use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::mpsc::Sender;

use tracing::{debug, trace};

use crate::message::Message;
use crate::subscription::topic;
use crate::sync::Mutex;
use crate::transport::FilterRequest;
use crate::transport::memory::topic::{SessionId, Topic};
use crate::types::{QosLevel, Time};

/// A request as the broker saw it, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerOp {
    Connect { client_id: String, uri: String },
    Disconnect { client_id: String },
    /// `granted` is `None` when the filter was rejected.
    Subscribe {
        client_id: String,
        filter: String,
        granted: Option<QosLevel>,
    },
    Unsubscribe { client_id: String, filter: String },
    Publish {
        client_id: String,
        topic: String,
        payload: Vec<u8>,
        qos: QosLevel,
    },
}

pub(crate) enum Delivery {
    Message(Message),
    ConnectionLost(String),
}

struct Session {
    generation: u64,
    uri: String,
    clean: bool,
    outbox: Sender<Delivery>,
}

struct BrokerState {
    topics: HashMap<String, Topic>,
    sessions: HashMap<SessionId, Session>,
    retained: HashMap<String, Message>,
    journal: Vec<BrokerOp>,
    next_generation: u64,
    unreachable: HashSet<String>,
    unresponsive: HashSet<String>,
    rejected_filters: HashSet<String>,
    max_granted_qos: QosLevel,
    stall_acks: bool,
}

/// An in-process routing table standing in for an MQTT broker.
///
/// Clones share the same state. Every [`MemoryTransport`] created from it
/// routes through it. Besides routing it keeps a journal of the requests it
/// received and lets callers inject failures: unreachable or unresponsive
/// server URIs, rejected filters, capped QoS grants, lost acknowledgements
/// and severed sessions.
///
/// [`MemoryTransport`]: super::MemoryTransport
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(
                "memory-broker",
                BrokerState {
                    topics: HashMap::new(),
                    sessions: HashMap::new(),
                    retained: HashMap::new(),
                    journal: Vec::new(),
                    next_generation: 0,
                    unreachable: HashSet::new(),
                    unresponsive: HashSet::new(),
                    rejected_filters: HashSet::new(),
                    max_granted_qos: QosLevel::Two,
                    stall_acks: false,
                },
            )),
        }
    }

    /// Connections to `uri` are refused.
    pub fn set_unreachable(&self, uri: &str, unreachable: bool) {
        let mut state = self.state.acquire();
        if unreachable {
            state.unreachable.insert(uri.to_string());
        } else {
            state.unreachable.remove(uri);
        }
    }

    /// Requests sent to `uri` never get a reply.
    pub fn set_unresponsive(&self, uri: &str, unresponsive: bool) {
        let mut state = self.state.acquire();
        if unresponsive {
            state.unresponsive.insert(uri.to_string());
        } else {
            state.unresponsive.remove(uri);
        }
    }

    /// Grants at most `qos` to any subscription.
    pub fn set_max_granted_qos(&self, qos: QosLevel) {
        self.state.acquire().max_granted_qos = qos;
    }

    pub fn reject_filter(&self, filter: &str) {
        self.state.acquire().rejected_filters.insert(filter.to_string());
    }

    /// Publishes at QoS 1 and 2 are routed but never acknowledged.
    pub fn set_stall_acks(&self, stall: bool) {
        self.state.acquire().stall_acks = stall;
    }

    /// Drops the session of `client_id` as if the network went away.
    /// Returns whether a session was open.
    pub fn sever(&self, client_id: &str) -> bool {
        let mut state = self.state.acquire();
        match state.sessions.remove(client_id) {
            Some(session) => {
                debug!(client_id, uri = %session.uri, "session severed");
                let _ = session.outbox.send(Delivery::ConnectionLost("connection reset by broker".into()));
                true
            }
            None => false,
        }
    }

    /// Routes a message published by some other party.
    pub fn inject(&self, message: Message) {
        let mut state = self.state.acquire();
        state.route(message);
    }

    pub fn journal(&self) -> Vec<BrokerOp> {
        self.state.acquire().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.state.acquire().journal.clear();
    }

    /// The QoS granted to `client_id` on `filter`, if subscribed.
    pub fn granted(&self, client_id: &str, filter: &str) -> Option<QosLevel> {
        let state = self.state.acquire();
        state
            .topics
            .get(filter)
            .and_then(|t| t.subscribers.get(client_id).copied())
    }

    pub fn subscription_count(&self, client_id: &str) -> usize {
        let state = self.state.acquire();
        state
            .topics
            .values()
            .filter(|t| t.subscribers.contains_key(client_id))
            .count()
    }

    pub fn is_session_open(&self, client_id: &str) -> bool {
        self.state.acquire().sessions.contains_key(client_id)
    }

    pub fn retained(&self, topic_name: &str) -> Option<Message> {
        self.state.acquire().retained.get(topic_name).cloned()
    }

    pub(crate) fn is_unresponsive(&self, uri: &str) -> bool {
        self.state.acquire().unresponsive.contains(uri)
    }

    pub(crate) fn acks_stalled(&self) -> bool {
        self.state.acquire().stall_acks
    }

    pub(crate) fn is_live(&self, client_id: &str, generation: u64) -> bool {
        let state = self.state.acquire();
        state
            .sessions
            .get(client_id)
            .is_some_and(|s| s.generation == generation)
    }

    /// Opens a session, taking over any existing one with the same id.
    /// Returns the session generation, or `None` if `uri` is unreachable.
    pub(crate) fn open_session(
        &self,
        client_id: &str,
        uri: &str,
        clean: bool,
        outbox: Sender<Delivery>,
    ) -> Option<u64> {
        let mut state = self.state.acquire();
        if state.unreachable.contains(uri) {
            return None;
        }
        if let Some(previous) = state.sessions.remove(client_id) {
            let _ = previous.outbox.send(Delivery::ConnectionLost("session taken over".into()));
        }
        if clean {
            state.drop_subscriptions(client_id);
        }
        state.next_generation += 1;
        let generation = state.next_generation;
        state.sessions.insert(
            client_id.to_string(),
            Session {
                generation,
                uri: uri.to_string(),
                clean,
                outbox,
            },
        );
        state.journal.push(BrokerOp::Connect {
            client_id: client_id.to_string(),
            uri: uri.to_string(),
        });
        debug!(client_id, uri, generation, "session opened");
        Some(generation)
    }

    /// Closes the session if it is still the one identified by `generation`.
    pub(crate) fn close_session(&self, client_id: &str, generation: u64) -> bool {
        let mut state = self.state.acquire();
        let live = state
            .sessions
            .get(client_id)
            .is_some_and(|s| s.generation == generation);
        if !live {
            return false;
        }
        if let Some(session) = state.sessions.remove(client_id) {
            if session.clean {
                state.drop_subscriptions(client_id);
            }
        }
        state.journal.push(BrokerOp::Disconnect {
            client_id: client_id.to_string(),
        });
        debug!(client_id, "session closed");
        true
    }

    pub(crate) fn subscribe(&self, client_id: &str, filters: &[FilterRequest]) -> Vec<Option<QosLevel>> {
        let mut state = self.state.acquire();
        let max_granted = state.max_granted_qos;
        let mut grants = Vec::with_capacity(filters.len());

        for request in filters {
            let granted = if state.rejected_filters.contains(&request.filter) {
                None
            } else {
                Some(request.qos.min(max_granted))
            };
            if let Some(qos) = granted {
                state
                    .topics
                    .entry(request.filter.clone())
                    .or_insert_with(|| Topic::new(&request.filter))
                    .subscribe(client_id.to_string(), qos);
                state.replay_retained(client_id, &request.filter, qos);
            }
            state.journal.push(BrokerOp::Subscribe {
                client_id: client_id.to_string(),
                filter: request.filter.clone(),
                granted,
            });
            grants.push(granted);
        }
        grants
    }

    pub(crate) fn unsubscribe(&self, client_id: &str, filters: &[String]) {
        let mut state = self.state.acquire();
        for filter in filters {
            let emptied = match state.topics.get_mut(filter) {
                Some(t) => t.unsubscribe(client_id) && t.is_empty(),
                None => false,
            };
            if emptied {
                state.topics.remove(filter);
            }
            state.journal.push(BrokerOp::Unsubscribe {
                client_id: client_id.to_string(),
                filter: filter.clone(),
            });
        }
    }

    pub(crate) fn publish(&self, client_id: &str, message: Message) {
        let mut state = self.state.acquire();
        state.journal.push(BrokerOp::Publish {
            client_id: client_id.to_string(),
            topic: message.topic.clone(),
            payload: message.payload.clone(),
            qos: message.qos,
        });
        state.route(message);
    }
}

impl BrokerState {
    fn drop_subscriptions(&mut self, client_id: &str) {
        self.topics.retain(|_, t| {
            t.unsubscribe(client_id);
            !t.is_empty()
        });
    }

    fn replay_retained(&self, client_id: &str, filter: &str, granted: QosLevel) {
        let Some(session) = self.sessions.get(client_id) else {
            return;
        };
        for message in self.retained.values().filter(|m| topic::matches(filter, &m.topic)) {
            let qos = message.qos.min(granted);
            let _ = session.outbox.send(Delivery::Message(message.clone().with_qos(qos)));
        }
    }

    /// Delivers `message` once to every session with a matching filter, at
    /// the lower of the published QoS and the best grant of that session.
    fn route(&mut self, message: Message) {
        let message = message.stamped(Time::now());
        if message.retained {
            if message.payload.is_empty() {
                self.retained.remove(&message.topic);
            } else {
                self.retained.insert(message.topic.clone(), message.clone());
            }
        }

        let mut targets: HashMap<&str, QosLevel> = HashMap::new();
        for t in self.topics.values().filter(|t| topic::matches(&t.filter, &message.topic)) {
            for (id, granted) in &t.subscribers {
                let best = targets.entry(id.as_str()).or_insert(*granted);
                *best = (*best).max(*granted);
            }
        }

        for (id, granted) in targets {
            if let Some(session) = self.sessions.get(id) {
                trace!(client_id = id, topic = %message.topic, "routing");
                let delivered = message.clone().with_qos(message.qos.min(granted)).with_retained(false);
                let _ = session.outbox.send(Delivery::Message(delivered));
            }
        }
    }
}
