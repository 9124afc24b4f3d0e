use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::client::delivery::DeliveryHandler;
use crate::client::state::ClientState;
use crate::client::supervisor::Supervisor;
use crate::config::{ClientConfig, PublicationConfig, SubscriptionConfig};
use crate::message::Message;
use crate::persistence::PersistenceStore;
use crate::publication::{Publication, PublicationRegistry};
use crate::subscription::{Subscription, SubscriptionRegistry};
use crate::sync::Mutex;
use crate::transport::{ConnectRequest, FilterRequest, Transport, TransportError, TransportEvents};
use crate::types::{QosLevel, Time};
use crate::utils::error::{Error, Result};

/// State shared between the client, its handles, the delivery handler and
/// the supervisor.
pub(crate) struct Shared {
    pub(crate) config: ClientConfig,
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) inner: Mutex<Inner>,
}

/// Everything guarded by the client mutex.
#[derive(Default)]
pub(crate) struct Inner {
    pub(crate) state: ClientState,
    pub(crate) subscriptions: SubscriptionRegistry,
    pub(crate) publications: PublicationRegistry,
    pub(crate) supervisor: Option<Supervisor>,
    pub(crate) connected_uri: Option<String>,
}

impl Inner {
    pub(crate) fn transition(&mut self, client_id: &str, next: ClientState) {
        info!(client_id, from = %self.state, to = %next, "state change");
        self.state = next;
    }

    fn require_connected(&self, operation: &'static str) -> Result<()> {
        if self.state == ClientState::Connected {
            Ok(())
        } else {
            Err(Error::State {
                operation,
                state: self.state,
            })
        }
    }
}

fn filter_requests(filters: &[String], qos: QosLevel) -> Vec<FilterRequest> {
    filters
        .iter()
        .map(|filter| FilterRequest {
            filter: filter.clone(),
            qos,
        })
        .collect()
}

impl Shared {
    fn reply_timeout(&self) -> Option<std::time::Duration> {
        self.config.max_reply_timeout.to_duration()
    }

    fn durable_store(&self, qos: QosLevel) -> Option<&Arc<dyn PersistenceStore>> {
        if self.config.is_durable() && qos.is_acknowledged() {
            self.config.persistence_storage.as_ref()
        } else {
            None
        }
    }

    /// Tries the server URIs in turn until one accepts the connection.
    ///
    /// Attempt `i` goes to `server_uris[i % len]`. At most
    /// `max_connection_retries + 1` attempts are made, each bounded by
    /// `connect_timeout`, within an overall deadline of the sum of those
    /// bounds.
    pub(crate) fn establish(self: &Arc<Self>, inner: &mut Inner) -> Result<()> {
        let attempts = self.config.max_connection_retries.saturating_add(1);
        let deadline = self
            .config
            .connect_timeout
            .saturating_mul(attempts)
            .to_duration()
            .map(|budget| Instant::now() + budget);
        let events: Arc<dyn TransportEvents> = Arc::new(DeliveryHandler::new(Arc::downgrade(self)));

        let mut last_failure = TransportError::NotConnected;
        let uris = self.config.server_uris.iter().cycle().take(attempts as usize);
        for (attempt, uri) in uris.enumerate() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(client_id = %self.config.id, attempt, "connect deadline expired");
                last_failure = TransportError::Timeout;
                break;
            }
            debug!(client_id = %self.config.id, attempt, uri = %uri, "connecting");
            let request = ConnectRequest::new(&self.config, uri);
            match self.transport.connect(&request, Arc::clone(&events)) {
                Ok(()) => {
                    info!(client_id = %self.config.id, uri = %uri, "connected");
                    inner.connected_uri = Some(uri.clone());
                    return Ok(());
                }
                Err(e) => {
                    warn!(client_id = %self.config.id, attempt, uri = %uri, error = %e, "connect attempt failed");
                    last_failure = e;
                }
            }
        }
        Err(Error::transport("connect", last_failure))
    }

    /// Re-issues every registered subscription and flushes persisted
    /// messages after a successful connect. Failures are logged only.
    pub(crate) fn restore_session(&self, inner: &mut Inner) {
        let timeout = self.reply_timeout();
        for entry in inner.subscriptions.iter_mut() {
            let requests = filter_requests(&entry.filters, entry.requested_qos);
            match self.transport.subscribe(&requests, timeout) {
                Ok(grants) => {
                    for (slot, grant) in entry.granted.iter_mut().zip(grants) {
                        match grant {
                            Some(qos) => *slot = qos,
                            None => warn!(subscription = entry.id, "filter rejected on resubscribe"),
                        }
                    }
                }
                Err(e) => warn!(subscription = entry.id, error = %e, "resubscribe failed"),
            }
        }

        if let Err(e) = self.flush_persisted() {
            warn!(client_id = %self.config.id, error = %e, "flushing persisted messages failed");
        }
    }

    /// Publishes stored messages in store order, stopping at the first
    /// failure so the remaining ones keep their order.
    fn flush_persisted(&self) -> Result<()> {
        let Some(store) = self.config.persistence_storage.as_ref().filter(|_| self.config.is_durable()) else {
            return Ok(());
        };
        let pending = store.pending()?;
        if pending.is_empty() {
            return Ok(());
        }
        info!(client_id = %self.config.id, count = pending.len(), "flushing persisted messages");
        for (key, message) in pending {
            self.transport
                .publish(&(&message).into(), self.reply_timeout())
                .map_err(|e| Error::transport("flush", e))?;
            store.remove(&key)?;
        }
        Ok(())
    }

    /// Hands one message to the transport. Must be called with the client
    /// lock held; `state` is the state observed under it.
    pub(crate) fn send(&self, state: ClientState, message: &Message, max_wait: Time) -> Result<()> {
        let store = self.durable_store(message.qos);
        if state != ClientState::Connected {
            return match store {
                Some(store) => {
                    let key = store.store(message)?;
                    debug!(client_id = %self.config.id, key = %key, "stored for later delivery");
                    Ok(())
                }
                None => Err(Error::State {
                    operation: "write",
                    state,
                }),
            };
        }

        let key = store.map(|s| s.store(message)).transpose()?;
        match self.transport.publish(&message.into(), max_wait.to_duration()) {
            Ok(()) => {
                if let (Some(store), Some(key)) = (store, key) {
                    store.remove(&key)?;
                }
                Ok(())
            }
            Err(e) => {
                warn!(client_id = %self.config.id, topic = %message.topic, error = %e, "write failed");
                Err(Error::transport("write", e))
            }
        }
    }

    /// Restores a lost connection. Returns whether the client is connected
    /// afterwards.
    pub(crate) fn reconnect(self: &Arc<Self>) -> bool {
        let mut inner = self.inner.acquire();
        if inner.state != ClientState::Connected {
            return false;
        }
        if self.transport.is_connected() {
            return true;
        }

        inner.connected_uri = None;
        inner.transition(&self.config.id, ClientState::Connecting);
        match self.establish(&mut inner) {
            Ok(()) => {
                self.restore_session(&mut inner);
                inner.transition(&self.config.id, ClientState::Connected);
                true
            }
            Err(e) => {
                error!(client_id = %self.config.id, error = %e, "reconnect failed");
                inner.transition(&self.config.id, ClientState::Disconnected);
                false
            }
        }
    }
}

/// An MQTT client session.
///
/// All operations are safe to call from any thread. Dropping the client
/// discards its subscriptions and publications without contacting the
/// broker.
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Creates a disconnected client. The configuration is validated and
    /// copied; no broker is contacted.
    pub fn new<T>(config: ClientConfig, transport: T) -> Result<Self>
    where
        T: Transport + 'static,
    {
        let config = config.resolve()?;
        info!(client_id = %config.id, servers = ?config.server_uris, "client created");
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                transport: Box::new(transport),
                inner: Mutex::new("client", Inner::default()),
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.shared.config.id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    pub fn state(&self) -> ClientState {
        self.shared.inner.acquire().state
    }

    /// The server URI of the current connection.
    pub fn connected_uri(&self) -> Option<String> {
        self.shared.inner.acquire().connected_uri.clone()
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        let ids = self.shared.inner.acquire().subscriptions.ids();
        ids.into_iter()
            .map(|id| Subscription::new(id, self.weak()))
            .collect()
    }

    pub fn publications(&self) -> Vec<Publication> {
        let ids = self.shared.inner.acquire().publications.ids();
        ids.into_iter()
            .map(|id| Publication::new(id, self.weak()))
            .collect()
    }

    fn weak(&self) -> Weak<Shared> {
        Arc::downgrade(&self.shared)
    }

    /// Connects to the first server that accepts, trying the configured
    /// URIs round-robin.
    pub fn connect(&self) -> Result<()> {
        let shared = &self.shared;
        let mut inner = shared.inner.acquire();
        if inner.state != ClientState::Disconnected {
            return Err(Error::State {
                operation: "connect",
                state: inner.state,
            });
        }
        // left behind by a failed reconnect
        let stale = inner.supervisor.take();

        inner.transition(&shared.config.id, ClientState::Connecting);
        if let Err(e) = shared.establish(&mut inner) {
            inner.transition(&shared.config.id, ClientState::Disconnected);
            drop(inner);
            if let Some(stale) = stale {
                stale.stop();
            }
            return Err(e);
        }
        shared.restore_session(&mut inner);
        inner.transition(&shared.config.id, ClientState::Connected);

        if shared.config.reconnect {
            let period = shared.config.keep_alive_period;
            match Supervisor::spawn(&shared.config.id, self.weak(), period) {
                Ok(supervisor) => inner.supervisor = Some(supervisor),
                Err(e) => warn!(client_id = %shared.config.id, error = %e, "running without reconnect supervisor"),
            }
        }
        drop(inner);

        if let Some(stale) = stale {
            stale.stop();
        }
        Ok(())
    }

    /// Ends the session. A no-op unless connected.
    ///
    /// With `unsubscribe_on_disconnect`, every subscription is removed from
    /// the broker first; failures there are logged. The client ends up
    /// disconnected even when the DISCONNECT itself fails, in which case the
    /// failure is returned.
    pub fn disconnect(&self) -> Result<()> {
        let shared = &self.shared;
        let mut inner = shared.inner.acquire();
        let supervisor = inner.supervisor.take();

        if inner.state != ClientState::Connected {
            drop(inner);
            if let Some(supervisor) = supervisor {
                supervisor.stop();
            }
            debug!(client_id = %shared.config.id, "not connected, nothing to disconnect");
            return Ok(());
        }

        let timeout = shared.reply_timeout();
        if shared.config.unsubscribe_on_disconnect {
            for entry in inner.subscriptions.iter() {
                if let Err(e) = shared.transport.unsubscribe(&entry.filters, timeout) {
                    warn!(subscription = entry.id, error = %e, "unsubscribe on disconnect failed");
                }
            }
        }

        let result = shared.transport.disconnect(timeout);
        inner.connected_uri = None;
        inner.transition(&shared.config.id, ClientState::Disconnected);
        drop(inner);

        if let Some(supervisor) = supervisor {
            supervisor.stop();
        }
        result.map_err(|e| Error::transport("disconnect", e))
    }

    /// Subscribes to the filters of `config`, at most at `config.max_qos`.
    ///
    /// If the broker rejects any filter, or answers with the wrong number of
    /// grants, the filters it may have accepted are unsubscribed again and
    /// nothing is registered.
    pub fn subscribe(&self, config: &SubscriptionConfig) -> Result<Subscription> {
        let shared = &self.shared;
        let mut inner = shared.inner.acquire();
        inner.require_connected("subscribe")?;
        config.validate()?;

        let timeout = shared.reply_timeout();
        let requests = filter_requests(&config.topic_filters, config.max_qos);
        let grants = shared
            .transport
            .subscribe(&requests, timeout)
            .map_err(|e| Error::transport("subscribe", e))?;
        let rollback = |filters: &[String]| {
            if filters.is_empty() {
                return;
            }
            if let Err(e) = shared.transport.unsubscribe(filters, timeout) {
                warn!(filters = ?filters, error = %e, "rollback of partial subscription failed");
            }
        };
        if grants.len() != requests.len() {
            // grants cannot be paired with filters; roll back every one
            let requested: Vec<String> = requests.iter().map(|r| r.filter.clone()).collect();
            rollback(requested.as_slice());
            return Err(Error::transport(
                "subscribe",
                TransportError::Io(format!("{} grants for {} filters", grants.len(), requests.len())),
            ));
        }

        let filters_where = |rejected: bool| -> Vec<String> {
            requests
                .iter()
                .zip(&grants)
                .filter(|(_, grant)| grant.is_none() == rejected)
                .map(|(request, _)| request.filter.clone())
                .collect()
        };
        let rejected = filters_where(true);
        if !rejected.is_empty() {
            rollback(filters_where(false).as_slice());
            return Err(Error::Transport {
                operation: "subscribe",
                source: TransportError::Rejected(rejected.join(", ")),
            });
        }

        let granted: Vec<QosLevel> = grants.into_iter().flatten().collect();
        if granted.iter().any(|qos| *qos < config.max_qos) {
            debug!(requested = %config.max_qos, granted = ?granted, "broker downgraded QoS");
        }
        let id = inner.subscriptions.insert(config, granted);
        info!(client_id = %shared.config.id, subscription = id, filters = ?config.topic_filters, "subscribed");
        Ok(Subscription::new(id, self.weak()))
    }

    /// Unsubscribes on the broker, then drops the subscription and its queue.
    pub fn unsubscribe(&self, subscription: &Subscription) -> Result<()> {
        let shared = &self.shared;
        let mut inner = shared.inner.acquire();
        inner.require_connected("unsubscribe")?;
        if !subscription.belongs_to(shared) {
            return Err(Error::NotOwned("subscription"));
        }
        let entry = inner
            .subscriptions
            .get(subscription.id())
            .ok_or(Error::NotOwned("subscription"))?;

        shared
            .transport
            .unsubscribe(&entry.filters, shared.reply_timeout())
            .map_err(|e| Error::transport("unsubscribe", e))?;
        inner.subscriptions.remove(subscription.id());
        info!(client_id = %shared.config.id, subscription = subscription.id(), "unsubscribed");
        Ok(())
    }

    pub fn publish(&self, config: &PublicationConfig) -> Result<Publication> {
        let mut inner = self.shared.inner.acquire();
        inner.require_connected("publish")?;
        config.validate()?;
        let id = inner.publications.insert(config.clone());
        debug!(client_id = %self.shared.config.id, publication = id, topic = %config.topic, "publication created");
        Ok(Publication::new(id, self.weak()))
    }

    pub fn unpublish(&self, publication: &Publication) -> Result<()> {
        let mut inner = self.shared.inner.acquire();
        inner.require_connected("unpublish")?;
        if !publication.belongs_to(&self.shared) {
            return Err(Error::NotOwned("publication"));
        }
        inner
            .publications
            .remove(publication.id())
            .map(|_| ())
            .ok_or(Error::NotOwned("publication"))
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let supervisor = {
            let mut inner = self.shared.inner.acquire();
            inner.subscriptions.clear();
            inner.publications.clear();
            inner.supervisor.take()
        };
        // may run on the supervisor thread itself, so never join here
        if let Some(supervisor) = supervisor {
            supervisor.signal_stop();
        }
        debug!(client_id = %self.shared.config.id, "client dropped");
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.shared.config.id)
            .field("state", &self.state())
            .finish()
    }
}
