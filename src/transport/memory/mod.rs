//! In-process transport.
//!
//! [`MemoryTransport`] implements [`Transport`] against a shared
//! [`MemoryBroker`]. No wire protocol is involved: requests are applied to
//! the broker's routing table directly, and inbound traffic reaches the
//! client through a channel drained by a dedicated delivery thread, as with
//! a networked transport.

mod broker;
mod topic;

use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::sync::{Mutex, Worker};
use crate::transport::{
    ConnectRequest, FilterRequest, OutboundMessage, Transport, TransportError, TransportEvents,
};
use crate::types::QosLevel;

pub use broker::{BrokerOp, MemoryBroker};
pub use topic::SessionId;

use broker::Delivery;

struct Link {
    client_id: String,
    uri: String,
    generation: u64,
    // detached when the link is dropped
    _delivery: Worker<()>,
}

pub struct MemoryTransport {
    broker: MemoryBroker,
    link: Mutex<Option<Link>>,
}

impl MemoryTransport {
    pub fn new(broker: &MemoryBroker) -> Self {
        Self {
            broker: broker.clone(),
            link: Mutex::new("memory-transport", None),
        }
    }

    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }

    /// Runs `f` on the live link, or fails with `NotConnected`.
    fn with_link<R>(
        &self,
        timeout: Option<Duration>,
        f: impl FnOnce(&Link) -> Result<R, TransportError>,
    ) -> Result<R, TransportError> {
        let link = self.link.acquire();
        let link = link.as_ref().ok_or(TransportError::NotConnected)?;
        if !self.broker.is_live(&link.client_id, link.generation) {
            return Err(TransportError::NotConnected);
        }
        if self.broker.is_unresponsive(&link.uri) {
            return Err(no_reply(timeout));
        }
        f(link)
    }
}

/// Waits out a finite timeout before reporting it.
fn no_reply(timeout: Option<Duration>) -> TransportError {
    if let Some(timeout) = timeout {
        std::thread::sleep(timeout);
    }
    TransportError::Timeout
}

impl Transport for MemoryTransport {
    fn connect(
        &self,
        request: &ConnectRequest,
        events: Arc<dyn TransportEvents>,
    ) -> Result<(), TransportError> {
        let mut link = self.link.acquire();
        if let Some(current) = link.as_ref() {
            if self.broker.is_live(&current.client_id, current.generation) {
                return Err(TransportError::Io("already connected".into()));
            }
        }

        if self.broker.is_unresponsive(&request.uri) {
            warn!(uri = %request.uri, "no CONNACK");
            return Err(no_reply(request.connect_timeout.to_duration()));
        }

        let (tx, rx) = mpsc::channel::<Delivery>();
        let generation = self
            .broker
            .open_session(&request.client_id, &request.uri, request.clean_session, tx)
            .ok_or_else(|| TransportError::ConnectionRefused(request.uri.clone()))?;

        let delivery = Worker::spawn(format!("delivery-{}", request.client_id), move || {
            for delivery in rx {
                match delivery {
                    Delivery::Message(message) => events.on_message(message),
                    Delivery::ConnectionLost(cause) => {
                        events.on_connection_lost(&cause);
                        break;
                    }
                }
            }
        })
        .map_err(|e| {
            self.broker.close_session(&request.client_id, generation);
            TransportError::Io(e.to_string())
        })?;

        debug!(client_id = %request.client_id, uri = %request.uri, "connected");
        *link = Some(Link {
            client_id: request.client_id.clone(),
            uri: request.uri.clone(),
            generation,
            _delivery: delivery,
        });
        Ok(())
    }

    fn disconnect(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        let mut link = self.link.acquire();
        let current = link.take().ok_or(TransportError::NotConnected)?;
        if self.broker.is_unresponsive(&current.uri) {
            // the session stays open on the broker side
            return Err(no_reply(timeout));
        }
        if self.broker.close_session(&current.client_id, current.generation) {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }

    fn subscribe(
        &self,
        filters: &[FilterRequest],
        timeout: Option<Duration>,
    ) -> Result<Vec<Option<QosLevel>>, TransportError> {
        self.with_link(timeout, |link| Ok(self.broker.subscribe(&link.client_id, filters)))
    }

    fn unsubscribe(&self, filters: &[String], timeout: Option<Duration>) -> Result<(), TransportError> {
        self.with_link(timeout, |link| {
            self.broker.unsubscribe(&link.client_id, filters);
            Ok(())
        })
    }

    fn publish(&self, message: &OutboundMessage<'_>, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.with_link(timeout, |link| {
            self.broker.publish(&link.client_id, message.to_message());
            if message.qos.is_acknowledged() && self.broker.acks_stalled() {
                return Err(no_reply(timeout));
            }
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        let link = self.link.acquire();
        link.as_ref()
            .is_some_and(|l| self.broker.is_live(&l.client_id, l.generation))
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        if let Some(link) = self.link.acquire().take() {
            self.broker.close_session(&link.client_id, link.generation);
        }
    }
}

#[cfg(test)]
mod tests;
