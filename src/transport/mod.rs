//! The `transport` module is the seam between the session manager and the
//! MQTT wire. The client never builds protocol packets; it drives an
//! implementation of [`Transport`] and receives inbound traffic through
//! [`TransportEvents`].
//!
//! Implementations must deliver inbound messages and connection events on a
//! thread they own, never synchronously inside a call made by the client,
//! and must not queue acknowledgements behind inbound deliveries.

pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{ClientConfig, Credentials, ProtocolVersion, TlsConfig};
use crate::message::Message;
use crate::types::{QosLevel, Time};

pub use memory::{BrokerOp, MemoryBroker, MemoryTransport};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("no reply from broker in time")]
    Timeout,

    #[error("not connected")]
    NotConnected,

    #[error("rejected by broker: {0}")]
    Rejected(String),

    #[error("i/o failure: {0}")]
    Io(String),
}

/// Everything a transport needs to open a session with one server.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub uri: String,
    pub client_id: String,
    pub protocol_version: ProtocolVersion,
    pub keep_alive: Time,
    pub clean_session: bool,
    pub connect_timeout: Time,
    /// Highest number of QoS 1 and 2 messages in flight.
    pub max_inflight: u32,
    pub credentials: Option<Credentials>,
    pub tls: Option<TlsConfig>,
}

impl ConnectRequest {
    pub(crate) fn new(config: &ClientConfig, uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            client_id: config.id.clone(),
            protocol_version: config.protocol_version,
            keep_alive: config.keep_alive_period,
            clean_session: config.clean_session,
            connect_timeout: config.connect_timeout,
            max_inflight: config.max_unack_messages,
            credentials: config.credentials.clone(),
            tls: config.tls.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRequest {
    pub filter: String,
    pub qos: QosLevel,
}

/// A message handed to the transport for publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundMessage<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub qos: QosLevel,
    pub retained: bool,
}

impl<'a> OutboundMessage<'a> {
    pub fn to_message(&self) -> Message {
        Message::new(self.topic, self.payload).with_qos(self.qos).with_retained(self.retained)
    }
}

impl<'a> From<&'a Message> for OutboundMessage<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            topic: &message.topic,
            payload: &message.payload,
            qos: message.qos,
            retained: message.retained,
        }
    }
}

/// Operations the client drives. A `None` timeout waits indefinitely.
pub trait Transport: Send + Sync {
    /// Opens a session with `request.uri` within `request.connect_timeout`.
    fn connect(
        &self,
        request: &ConnectRequest,
        events: Arc<dyn TransportEvents>,
    ) -> Result<(), TransportError>;

    fn disconnect(&self, timeout: Option<Duration>) -> Result<(), TransportError>;

    /// Subscribes to every filter and returns the granted QoS per filter,
    /// `None` where the broker rejected it.
    fn subscribe(
        &self,
        filters: &[FilterRequest],
        timeout: Option<Duration>,
    ) -> Result<Vec<Option<QosLevel>>, TransportError>;

    fn unsubscribe(&self, filters: &[String], timeout: Option<Duration>) -> Result<(), TransportError>;

    /// Publishes a message. QoS 1 and 2 return once the broker acknowledged.
    fn publish(&self, message: &OutboundMessage<'_>, timeout: Option<Duration>) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

/// Callbacks a transport invokes from its own delivery thread.
pub trait TransportEvents: Send + Sync {
    fn on_message(&self, message: Message);

    fn on_connection_lost(&self, cause: &str);
}

#[cfg(test)]
mod tests;
