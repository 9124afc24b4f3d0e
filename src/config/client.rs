use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::persistence::PersistenceStore;
use crate::types::Time;
use crate::utils::error::{Error, Result};

const PLAIN_SCHEMES: &[&str] = &["tcp", "mqtt", "ws"];
const SECURE_SCHEMES: &[&str] = &["ssl", "mqtts", "wss"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVersion {
    /// Let the transport pick (3.1.1, falling back to 3.1).
    #[default]
    Default,
    V3_1,
    V3_1_1,
    V5,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceLevel {
    #[default]
    None,
    /// Unacknowledged outgoing messages are kept in the configured store.
    Durable,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// TLS material handed to the transport for `ssl://`, `mqtts://` and `wss://`
/// brokers. Paths are opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub ca: Option<String>,
    pub identity: Option<String>,
    pub private_key: Option<String>,
    pub private_key_password: Option<String>,
    pub cipher_suites: Option<String>,
    pub verify_server_certificate: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            ca: None,
            identity: None,
            private_key: None,
            private_key_password: None,
            cipher_suites: None,
            verify_server_certificate: true,
        }
    }
}

/// Configuration of a [`Client`](crate::Client).
///
/// The client takes a private copy when it is created; later changes to the
/// caller's value have no effect on it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// MQTT client identifier. Replaced by `client-<uuid>` when empty.
    pub id: String,
    pub protocol_version: ProtocolVersion,
    /// Brokers, tried in order.
    pub server_uris: Vec<String>,
    /// Bound on each connection attempt.
    pub connect_timeout: Time,
    pub max_connection_retries: u32,
    pub keep_alive_period: Time,
    pub clean_session: bool,
    /// Remove broker-side subscriptions before disconnecting.
    pub unsubscribe_on_disconnect: bool,
    /// Bound on SUBSCRIBE, UNSUBSCRIBE and DISCONNECT replies.
    pub max_reply_timeout: Time,
    /// Reconnect automatically when the connection is lost.
    pub reconnect: bool,
    pub max_unack_messages: u32,
    pub persistence_level: PersistenceLevel,
    pub persistence_storage: Option<Arc<dyn PersistenceStore>>,
    pub credentials: Option<Credentials>,
    pub tls: Option<TlsConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            protocol_version: ProtocolVersion::Default,
            server_uris: Vec::new(),
            connect_timeout: Time::from_secs(10),
            max_connection_retries: 10,
            keep_alive_period: Time::from_secs(10),
            clean_session: false,
            unsubscribe_on_disconnect: true,
            max_reply_timeout: Time::from_secs(3),
            reconnect: true,
            max_unack_messages: 10,
            persistence_level: PersistenceLevel::None,
            persistence_storage: None,
            credentials: None,
            tls: None,
        }
    }
}

impl ClientConfig {
    pub fn new(id: impl Into<String>, server_uris: Vec<String>) -> Self {
        Self {
            id: id.into(),
            server_uris,
            ..Default::default()
        }
    }

    /// Checks the configuration without touching the network.
    pub fn validate(&self) -> Result<()> {
        if self.server_uris.is_empty() {
            return Err(Error::Configuration("no server URI configured".into()));
        }
        for uri in &self.server_uris {
            self.validate_uri(uri)?;
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::Configuration("connect_timeout must be non-zero".into()));
        }
        if self.max_reply_timeout.is_zero() {
            return Err(Error::Configuration("max_reply_timeout must be non-zero".into()));
        }
        if self.reconnect && self.keep_alive_period.is_zero() {
            return Err(Error::Configuration(
                "reconnect requires a non-zero keep_alive_period".into(),
            ));
        }
        if self.max_unack_messages == 0 {
            return Err(Error::Configuration("max_unack_messages must be at least 1".into()));
        }
        if self.persistence_level == PersistenceLevel::Durable && self.persistence_storage.is_none() {
            return Err(Error::Configuration(
                "durable persistence requires a persistence store".into(),
            ));
        }
        if let Some(credentials) = &self.credentials {
            if credentials.username.is_empty() {
                return Err(Error::Configuration("credentials need a username".into()));
            }
        }
        Ok(())
    }

    fn validate_uri(&self, uri: &str) -> Result<()> {
        let parsed = Url::parse(uri)
            .map_err(|e| Error::Configuration(format!("invalid server URI '{uri}': {e}")))?;
        let scheme = parsed.scheme();
        if SECURE_SCHEMES.contains(&scheme) {
            if self.tls.is_none() {
                return Err(Error::Configuration(format!(
                    "server URI '{uri}' requires a TLS configuration"
                )));
            }
        } else if !PLAIN_SCHEMES.contains(&scheme) {
            return Err(Error::Configuration(format!(
                "unsupported scheme '{scheme}' in server URI '{uri}'"
            )));
        }
        match parsed.host_str() {
            Some(host) if !host.is_empty() => Ok(()),
            _ => Err(Error::Configuration(format!("server URI '{uri}' has no host"))),
        }
    }

    /// Validates and fills in the generated client id.
    pub(crate) fn resolve(mut self) -> Result<Self> {
        self.validate()?;
        if self.id.is_empty() {
            self.id = format!("client-{}", Uuid::new_v4());
        }
        Ok(self)
    }

    pub(crate) fn is_durable(&self) -> bool {
        self.persistence_level == PersistenceLevel::Durable && self.persistence_storage.is_some()
    }
}
