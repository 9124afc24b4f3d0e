use serde::Deserialize;

use crate::config::client::{ClientConfig, Credentials, PersistenceLevel, ProtocolVersion, TlsConfig};
use crate::config::endpoint::{PublicationConfig, SubscriptionConfig};
use crate::types::Time;

/// Everything an application needs to bring up one client.
#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientConfig,
    pub subscriptions: Vec<SubscriptionConfig>,
    pub publications: Vec<PublicationConfig>,
    pub log_level: String,
    /// Directory of a sled store used for durable persistence.
    pub persistence_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            subscriptions: Vec::new(),
            publications: Vec::new(),
            log_level: "info".to_string(),
            persistence_path: None,
        }
    }
}

/// Settings as read from files or environment; missing values keep their
/// defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub client: Option<PartialClientConfig>,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,
    #[serde(default)]
    pub publications: Vec<PublicationConfig>,
    pub log_level: Option<String>,
    pub persistence_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialClientConfig {
    pub id: Option<String>,
    pub protocol_version: Option<ProtocolVersion>,
    pub server_uris: Option<Vec<String>>,
    pub connect_timeout: Option<Time>,
    pub max_connection_retries: Option<u32>,
    pub keep_alive_period: Option<Time>,
    pub clean_session: Option<bool>,
    pub unsubscribe_on_disconnect: Option<bool>,
    pub max_reply_timeout: Option<Time>,
    pub reconnect: Option<bool>,
    pub max_unack_messages: Option<u32>,
    pub persistence_level: Option<PersistenceLevel>,
    pub credentials: Option<Credentials>,
    pub tls: Option<TlsConfig>,
}

impl PartialClientConfig {
    pub fn merge(self, default: ClientConfig) -> ClientConfig {
        ClientConfig {
            id: self.id.unwrap_or(default.id),
            protocol_version: self.protocol_version.unwrap_or(default.protocol_version),
            server_uris: self.server_uris.unwrap_or(default.server_uris),
            connect_timeout: self.connect_timeout.unwrap_or(default.connect_timeout),
            max_connection_retries: self
                .max_connection_retries
                .unwrap_or(default.max_connection_retries),
            keep_alive_period: self.keep_alive_period.unwrap_or(default.keep_alive_period),
            clean_session: self.clean_session.unwrap_or(default.clean_session),
            unsubscribe_on_disconnect: self
                .unsubscribe_on_disconnect
                .unwrap_or(default.unsubscribe_on_disconnect),
            max_reply_timeout: self.max_reply_timeout.unwrap_or(default.max_reply_timeout),
            reconnect: self.reconnect.unwrap_or(default.reconnect),
            max_unack_messages: self.max_unack_messages.unwrap_or(default.max_unack_messages),
            persistence_level: self.persistence_level.unwrap_or(default.persistence_level),
            persistence_storage: default.persistence_storage,
            credentials: self.credentials.or(default.credentials),
            tls: self.tls.or(default.tls),
        }
    }
}
