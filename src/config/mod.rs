//! Client, subscription and publication configuration, plus a loader that
//! layers a settings file and `MQTT__*` environment variables over the
//! defaults.

pub mod client;
pub mod endpoint;
mod settings;

use std::sync::Arc;

use config::{Config, ConfigError, Environment, File};
use tracing::debug;

use crate::persistence::SledStore;
use settings::PartialSettings;

pub use client::{ClientConfig, Credentials, PersistenceLevel, ProtocolVersion, TlsConfig};
pub use endpoint::{PublicationConfig, SubscriptionConfig, WriteParams};
pub use settings::{PartialClientConfig, Settings};

/// Loads settings from `path` (any format the `config` crate understands,
/// optional) and the environment, then merges them with the defaults.
///
/// Environment keys use `__` as separator, e.g. `MQTT__CLIENT__ID` or
/// `MQTT__CLIENT__SERVER_URIS=tcp://a:1883,tcp://b:1883`. A `.env` file is
/// honoured. When `persistence_path` is set, a sled store is opened there.
pub fn load_settings(path: &str) -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();

    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("MQTT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("client.server_uris"),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();

    let mut client = partial
        .client
        .map(|c| c.merge(default.client.clone()))
        .unwrap_or(default.client);

    if let Some(path) = &partial.persistence_path {
        let store = SledStore::open(path).map_err(|e| ConfigError::Message(e.to_string()))?;
        client.persistence_storage = Some(Arc::new(store));
    }

    debug!(servers = ?client.server_uris, "settings loaded");

    Ok(Settings {
        client,
        subscriptions: partial.subscriptions,
        publications: partial.publications,
        log_level: partial.log_level.unwrap_or(default.log_level),
        persistence_path: partial.persistence_path,
    })
}
