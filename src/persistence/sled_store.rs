use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use tracing::{debug, warn};

use crate::message::Message;
use crate::persistence::{PersistenceKey, PersistenceStore};
use crate::types::QosLevel;
use crate::utils::error::{Error, Result};

const OUTBOX_TREE: &str = "outbox";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QosLevel,
    pub retained: bool,
    pub timestamp: i64,
}

impl From<StoredMessage> for Message {
    fn from(stored: StoredMessage) -> Self {
        Message::new(stored.topic, stored.payload)
            .with_qos(stored.qos)
            .with_retained(stored.retained)
    }
}

/// Outbox backed by a `sled` tree.
///
/// Keys are `<millis:020>_<sequence:020>` so iteration yields messages in the
/// order they were stored. Two retention policies are optional: a
/// time-to-live, enforced when pending messages are loaded, and a cap on the
/// number of stored messages, enforced on insert by evicting the oldest.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    outbox: Tree,
    ttl_seconds: Option<i64>,
    max_messages: Option<usize>,
}

impl SledStore {
    /// Open or create a sled database at `path` without retention limits.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_policy(path, None, None)
    }

    pub fn with_policy(
        path: impl AsRef<Path>,
        ttl_seconds: Option<i64>,
        max_messages: Option<usize>,
    ) -> Result<Self> {
        let db = sled::open(path.as_ref()).map_err(persistence_error)?;
        let outbox = db.open_tree(OUTBOX_TREE).map_err(persistence_error)?;
        Ok(Self {
            db,
            outbox,
            ttl_seconds,
            max_messages,
        })
    }

    pub fn len(&self) -> usize {
        self.outbox.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outbox.is_empty()
    }

    fn next_key(&self, timestamp: i64) -> Result<String> {
        let sequence = self.db.generate_id().map_err(persistence_error)?;
        Ok(format!("{timestamp:020}_{sequence:020}"))
    }

    fn enforce_max_messages(&self) {
        let Some(max) = self.max_messages else {
            return;
        };
        let total = self.outbox.len();
        if total <= max {
            return;
        }
        let excess = total - max;
        let keys_to_delete: Vec<_> = self
            .outbox
            .iter()
            .take(excess)
            .filter_map(|entry| entry.ok().map(|(k, _)| k))
            .collect();

        for key in keys_to_delete {
            if let Err(e) = self.outbox.remove(key) {
                warn!("Failed to evict stored message: {e}");
            }
        }
        debug!(evicted = excess, "outbox trimmed to {max} messages");
    }

    /// Remove messages older than the TTL.
    fn cleanup_old_messages(&self) {
        let Some(ttl) = self.ttl_seconds else {
            return;
        };
        let expiry_time = Utc::now().timestamp_millis() - ttl * 1000;

        let old_keys: Vec<_> = self
            .outbox
            .iter()
            .filter_map(|res| res.ok())
            .filter_map(|(key_bytes, _)| {
                let ts = std::str::from_utf8(&key_bytes)
                    .ok()?
                    .split_once('_')?
                    .0
                    .parse::<i64>()
                    .ok()?;
                (ts < expiry_time).then_some(key_bytes)
            })
            .collect();

        for key in old_keys {
            let _ = self.outbox.remove(key);
        }
    }
}

impl PersistenceStore for SledStore {
    fn store(&self, message: &Message) -> Result<PersistenceKey> {
        let stored = StoredMessage {
            topic: message.topic.clone(),
            payload: message.payload.clone(),
            qos: message.qos,
            retained: message.retained,
            timestamp: Utc::now().timestamp_millis(),
        };
        let serialized = serde_json::to_vec(&stored).map_err(persistence_error)?;
        let key = self.next_key(stored.timestamp)?;

        self.outbox
            .insert(key.as_bytes(), serialized)
            .map_err(persistence_error)?;
        self.enforce_max_messages();
        Ok(key)
    }

    fn remove(&self, key: &PersistenceKey) -> Result<()> {
        self.outbox
            .remove(key.as_bytes())
            .map(|_| ())
            .map_err(persistence_error)
    }

    fn pending(&self) -> Result<Vec<(PersistenceKey, Message)>> {
        self.cleanup_old_messages();

        let mut messages = Vec::new();
        for entry in self.outbox.iter() {
            let (key, value) = entry.map_err(persistence_error)?;
            let key = String::from_utf8_lossy(&key).into_owned();
            match serde_json::from_slice::<StoredMessage>(&value) {
                Ok(stored) => messages.push((key, stored.into())),
                Err(e) => warn!(%key, "Skipping unreadable stored message: {e}"),
            }
        }
        Ok(messages)
    }
}

fn persistence_error(e: impl std::fmt::Display) -> Error {
    Error::Persistence(e.to_string())
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .field("ttl_seconds", &self.ttl_seconds)
            .field("max_messages", &self.max_messages)
            .finish()
    }
}
