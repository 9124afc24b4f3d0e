//! The `persistence` module provides durable storage for outgoing messages.
//!
//! With [`PersistenceLevel::Durable`](crate::config::PersistenceLevel), the
//! client stores every acknowledged-QoS message before handing it to the
//! transport, removes it once the broker acknowledges it, and re-publishes
//! whatever is left after each successful connect. Messages written while the
//! client is not connected are kept here until the next connection.
//!
//! [`SledStore`] backs the store with `sled`, an embedded key-value store.

pub mod sled_store;

use std::fmt;

use crate::message::Message;
use crate::utils::error::Result;

pub use sled_store::{SledStore, StoredMessage};

/// Opaque key of a stored message. Keys sort in storage order.
pub type PersistenceKey = String;

/// Storage for messages awaiting broker acknowledgement.
pub trait PersistenceStore: Send + Sync + fmt::Debug {
    fn store(&self, message: &Message) -> Result<PersistenceKey>;

    fn remove(&self, key: &PersistenceKey) -> Result<()>;

    /// Every stored message, oldest first.
    fn pending(&self) -> Result<Vec<(PersistenceKey, Message)>>;
}
