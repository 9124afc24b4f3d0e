//! # mqtt-session
//!
//! `mqtt-session` is an MQTT client session manager. It keeps track of one
//! connection to a broker, the subscriptions and publications made over it,
//! and the messages received for each subscription, and keeps that state
//! consistent between application threads and the transport's delivery
//! thread.
//!
//! ## Core Modules
//!
//! - `client`: The connection state machine that owns everything else.
//! - `subscription`: Subscription handles, their message queues and the loan-based read protocol.
//! - `publication`: Publication handles and the write path.
//! - `message`: Raw messages and their conversion to structured samples.
//! - `transport`: The seam to the MQTT wire, plus an in-process implementation.
//! - `config`: Client, subscription and publication configuration and the settings loader.
//! - `persistence`: Durable storage of unacknowledged outgoing messages.
//! - `sync`: The mutex and worker thread primitives the rest is built on.
//! - `types`: Time values and QoS levels.
//! - `utils`: Error types and logging setup.

pub mod client;
pub mod config;
pub mod message;
pub mod persistence;
pub mod publication;
pub mod subscription;
pub mod sync;
pub mod transport;
pub mod types;
pub mod utils;

pub use client::{Client, ClientState};
pub use config::{ClientConfig, PublicationConfig, SubscriptionConfig, WriteParams};
pub use message::{Message, Sample};
pub use publication::Publication;
pub use subscription::{DataAvailableListener, MessageBatch, READ_LENGTH_UNLIMITED, Subscription};
pub use types::{QosLevel, Time};
pub use utils::error::{Error, Result};
