//! The `client` module holds the session state machine.
//!
//! A [`Client`] owns the transport, the connection state and the registries
//! of its subscriptions and publications, all guarded by one mutex. The
//! transport's delivery thread reaches the client through a delivery handler
//! holding a weak reference, and a supervisor thread restores lost
//! connections when reconnect is enabled.

mod controller;
mod delivery;
mod state;
mod supervisor;

pub use controller::Client;
pub use state::ClientState;

pub(crate) use controller::Shared;
