//! Concurrency primitives used by the client, its registries and the
//! in-memory transport.
//!
//! - [`Mutex`]: a named lock. A poisoned lock is fatal: [`Mutex::acquire`]
//!   hands the failure to [`fatal::abort`].
//! - [`Worker`]: a named thread that yields its result on join.
//!
//! Both wrap `std` types, which already select the platform implementation at
//! build time; callers never see the platform type.

pub mod fatal;
pub mod mutex;
pub mod worker;

pub use mutex::{Mutex, MutexGuard};
pub use worker::Worker;
