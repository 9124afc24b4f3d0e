//! Value types shared by configuration, messages and the transport contract.

pub mod qos;
pub mod time;

pub use qos::QosLevel;
pub use time::Time;
