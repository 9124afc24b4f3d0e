//! The `utils` module holds the ambient pieces shared by every other module:
//! the crate error taxonomy and logging setup.

pub mod error;
pub mod logging;
