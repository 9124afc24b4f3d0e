//! Error types shared by every public operation.
//!
//! Every operation reports a binary outcome through [`Result`]. The variants
//! follow the failure classes of the session manager:
//!
//! - [`Error::Configuration`]: malformed configuration, caught before any
//!   broker interaction.
//! - [`Error::State`]: the operation is not valid in the current connection
//!   state.
//! - [`Error::Timeout`]: a connect, reply or write deadline expired. The
//!   client is always left in a defined state.
//! - [`Error::Transport`]: the broker rejected a request or the connection
//!   dropped mid-operation. Partial registry changes are rolled back.
//! - [`FatalError`]: lock or worker failure. Lock failures abort the process
//!   through [`crate::sync::fatal`]; the typed value only exists so that the
//!   decision point can be observed.

use thiserror::Error;

use crate::client::ClientState;
use crate::transport::TransportError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("cannot {operation} while client is {state}")]
    State {
        operation: &'static str,
        state: ClientState,
    },

    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    #[error("transport failure during {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("{0} is not owned by this client")]
    NotOwned(&'static str),

    #[error("loan error: {0}")]
    Loan(&'static str),

    #[error("sample conversion failed: {0}")]
    Codec(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Fatal(#[from] FatalError),
}

impl Error {
    /// Maps a transport failure, keeping timeouts in their own class.
    pub(crate) fn transport(operation: &'static str, source: TransportError) -> Self {
        match source {
            TransportError::Timeout => Error::Timeout { operation },
            source => Error::Transport { operation, source },
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    pub fn is_state(&self) -> bool {
        matches!(self, Error::State { .. })
    }
}

/// Unrecoverable resource failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    #[error("mutex '{0}' is poisoned")]
    LockPoisoned(&'static str),

    #[error("worker '{0}' panicked")]
    WorkerPanicked(String),
}
