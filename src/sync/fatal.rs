use tracing::error;

use crate::utils::error::FatalError;

/// Logs the failure and aborts the process. Never returns.
pub fn abort(failure: FatalError) -> ! {
    error!(%failure, "unrecoverable resource failure, aborting");
    std::process::abort()
}
