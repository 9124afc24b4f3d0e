use std::fmt;

use tracing::trace;

use crate::sync::fatal;
use crate::utils::error::FatalError;

pub type MutexGuard<'a, T> = std::sync::MutexGuard<'a, T>;

/// A named mutex whose acquisition failures are fatal.
///
/// Release happens when the returned guard is dropped, so it cannot fail.
pub struct Mutex<T> {
    label: &'static str,
    inner: std::sync::Mutex<T>,
}

impl<T> Mutex<T> {
    pub fn new(label: &'static str, value: T) -> Self {
        Self {
            label,
            inner: std::sync::Mutex::new(value),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Acquires the lock, aborting the process if it is poisoned.
    pub fn acquire(&self) -> MutexGuard<'_, T> {
        match self.try_acquire() {
            Ok(guard) => guard,
            Err(failure) => fatal::abort(failure),
        }
    }

    /// Acquires the lock, reporting a poisoned lock as a typed failure.
    pub fn try_acquire(&self) -> Result<MutexGuard<'_, T>, FatalError> {
        trace!(mutex = self.label, "acquire");
        self.inner
            .lock()
            .map_err(|_| FatalError::LockPoisoned(self.label))
    }
}

impl<T> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex").field("label", &self.label).finish()
    }
}
