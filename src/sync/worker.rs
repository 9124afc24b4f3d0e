use std::thread::{self, JoinHandle, ThreadId};

use tracing::debug;

use crate::utils::error::{Error, FatalError, Result};

/// A named thread running one unit of work.
///
/// Dropping a `Worker` without joining detaches the thread.
#[derive(Debug)]
pub struct Worker<T> {
    name: String,
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> Worker<T> {
    pub fn spawn<F>(name: impl Into<String>, work: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let name = name.into();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(work)
            .map_err(Error::Spawn)?;
        debug!(worker = %name, "spawned");
        Ok(Self { name, handle })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thread_id(&self) -> ThreadId {
        self.handle.thread().id()
    }

    /// Whether the calling thread is this worker. A worker must not join itself.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the work to finish and yields its result.
    pub fn join(self) -> std::result::Result<T, FatalError> {
        let name = self.name;
        self.handle
            .join()
            .map_err(|_| FatalError::WorkerPanicked(name))
    }
}
