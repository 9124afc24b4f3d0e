use std::sync::Weak;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::client::Shared;
use crate::sync::Worker;
use crate::types::Time;
use crate::utils::error::Result;

enum Signal {
    ConnectionLost(String),
    Stop,
}

/// Watches the connection of one client and restores it when it drops.
///
/// The worker wakes on a connection-lost event or every keep-alive period to
/// poll the transport. It exits when stopped, when the client is gone, or
/// after a reconnect failed and left the client disconnected.
pub(crate) struct Supervisor {
    signals: Sender<Signal>,
    worker: Worker<()>,
}

impl Supervisor {
    pub(crate) fn spawn(client_id: &str, client: Weak<Shared>, period: Time) -> Result<Self> {
        let (signals, rx) = mpsc::channel();
        let worker = Worker::spawn(format!("supervisor-{client_id}"), move || {
            watch(client, rx, period.to_duration())
        })?;
        Ok(Self { signals, worker })
    }

    pub(crate) fn notify_lost(&self, cause: &str) {
        let _ = self.signals.send(Signal::ConnectionLost(cause.to_string()));
    }

    pub(crate) fn signal_stop(&self) {
        let _ = self.signals.send(Signal::Stop);
    }

    /// Stops the worker and waits for it, unless called from the worker.
    pub(crate) fn stop(self) {
        if self.worker.is_finished() {
            debug!(worker = %self.worker.name(), "supervisor already exited");
        } else {
            self.signal_stop();
        }
        if self.worker.is_current() {
            return;
        }
        let name = self.worker.name().to_string();
        if let Err(e) = self.worker.join() {
            error!(worker = %name, error = %e, "supervisor failed");
        }
    }
}

fn next_signal(signals: &Receiver<Signal>, period: Option<Duration>) -> std::result::Result<Signal, RecvTimeoutError> {
    match period {
        Some(period) => signals.recv_timeout(period),
        None => signals.recv().map_err(|_| RecvTimeoutError::Disconnected),
    }
}

fn watch(client: Weak<Shared>, signals: Receiver<Signal>, period: Option<Duration>) {
    loop {
        let lost = match next_signal(&signals, period) {
            Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(Signal::ConnectionLost(cause)) => {
                info!(cause = %cause, "reconnecting");
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        };

        let Some(shared) = client.upgrade() else {
            break;
        };
        if !lost && shared.transport.is_connected() {
            continue;
        }
        if !shared.reconnect() {
            break;
        }
    }
    debug!("supervisor exiting");
}
