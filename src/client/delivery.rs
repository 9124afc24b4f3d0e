use std::sync::Weak;

use tracing::{trace, warn};

use crate::client::Shared;
use crate::client::state::ClientState;
use crate::message::Message;
use crate::subscription::Subscription;
use crate::transport::TransportEvents;

/// Receives inbound traffic on the transport's delivery thread.
pub(crate) struct DeliveryHandler {
    client: Weak<Shared>,
}

impl DeliveryHandler {
    pub(crate) fn new(client: Weak<Shared>) -> Self {
        Self { client }
    }
}

impl TransportEvents for DeliveryHandler {
    fn on_message(&self, message: Message) {
        let Some(shared) = self.client.upgrade() else {
            return;
        };
        trace!(client_id = %shared.config.id, topic = %message.topic, "message received");

        let notified = shared.inner.acquire().subscriptions.deliver(&message);

        // listeners run without the client lock
        for (id, listener) in notified {
            if let Some(listener) = listener {
                listener.on_data_available(&Subscription::new(id, self.client.clone()));
            }
        }
    }

    fn on_connection_lost(&self, cause: &str) {
        let Some(shared) = self.client.upgrade() else {
            return;
        };
        let mut inner = shared.inner.acquire();
        if inner.state != ClientState::Connected {
            return;
        }
        warn!(client_id = %shared.config.id, cause, "connection lost");
        match &inner.supervisor {
            Some(supervisor) => supervisor.notify_lost(cause),
            None => {
                inner.connected_uri = None;
                inner.transition(&shared.config.id, ClientState::Disconnected);
            }
        }
    }
}
