//! Publications: write endpoints owned by a [`Client`](crate::Client).

pub(crate) mod registry;

use std::fmt;
use std::sync::{Arc, Weak};

use crate::client::Shared;
use crate::config::{PublicationConfig, WriteParams};
use crate::message::{Message, Sample};
use crate::subscription::topic;
use crate::utils::error::{Error, Result};

pub use registry::PublicationId;
pub(crate) use registry::PublicationRegistry;

/// Handle to a publication owned by a client.
///
/// Writes hold the client lock for their whole duration, so writes from
/// different threads reach the transport one after the other.
#[derive(Clone)]
pub struct Publication {
    id: PublicationId,
    client: Weak<Shared>,
}

impl Publication {
    pub(crate) fn new(id: PublicationId, client: Weak<Shared>) -> Self {
        Self { id, client }
    }

    pub fn id(&self) -> PublicationId {
        self.id
    }

    pub(crate) fn belongs_to(&self, shared: &Arc<Shared>) -> bool {
        std::ptr::eq(self.client.as_ptr(), Arc::as_ptr(shared))
    }

    fn upgrade(&self) -> Result<Arc<Shared>> {
        self.client.upgrade().ok_or(Error::NotOwned("publication"))
    }

    pub fn config(&self) -> Result<PublicationConfig> {
        let shared = self.upgrade()?;
        let inner = shared.inner.acquire();
        inner
            .publications
            .get(self.id)
            .cloned()
            .ok_or(Error::NotOwned("publication"))
    }

    /// Publishes the payload of `sample`.
    ///
    /// Topic, QoS and retained flag come from the publication's config, or
    /// from the sample's message info when `use_message_info` is set.
    pub fn write(&self, sample: &Sample) -> Result<()> {
        let shared = self.upgrade()?;
        let inner = shared.inner.acquire();
        let config = inner
            .publications
            .get(self.id)
            .ok_or(Error::NotOwned("publication"))?;

        let message = if config.use_message_info {
            let info = sample
                .info()?
                .ok_or_else(|| Error::Codec("sample carries no message info".into()))?;
            topic::validate_topic_name(&info.topic)?;
            Message::new(info.topic, sample.payload()?)
                .with_qos(info.qos_level)
                .with_retained(info.retained)
        } else {
            Message::new(config.topic.as_str(), sample.payload()?)
                .with_qos(config.qos)
                .with_retained(config.retained)
        };

        shared.send(inner.state, &message, config.max_wait_time)
    }

    /// Publishes a raw payload, ignoring the stored topic, QoS and retained
    /// flag.
    pub fn write_w_params(&self, payload: &[u8], topic_name: &str, params: &WriteParams) -> Result<()> {
        topic::validate_topic_name(topic_name)?;
        let shared = self.upgrade()?;
        let inner = shared.inner.acquire();
        let config = inner
            .publications
            .get(self.id)
            .ok_or(Error::NotOwned("publication"))?;

        let message = Message::new(topic_name, payload)
            .with_qos(params.qos_level)
            .with_retained(params.retained);
        shared.send(inner.state, &message, config.max_wait_time)
    }
}

impl fmt::Debug for Publication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publication").field("id", &self.id).finish()
    }
}

impl PartialEq for Publication {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.client, &other.client)
    }
}

impl Eq for Publication {}

#[cfg(test)]
mod tests;
