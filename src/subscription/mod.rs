//! Subscriptions: registry entries owned by a [`Client`](crate::Client) and
//! the handles applications use to read from them.

pub(crate) mod queue;
pub(crate) mod registry;
pub mod topic;

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use tracing::debug;

use crate::client::Shared;
use crate::message::{Message, Sample};
use crate::types::QosLevel;
use crate::utils::error::{Error, Result};

pub(crate) use registry::{SubscriptionEntry, SubscriptionRegistry};
pub use registry::SubscriptionId;

/// Passed to [`Subscription::read`] to take every queued message as a loan.
pub const READ_LENGTH_UNLIMITED: usize = 0;

/// Notified on the delivery thread after messages were queued for a
/// subscription. Called without any client lock held, so the listener may
/// read from the subscription.
pub trait DataAvailableListener: Send + Sync {
    fn on_data_available(&self, subscription: &Subscription);
}

impl<F> DataAvailableListener for F
where
    F: Fn(&Subscription) + Send + Sync,
{
    fn on_data_available(&self, subscription: &Subscription) {
        self(subscription)
    }
}

struct Loan {
    subscription: SubscriptionId,
    sequence: u64,
    client: Weak<Shared>,
}

/// Messages returned by [`Subscription::read`].
///
/// A batch obtained with [`READ_LENGTH_UNLIMITED`] is a loan. Hand it back
/// with [`Subscription::return_loan`]; a loaned batch that is dropped instead
/// returns itself to the subscription that loaned it.
pub struct MessageBatch {
    messages: Vec<Message>,
    loan: Option<Loan>,
}

impl MessageBatch {
    pub fn is_loan(&self) -> bool {
        self.loan.is_some()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn to_samples(&self) -> Result<Vec<Sample>> {
        self.messages.iter().map(Message::to_sample).collect()
    }

    fn release(&mut self) -> Result<()> {
        let loan = self.loan.take().ok_or(Error::Loan("batch is not a loan"))?;
        let shared = loan.client.upgrade().ok_or(Error::NotOwned("subscription"))?;
        let mut inner = shared.inner.acquire();
        let entry = inner
            .subscriptions
            .get_mut(loan.subscription)
            .ok_or(Error::NotOwned("subscription"))?;
        entry
            .queue
            .return_loan(loan.sequence, std::mem::take(&mut self.messages))
    }
}

impl Deref for MessageBatch {
    type Target = [Message];

    fn deref(&self) -> &[Message] {
        &self.messages
    }
}

impl fmt::Debug for MessageBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBatch")
            .field("messages", &self.messages)
            .field("loan", &self.loan.as_ref().map(|loan| loan.sequence))
            .finish()
    }
}

impl Drop for MessageBatch {
    fn drop(&mut self) {
        if self.loan.is_none() {
            return;
        }
        // a subscription removed or a client dropped takes the loan with it
        if let Err(e) = self.release() {
            debug!(error = %e, "dropped loan not returned");
        }
    }
}

/// Handle to a subscription owned by a client.
///
/// Handles are cheap to clone. Once the subscription is unsubscribed or its
/// client dropped, every operation fails with [`Error::NotOwned`].
#[derive(Clone)]
pub struct Subscription {
    id: SubscriptionId,
    client: Weak<Shared>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, client: Weak<Shared>) -> Self {
        Self { id, client }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub(crate) fn belongs_to(&self, shared: &Arc<Shared>) -> bool {
        std::ptr::eq(self.client.as_ptr(), Arc::as_ptr(shared))
    }

    fn with_entry<R>(&self, f: impl FnOnce(&mut SubscriptionEntry) -> Result<R>) -> Result<R> {
        let shared = self.client.upgrade().ok_or(Error::NotOwned("subscription"))?;
        let mut inner = shared.inner.acquire();
        let entry = inner
            .subscriptions
            .get_mut(self.id)
            .ok_or(Error::NotOwned("subscription"))?;
        f(entry)
    }

    /// Installs `listener`, replacing any previous one.
    pub fn set_data_available_listener<L>(&self, listener: L) -> Result<()>
    where
        L: DataAvailableListener + 'static,
    {
        let listener: Arc<dyn DataAvailableListener> = Arc::new(listener);
        self.with_entry(|entry| {
            entry.listener = Some(listener);
            Ok(())
        })
    }

    pub fn clear_data_available_listener(&self) -> Result<()> {
        self.with_entry(|entry| {
            entry.listener = None;
            Ok(())
        })
    }

    /// Reads queued messages.
    ///
    /// With [`READ_LENGTH_UNLIMITED`] the whole queue is loaned to the caller.
    /// Any other value dequeues up to `max_messages` into an owned batch.
    /// While a loan is outstanding every read fails with [`Error::Loan`].
    pub fn read(&self, max_messages: usize) -> Result<MessageBatch> {
        let loan = |sequence| Loan {
            subscription: self.id,
            sequence,
            client: self.client.clone(),
        };
        self.with_entry(|entry| {
            if max_messages == READ_LENGTH_UNLIMITED {
                let (sequence, messages) = entry.queue.loan()?;
                Ok(MessageBatch {
                    messages,
                    loan: Some(loan(sequence)),
                })
            } else {
                Ok(MessageBatch {
                    messages: entry.queue.take(max_messages)?,
                    loan: None,
                })
            }
        })
    }

    /// Hands a loaned batch back so its buffer can be reused.
    ///
    /// A batch loaned by another subscription is rejected and, being dropped,
    /// goes back to the subscription it came from.
    pub fn return_loan(&self, mut batch: MessageBatch) -> Result<()> {
        let owned = match &batch.loan {
            None => return Err(Error::Loan("batch is not a loan")),
            Some(loan) => {
                loan.subscription == self.id && Weak::ptr_eq(&loan.client, &self.client)
            }
        };
        if !owned {
            return Err(Error::Loan("batch was loaned by another subscription"));
        }
        batch.release()
    }

    pub fn topic_filters(&self) -> Result<Vec<String>> {
        self.with_entry(|entry| Ok(entry.filters.clone()))
    }

    /// Lowest QoS granted across the topic filters.
    pub fn qos(&self) -> Result<QosLevel> {
        self.with_entry(|entry| Ok(entry.qos()))
    }

    pub fn granted_qos(&self) -> Result<Vec<QosLevel>> {
        self.with_entry(|entry| Ok(entry.granted.clone()))
    }

    /// Number of queued messages not yet read.
    pub fn pending(&self) -> Result<usize> {
        self.with_entry(|entry| Ok(entry.queue.len()))
    }

    pub fn dropped_messages(&self) -> Result<u64> {
        self.with_entry(|entry| Ok(entry.queue.dropped()))
    }

    pub fn has_outstanding_loan(&self) -> Result<bool> {
        self.with_entry(|entry| Ok(entry.queue.has_loan()))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.client, &other.client)
    }
}

impl Eq for Subscription {}
