use std::collections::VecDeque;

use tracing::trace;

use crate::message::Message;
use crate::utils::error::{Error, Result};

/// FIFO of received messages with a loanable buffer.
///
/// A capacity of `0` means unbounded. When a bounded queue is full the oldest
/// message is dropped to make room and counted.
///
/// An unlimited read hands the whole buffer to the caller and puts a fresh
/// one in its place; deliveries during the loan land in the fresh buffer.
/// No further read is served until the loan comes back. The returned buffer
/// is kept to serve as the next fresh buffer.
#[derive(Debug, Default)]
pub(crate) struct MessageQueue {
    buffer: VecDeque<Message>,
    capacity: usize,
    spare: Option<Vec<Message>>,
    loan: Option<u64>,
    next_loan: u64,
    dropped: u64,
}

impl MessageQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Appends a message, returning the one dropped to make room, if any.
    pub(crate) fn push(&mut self, message: Message) -> Option<Message> {
        let dropped = if self.capacity > 0 && self.buffer.len() >= self.capacity {
            self.dropped += 1;
            self.buffer.pop_front()
        } else {
            None
        };
        self.buffer.push_back(message);
        dropped
    }

    /// Dequeues up to `max` messages into a new vector.
    pub(crate) fn take(&mut self, max: usize) -> Result<Vec<Message>> {
        if self.loan.is_some() {
            return Err(Error::Loan("a loan is outstanding"));
        }
        let n = max.min(self.buffer.len());
        Ok(self.buffer.drain(..n).collect())
    }

    /// Loans every queued message to the caller.
    pub(crate) fn loan(&mut self) -> Result<(u64, Vec<Message>)> {
        if self.loan.is_some() {
            return Err(Error::Loan("a loan is already outstanding"));
        }
        let fresh = VecDeque::from(self.spare.take().unwrap_or_default());
        let loaned = Vec::from(std::mem::replace(&mut self.buffer, fresh));

        self.next_loan += 1;
        self.loan = Some(self.next_loan);
        trace!(loan = self.next_loan, messages = loaned.len(), "buffer loaned");
        Ok((self.next_loan, loaned))
    }

    pub(crate) fn return_loan(&mut self, ticket: u64, mut buffer: Vec<Message>) -> Result<()> {
        match self.loan {
            None => Err(Error::Loan("no loan is outstanding")),
            Some(outstanding) if outstanding != ticket => {
                Err(Error::Loan("messages do not belong to the outstanding loan"))
            }
            Some(_) => {
                self.loan = None;
                buffer.clear();
                self.spare = Some(buffer);
                Ok(())
            }
        }
    }

    pub(crate) fn has_loan(&self) -> bool {
        self.loan.is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.buffer.len()
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped
    }
}
