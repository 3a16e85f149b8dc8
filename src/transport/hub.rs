//! Waiting for the next qualifying message of a room.
//!
//! A turn loop registers a waiter for `(channel, author)` and suspends on it.
//! Every plain message received by the bot is offered to the hub with
//! [`MessageHub::deliver`]; the first message matching a waiter completes it,
//! anything else is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use log::{trace, warn};
use tokio::sync::oneshot;
use tokio::time;

use crate::transport::{ChannelId, IncomingMessage, UserId};

/// Result of a bounded wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The first message of the awaited author
    Message(IncomingMessage),
    /// Nothing arrived in time, or the wait was replaced
    TimedOut,
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<IncomingMessage>,
}

/// Routes incoming messages to the tasks waiting for them.
#[derive(Default)]
pub struct MessageHub {
    waiters: DashMap<(ChannelId, UserId), Waiter>,
    next_id: AtomicU64,
}

impl MessageHub {
    /// Creates a hub without waiters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the next message posted by `author` in `channel`.
    ///
    /// # Arguments
    ///
    /// * `channel` - The channel to listen to
    /// * `author` - The only user whose message completes the wait
    /// * `timeout` - Upper bound of the wait
    ///
    /// The timeout is measured from the call. The registration is removed on
    /// both outcomes, so a message arriving after the timeout is not matched.
    /// A newer wait on the same `(channel, author)` replaces this one, which
    /// then ends as [`WaitOutcome::TimedOut`].
    pub async fn wait_for(
        &self,
        channel: &ChannelId,
        author: &UserId,
        timeout: Duration,
    ) -> WaitOutcome {
        let key = (channel.clone(), author.clone());
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        if self.waiters.insert(key.clone(), Waiter { id, tx }).is_some() {
            warn!("replaced a pending wait for {} in {}", author, channel);
        }
        trace!("waiting for {} in {} ({:?})", author, channel, timeout);

        match time::timeout(timeout, rx).await {
            Ok(Ok(message)) => WaitOutcome::Message(message),
            Ok(Err(_)) => {
                warn!("wait for {} in {} was superseded", author, channel);
                WaitOutcome::TimedOut
            }
            Err(_) => {
                self.waiters.remove_if(&key, |_, waiter| waiter.id == id);
                WaitOutcome::TimedOut
            }
        }
    }

    /// Offers a message to the pending waiters.
    ///
    /// Returns `true` when a waiter consumed the message.
    pub fn deliver(&self, message: IncomingMessage) -> bool {
        let key = (message.channel.clone(), message.author.id.clone());
        let Some((_, waiter)) = self.waiters.remove(&key) else {
            return false;
        };

        waiter.tx.send(message).is_ok()
    }

    /// Whether a wait is pending for `author` in `channel`.
    pub fn is_waiting(&self, channel: &ChannelId, author: &UserId) -> bool {
        self.waiters
            .contains_key(&(channel.clone(), author.clone()))
    }
}
