//! Session change subscriptions

use log::warn;
use tokio::sync::broadcast::{self, error::RecvError};

use super::SessionChange;

/// Number of undelivered notifications kept per subscriber
pub(crate) const CHANNEL_CAPACITY: usize = 16;

/// Owned handle on the session change feed.
///
/// Dropping the handle (or calling [`unsubscribe`](Self::unsubscribe)) stops
/// delivery; there is no ambient listener left behind.
#[derive(Debug)]
pub struct SessionSubscription {
    receiver: broadcast::Receiver<SessionChange>,
}

impl SessionSubscription {
    /// Wrap the receiving end of a session change channel
    pub fn new(receiver: broadcast::Receiver<SessionChange>) -> Self {
        Self { receiver }
    }

    /// Wait for the next change; `None` once the feed is closed
    pub async fn changed(&mut self) -> Option<SessionChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Session listener lagged, skipped {} notifications", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Stop receiving notifications
    pub fn unsubscribe(self) {}
}
