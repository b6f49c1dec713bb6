//! In-process topic multiplexer.
//!
//! Each multiplexer wraps one bounded `tokio::sync::broadcast` ring. Publish
//! never waits for subscribers: once the ring is full the oldest entries are
//! overwritten and a subscriber that has not read them observes a lag, which
//! [`LagPolicy`] turns into either a skip or the end of its stream.
//!
//! Events reach every subscriber in publish order and at most once.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::LagPolicy;
use crate::error::{Error, Result};

/// One published event together with the topic it was published on.
#[derive(Debug)]
pub struct Envelope<T, E> {
    pub topic: T,
    pub event: E,
}

pub struct Multiplexer<T, E> {
    sender: broadcast::Sender<Arc<Envelope<T, E>>>,
    lag_policy: LagPolicy,
}

impl<T, E> Multiplexer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    #[must_use]
    pub fn new(capacity: usize, lag_policy: LagPolicy) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, lag_policy }
    }

    /// Enqueues `events` on `topic` for every current subscriber. Returns the
    /// number of subscribers that were listening.
    pub fn publish(&self, topic: T, events: impl IntoIterator<Item = E>) -> usize {
        let mut listeners = 0;
        for event in events {
            let envelope = Arc::new(Envelope {
                topic: topic.clone(),
                event,
            });
            // No receivers is not an error: nobody is streaming right now.
            listeners = self.sender.send(envelope).unwrap_or(0);
        }
        listeners
    }

    /// Subscribes from now on. Events whose topic `filter` rejects are never
    /// returned; cancelling `cancel` ends the subscription.
    pub fn subscribe<F>(&self, cancel: CancellationToken, filter: F) -> Subscription<T, E, F>
    where
        F: FnMut(&T) -> bool,
    {
        debug!(subscribers = self.sender.receiver_count() + 1, "subscribe");
        Subscription {
            receiver: self.sender.subscribe(),
            cancel,
            filter,
            lag_policy: self.lag_policy,
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A live subscription. Dropping it releases the subscriber slot.
pub struct Subscription<T, E, F> {
    receiver: broadcast::Receiver<Arc<Envelope<T, E>>>,
    cancel: CancellationToken,
    filter: F,
    lag_policy: LagPolicy,
}

impl<T, E, F> Subscription<T, E, F>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
    F: FnMut(&T) -> bool,
{
    /// Next accepted event, or `None` once cancelled or the multiplexer is
    /// gone. A lagging subscriber gets `Error::StreamClosed` under
    /// [`LagPolicy::Disconnect`].
    pub async fn recv(&mut self) -> Result<Option<Arc<Envelope<T, E>>>> {
        loop {
            let received = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(None),
                received = self.receiver.recv() => received,
            };

            match received {
                Ok(envelope) => {
                    if (self.filter)(&envelope.topic) {
                        return Ok(Some(envelope));
                    }
                }
                Err(RecvError::Closed) => return Ok(None),
                Err(RecvError::Lagged(missed)) => match self.lag_policy {
                    LagPolicy::Skip => {
                        warn!(missed, "subscriber lagged, skipping missed events");
                    }
                    LagPolicy::Disconnect => {
                        warn!(missed, "subscriber lagged, disconnecting");
                        return Err(Error::StreamClosed);
                    }
                },
            }
        }
    }
}
