use acubens_common::prelude::*;
use acubens_common::LockEvent;
use tokio::sync::broadcast;

/// Fan-out of lease-state changes to all connected observers.
///
/// Backed by a bounded broadcast channel: a slow observer that lags past the
/// channel capacity misses events, which the snapshot push on (re)connect
/// heals. Publishing with no observers connected is a no-op.
pub struct EventPublisher {
    channel: broadcast::Sender<LockEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (channel, _) = broadcast::channel(capacity);
        Self { channel }
    }

    pub fn publish(&self, event: LockEvent) {
        match self.channel.send(event) {
            Ok(observers) => trace!("lock event published to {} observers", observers),
            Err(_) => trace!("no observers connected, lock event dropped"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LockEvent> {
        self.channel.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.channel.receiver_count()
    }
}
