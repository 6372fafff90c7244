//! Console event broadcasting.
//!
//! The UI (or CLI) subscribes to a single channel carrying every
//! [`ConsoleEvent`]; workers publish through the [`ConsoleEventEmitter`] port.

use ogpt_core::{ConsoleEvent, ConsoleEventEmitter};
use tokio::sync::broadcast;
use tracing::trace;

/// Broadcast channel capacity for console events.
///
/// Pty chunks and log lines arrive in bursts; a subscriber that falls this
/// far behind observes `Lagged` and skips ahead.
const CHANNEL_CAPACITY: usize = 1024;

/// Broadcaster for console events.
#[derive(Clone)]
pub struct ConsoleEventBroadcaster {
    sender: broadcast::Sender<ConsoleEvent>,
}

impl ConsoleEventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast(&self, event: ConsoleEvent) {
        // Only log if there are receivers
        if self.sender.receiver_count() > 0 {
            trace!(event = event.event_name(), "Broadcasting console event");
            let _ = self.sender.send(event);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.sender.subscribe()
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ConsoleEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleEventEmitter for ConsoleEventBroadcaster {
    fn emit(&self, event: ConsoleEvent) {
        self.broadcast(event);
    }

    fn clone_box(&self) -> Box<dyn ConsoleEventEmitter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogpt_core::{LogStream, PtyEvent};

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let broadcaster = ConsoleEventBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        let first = ConsoleEvent::from(PtyEvent::chunk(LogStream::Merged, "a"));
        let second = ConsoleEvent::from(PtyEvent::chunk(LogStream::Merged, "b"));
        broadcaster.emit(first.clone());
        broadcaster.emit(second.clone());

        assert_eq!(rx.recv().await.unwrap(), first);
        assert_eq!(rx.recv().await.unwrap(), second);
    }

    #[test]
    fn emitting_without_subscribers_is_fine() {
        let broadcaster = ConsoleEventBroadcaster::default();
        assert_eq!(broadcaster.subscriber_count(), 0);
        broadcaster.emit(PtyEvent::chunk(LogStream::Stdout, "dropped").into());
    }
}
