//! Event broadcasting for meter updates.

use autolimit_types::LimiterEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Fan-out of [`LimiterEvent`]s to any number of observers.
///
/// Sending never blocks: an observer that falls more than the buffer size
/// behind loses the oldest samples and sees `RecvError::Lagged`.
#[derive(Clone)]
pub struct EventBroadcaster {
    /// Broadcast channel for events
    sender: Arc<broadcast::Sender<LimiterEvent>>,
}

impl EventBroadcaster {
    /// Create a new event broadcaster with a buffer size.
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Broadcast an event to all subscribers.
    pub fn broadcast(&self, event: LimiterEvent) {
        trace!("Broadcasting event: {}", event.description());
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LimiterEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100) // Default buffer of 100 events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autolimit_types::MeterSample;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_broadcast_without_subscribers() {
        let events = EventBroadcaster::default();
        events.broadcast(LimiterEvent::Attenuation {
            node: "limiter".to_string(),
            value: 1.0,
        });
        assert_eq!(events.subscriber_count(), 0);
    }

    #[test]
    fn test_every_subscriber_receives() {
        let events = EventBroadcaster::default();
        let mut a = events.subscribe();
        let mut b = events.subscribe();
        assert_eq!(events.subscriber_count(), 2);

        let event = LimiterEvent::InputLevel {
            node: "limiter".to_string(),
            sample: MeterSample::new(0.5, 0.25),
        };
        events.broadcast(event.clone());
        assert_eq!(a.try_recv().unwrap(), event);
        assert_eq!(b.try_recv().unwrap(), event);
    }

    #[test]
    fn test_lagging_subscriber_loses_oldest() {
        let events = EventBroadcaster::new(2);
        let mut rx = events.subscribe();
        for i in 0..4 {
            events.broadcast(LimiterEvent::Attenuation {
                node: "limiter".to_string(),
                value: i as f64,
            });
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Lagged(2))));
        assert!(matches!(
            rx.try_recv(),
            Ok(LimiterEvent::Attenuation { value, .. }) if value == 2.0
        ));
    }
}
