//! Event fan-out.
//!
//! Every subscriber gets its own `broadcast::Receiver`. A subscriber that
//! falls more than [`EVENT_CAPACITY`] events behind sees `Lagged` and
//! skips ahead; publishing never blocks the render loop.

use lessoncast_model::event::{CompositorEvent, EventKind};
use tokio::sync::broadcast;

pub const EVENT_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct EventBus {
    sender: Option<broadcast::Sender<CompositorEvent>>,
    published: u64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Some(sender),
            published: 0,
        }
    }

    /// Subscribe to events published from now on. After `close`, the
    /// receiver reports `Closed` immediately.
    pub fn subscribe(&self) -> broadcast::Receiver<CompositorEvent> {
        match &self.sender {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Stamp and send an event. Having no subscribers is fine.
    pub fn publish(&mut self, kind: EventKind) -> Option<CompositorEvent> {
        let sender = self.sender.as_ref()?;
        let event = CompositorEvent::now(kind);
        tracing::trace!(event = event.type_name(), "Publishing event");
        let _ = sender.send(event.clone());
        self.published += 1;
        Some(event)
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    /// Drop the sender; receivers drain what is queued, then see `Closed`.
    pub fn close(&mut self) {
        self.sender = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_subscribers_receive_in_order() {
        let mut bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(EventKind::Started);
        bus.publish(EventKind::Paused);
        assert_eq!(rx.try_recv().unwrap().type_name(), "started");
        assert_eq!(rx.try_recv().unwrap().type_name(), "paused");
        assert_eq!(bus.published(), 2);
    }

    #[test]
    fn test_publishing_without_subscribers_is_fine() {
        let mut bus = EventBus::default();
        assert!(bus.publish(EventKind::Started).is_some());
    }

    #[test]
    fn test_close_ends_streams() {
        let mut bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(EventKind::Disposed);
        bus.close();
        assert_eq!(rx.try_recv().unwrap().type_name(), "disposed");
        assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
        assert!(bus.publish(EventKind::Started).is_none());

        let mut late = bus.subscribe();
        assert_eq!(late.try_recv(), Err(TryRecvError::Closed));
    }

    #[test]
    fn test_slow_subscriber_lags() {
        let mut bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for _ in 0..5 {
            bus.publish(EventKind::Started);
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Lagged(_))));
    }
}
