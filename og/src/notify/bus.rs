//! Notification bus - broadcast of notification events
//!
//! Components notify, consumers (UI, loggers, tests) subscribe. Delivery is
//! fire-and-forget: with no subscribers the event is dropped, and slow
//! subscribers lose the oldest events.

use tokio::sync::broadcast;
use tracing::debug;

use super::Notifier;
use super::types::{Notification, NotificationKind, NotificationStatus};

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_000;

/// Broadcast channel of notification events
pub struct NotificationBus {
    tx: broadcast::Sender<Notification>,
}

impl NotificationBus {
    /// Create a new bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "NotificationBus::new: creating bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a new bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Publish a notification to all subscribers
    pub fn publish(&self, notification: Notification) {
        debug!(id = %notification.id, status = %notification.status, "NotificationBus::publish");
        // Ignore send errors (no subscribers is OK)
        let _ = self.tx.send(notification);
    }

    /// Subscribe to notifications published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        debug!("NotificationBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl Notifier for NotificationBus {
    fn show(&self, id: &str, status: NotificationStatus, message: &str) {
        self.publish(Notification::new(id, NotificationKind::Show, status, message));
    }

    fn update(&self, id: &str, status: NotificationStatus, message: &str) {
        self.publish(Notification::new(id, NotificationKind::Update, status, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_in_order() {
        let bus = NotificationBus::with_default_capacity();
        let mut rx = bus.subscribe();

        bus.show("recovery", NotificationStatus::Pending, "starting");
        bus.update("recovery", NotificationStatus::Success, "done");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, NotificationKind::Show);
        assert_eq!(first.status, NotificationStatus::Pending);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, NotificationKind::Update);
        assert_eq!(second.message, "done");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = NotificationBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.show("x", NotificationStatus::Alert, "nobody listening");
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = NotificationBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.show("loop-detected", NotificationStatus::Alert, "loop");
        assert_eq!(a.recv().await.unwrap().id, "loop-detected");
        assert_eq!(b.recv().await.unwrap().id, "loop-detected");
    }
}
