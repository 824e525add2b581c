//! Cross-screen change notifications.
//!
//! Any successful mutation publishes [`AppEvent::LeasesChanged`]; every view that
//! shows lease data holds a [`Subscription`] and re-fetches when it drains one.
//! The bus is handed to screens through [`crate::session::Session`].

use std::sync::{Arc, Mutex};

use crossbeam_channel::{unbounded, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    Created,
    Amended,
    Terminated,
    Charged,
    PaymentRecorded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    LeasesChanged {
        lease_id: Option<i64>,
        reason: ChangeReason,
    },
}

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<AppEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        Subscription { rx }
    }

    /// Deliver to every live subscriber. Senders whose receiver was dropped are pruned.
    pub fn publish(&self, event: AppEvent) {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|tx| tx.send(event.clone()).is_ok());
        tracing::debug!(?event, subscribers = subs.len(), "event published");
    }

    pub fn leases_changed(&self, lease_id: Option<i64>, reason: ChangeReason) {
        self.publish(AppEvent::LeasesChanged { lease_id, reason });
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

pub struct Subscription {
    rx: Receiver<AppEvent>,
}

impl Subscription {
    /// Everything published since the last drain, without blocking.
    pub fn drain(&self) -> Vec<AppEvent> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.leases_changed(Some(3), ChangeReason::PaymentRecorded);
        let expected = AppEvent::LeasesChanged {
            lease_id: Some(3),
            reason: ChangeReason::PaymentRecorded,
        };
        assert_eq!(a.drain(), vec![expected.clone()]);
        assert_eq!(b.drain(), vec![expected]);
        assert!(a.drain().is_empty());
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let bus = EventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);
        bus.leases_changed(None, ChangeReason::Created);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.drain().len(), 1);
    }

    #[test]
    fn test_clones_share_subscribers() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        let handle = bus.clone();
        handle.leases_changed(Some(1), ChangeReason::Charged);
        assert_eq!(sub.drain().len(), 1);
    }
}
