//! # Host Event Dispatcher
//!
//! Fan-out of session events to the host (reload and re-authentication
//! requests, status changes, data-changed notices). Each event is wrapped in
//! an `Arc` once and every subscriber receives a pointer to the same
//! allocation.
//!
//! Publishing never blocks and never fails: with no subscriber the event is
//! dropped, and a lagging subscriber loses its oldest events.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::status::ServerStatus;

/// Events raised towards the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// The session cannot recover locally; rebuild it.
    ReloadRequested {
        /// Human-readable cause.
        reason: String,
    },
    /// The streaming credential was rejected or the subscription lost.
    ReauthenticationRequired {
        /// Human-readable cause.
        reason: String,
    },
    /// Transport, node or latency changed.
    ServerStatus(ServerStatus),
    /// A new notification was adopted.
    EarthquakeUpdated {
        /// Adopted alert id.
        id: String,
    },
    /// The report cache was replaced or extended.
    ReportsRefreshed {
        /// Reports now cached.
        count: usize,
    },
    /// A simulation override was set or cleared.
    SimulationChanged {
        /// True while a simulation is active.
        active: bool,
    },
}

/// Broadcasts [`HostEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    sender: broadcast::Sender<Arc<HostEvent>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Dispatcher {
    /// Creates a dispatcher buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<HostEvent>> {
        self.sender.subscribe()
    }

    /// Publishes an event; returns how many subscribers will see it.
    pub fn publish(&self, event: HostEvent) -> usize {
        tracing::debug!("Host event: {:?}", event);
        self.sender.send(Arc::new(event)).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_the_same_event() {
        let dispatcher = Dispatcher::new(8);
        let mut a = dispatcher.subscribe();
        let mut b = dispatcher.subscribe();

        let seen = dispatcher.publish(HostEvent::ReloadRequested { reason: "test".into() });
        assert_eq!(seen, 2);

        let ea = a.recv().await.unwrap();
        let eb = b.recv().await.unwrap();
        assert!(Arc::ptr_eq(&ea, &eb));
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let dispatcher = Dispatcher::default();
        assert_eq!(dispatcher.publish(HostEvent::SimulationChanged { active: true }), 0);
    }
}
