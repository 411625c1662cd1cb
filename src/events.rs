//! Dispatch events broadcast to subscribers.
//!
//! Events mirror what happens inside the service (rides requested, drivers
//! declining, assignments, transitions, observer failures). Publishing never
//! blocks and never fails: with no subscribers the event is dropped.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::ExhaustionReason;
use crate::ride::current_timestamp_ms;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchEvent {
    pub id: Uuid,
    pub ride_id: String,
    pub kind: DispatchEventKind,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEventKind {
    RideRequested,
    DriverDeclined { driver_id: String, attempt: u32 },
    /// The driver was taken by a concurrent dispatch before this one could reserve it
    DriverTaken { driver_id: String },
    DriverAssigned { driver_id: String, attempt: u32 },
    DispatchFailed { reason: ExhaustionReason },
    RideStarted,
    RideCompleted { fare: f64 },
    NotificationFailed { observer: String, error: String },
}

/// Thin wrapper over a broadcast sender.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DispatchEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, ride_id: &str, kind: DispatchEventKind) {
        let event = DispatchEvent {
            id: Uuid::new_v4(),
            ride_id: ride_id.to_string(),
            kind,
            timestamp: current_timestamp_ms(),
        };
        // An error only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new(8);
        bus.publish("RIDE_1", DispatchEventKind::RideRequested);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribers_receive_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish("RIDE_1", DispatchEventKind::RideRequested);
        bus.publish("RIDE_1", DispatchEventKind::RideStarted);

        assert_eq!(rx.try_recv().unwrap().kind, DispatchEventKind::RideRequested);
        assert_eq!(rx.try_recv().unwrap().kind, DispatchEventKind::RideStarted);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let bus = EventBus::new(1);
        let mut rx = bus.subscribe();
        bus.publish(
            "RIDE_7",
            DispatchEventKind::DriverDeclined {
                driver_id: "D2".to_string(),
                attempt: 1,
            },
        );
        let json = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
        assert_eq!(json["ride_id"], "RIDE_7");
        assert_eq!(json["kind"]["type"], "driver_declined");
        assert_eq!(json["kind"]["driver_id"], "D2");
    }
}
