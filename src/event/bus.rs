use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::events::RoomEvent;

/// Buffered events per room before slow subscribers start lagging
pub const ROOM_CHANNEL_CAPACITY: usize = 100;

/// Event bus distributing room change notifications to subscribers
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    /// Room-specific event channels: pin -> sender
    room_channels: Arc<RwLock<HashMap<String, broadcast::Sender<RoomEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits an event to all subscribers of the event's room
    pub async fn emit(&self, event: RoomEvent) {
        let room_channels = self.room_channels.read().await;

        match room_channels.get(event.pin()) {
            Some(sender) => {
                let pin = event.pin().to_string();
                let event_type = event.event_type();
                match sender.send(event) {
                    Ok(receiver_count) => {
                        debug!(pin = %pin, event_type, receivers = receiver_count, "Room event emitted");
                    }
                    Err(_) => {
                        debug!(pin = %pin, event_type, "Room event emitted with no receivers");
                    }
                }
            }
            None => {
                debug!(pin = %event.pin(), event_type = event.event_type(), "No subscribers for room");
            }
        }
    }

    /// Subscribe to events for a specific room
    pub async fn subscribe(&self, pin: &str) -> broadcast::Receiver<RoomEvent> {
        let room_channels = self.room_channels.read().await;

        if let Some(sender) = room_channels.get(pin) {
            sender.subscribe()
        } else {
            drop(room_channels);

            let mut room_channels = self.room_channels.write().await;
            // Another subscriber may have created the channel in between
            let sender = room_channels.entry(pin.to_string()).or_insert_with(|| {
                debug!(pin = %pin, "Creating new room channel for subscription");
                broadcast::channel(ROOM_CHANNEL_CAPACITY).0
            });
            sender.subscribe()
        }
    }

    /// Drops the room's channel. Subscribers see the stream close once
    /// buffered events are drained.
    pub async fn remove_room(&self, pin: &str) {
        if self.room_channels.write().await.remove(pin).is_some() {
            debug!(pin = %pin, "Room channel removed");
        }
    }

    pub async fn subscriber_count(&self, pin: &str) -> usize {
        self.room_channels
            .read()
            .await
            .get(pin)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn test_subscribers_receive_room_events() {
        let bus = EventBus::new();
        let mut first = bus.subscribe("123456").await;
        let mut second = bus.subscribe("123456").await;

        bus.emit(RoomEvent::GameStarted {
            pin: "123456".to_string(),
        })
        .await;

        assert_eq!(first.recv().await.unwrap().event_type(), "game_started");
        assert_eq!(second.recv().await.unwrap().event_type(), "game_started");
        assert_eq!(bus.subscriber_count("123456").await, 2);
    }

    #[tokio::test]
    async fn test_events_are_scoped_to_room() {
        let bus = EventBus::new();
        let mut other = bus.subscribe("999999").await;

        bus.emit(RoomEvent::GameStarted {
            pin: "123456".to_string(),
        })
        .await;

        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remove_room_closes_subscriptions() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe("123456").await;

        bus.remove_room("123456").await;

        assert!(matches!(receiver.recv().await, Err(RecvError::Closed)));
        assert_eq!(bus.subscriber_count("123456").await, 0);
    }
}
