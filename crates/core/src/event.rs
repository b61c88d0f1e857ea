use crate::entity::EntityId;

/// Events the core publishes through the host-provided event bus. The host decides
/// what to do with them (log, forward to a UI, drive gameplay) — the core never
/// reads its own events back.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    ConnectionEstablished { entity_id: EntityId },
    ConnectionLost { reason: String, was_timeout: bool },
    PlayerJoined { entity_id: EntityId, name: String },
    PlayerLeft { entity_id: EntityId, reason: String },
    ChunkReceived { cx: i32, cz: i32 },
    ServerStarted { port: u16 },
    ServerStopped,
}

/// Host collaborator: `publish` is the only operation the core needs.
pub trait EventBus {
    fn publish(&mut self, event: GameEvent);
}

/// A minimal in-memory bus for hosts that just want to drain events each frame.
#[derive(Debug, Default)]
pub struct QueueEventBus {
    events: Vec<GameEvent>,
}

impl EventBus for QueueEventBus {
    fn publish(&mut self, event: GameEvent) {
        self.events.push(event);
    }
}

impl QueueEventBus {
    pub fn drain(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_bus_drains_in_publish_order() {
        let mut bus = QueueEventBus::default();
        bus.publish(GameEvent::ServerStarted { port: 7777 });
        bus.publish(GameEvent::ServerStopped);
        let drained = bus.drain();
        assert_eq!(drained.len(), 2);
        assert!(bus.drain().is_empty());
    }
}
