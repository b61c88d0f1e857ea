use std::collections::HashSet;

use crate::entity::EntityId;
use crate::physics::MovementMode;
use crate::protocol::InputFlags;
use crate::transport::PeerHandle;
use crate::world::ChunkKey;

/// Server-side bookkeeping for one handshaken (or handshaking) peer.
///
/// `player_entity_id` is `ENTITY_ID_NONE` until the handshake completes; everything
/// else is meaningless before that point except `peer_handle` and `connect_time_ms`.
#[derive(Debug, Clone)]
pub struct ConnectedClient {
    pub peer_handle: PeerHandle,
    pub player_entity_id: EntityId,
    pub player_name: String,
    pub last_input_sequence: u32,
    pub last_snapshot_tick: u32,
    pub loaded_chunks: HashSet<ChunkKey>,
    pub connect_time_ms: i64,

    pub(super) movement_mode: MovementMode,
    pub(super) previous_input_flags: InputFlags,
    pub(super) next_send_sequence: u32,
}

impl ConnectedClient {
    pub fn new(peer_handle: PeerHandle, connect_time_ms: i64) -> Self {
        Self {
            peer_handle,
            player_entity_id: crate::entity::ENTITY_ID_NONE,
            player_name: String::new(),
            last_input_sequence: 0,
            last_snapshot_tick: 0,
            loaded_chunks: HashSet::new(),
            connect_time_ms,
            movement_mode: MovementMode::Walking,
            previous_input_flags: InputFlags::empty(),
            next_send_sequence: 0,
        }
    }

    pub fn is_handshaken(&self) -> bool {
        self.player_entity_id != crate::entity::ENTITY_ID_NONE
    }

    pub(super) fn take_send_sequence(&mut self) -> u32 {
        let seq = self.next_send_sequence;
        self.next_send_sequence = self.next_send_sequence.wrapping_add(1);
        seq
    }

    /// Toggles walking/flying or walking/swimming on the rising edge of the
    /// corresponding input flag, then remembers `flags` for next tick's edge test.
    pub(super) fn apply_mode_toggles(&mut self, flags: InputFlags) {
        let rising = flags & !self.previous_input_flags;
        if rising.contains(InputFlags::FLY_TOGGLE) {
            self.movement_mode = if self.movement_mode == MovementMode::Flying {
                MovementMode::Walking
            } else {
                MovementMode::Flying
            };
        }
        if rising.contains(InputFlags::SWIM_TOGGLE) {
            self.movement_mode = if self.movement_mode == MovementMode::Swimming {
                MovementMode::Walking
            } else {
                MovementMode::Swimming
            };
        }
        self.previous_input_flags = flags;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fly_toggle_flips_mode_only_on_rising_edge() {
        let mut client = ConnectedClient::new(1, 0);
        assert_eq!(client.movement_mode, MovementMode::Walking);

        client.apply_mode_toggles(InputFlags::FLY_TOGGLE);
        assert_eq!(client.movement_mode, MovementMode::Flying);

        // Flag still held: no further toggle.
        client.apply_mode_toggles(InputFlags::FLY_TOGGLE);
        assert_eq!(client.movement_mode, MovementMode::Flying);

        client.apply_mode_toggles(InputFlags::empty());
        client.apply_mode_toggles(InputFlags::FLY_TOGGLE);
        assert_eq!(client.movement_mode, MovementMode::Walking);
    }
}
