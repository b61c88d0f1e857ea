/// Stable numeric packet ids. Never renumber these; they are the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    HandshakeRequest = 0,
    HandshakeResponse = 1,
    PlayerInput = 2,
    EntitySnapshot = 3,
    ChunkData = 4,
    ChunkRequest = 5,
    PlayerJoin = 6,
    PlayerLeave = 7,
    ChatMessage = 8,
    Disconnect = 9,
    Ping = 10,
    Pong = 11,
    BlockUpdate = 12,
    PlayerSpawn = 13,
}

impl PacketType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::HandshakeRequest,
            1 => Self::HandshakeResponse,
            2 => Self::PlayerInput,
            3 => Self::EntitySnapshot,
            4 => Self::ChunkData,
            5 => Self::ChunkRequest,
            6 => Self::PlayerJoin,
            7 => Self::PlayerLeave,
            8 => Self::ChatMessage,
            9 => Self::Disconnect,
            10 => Self::Ping,
            11 => Self::Pong,
            12 => Self::BlockUpdate,
            13 => Self::PlayerSpawn,
            _ => return None,
        })
    }

    /// `(channel, reliable)` for this packet type. Senders derive framing from this
    /// table rather than callers passing reliability by hand at every send site.
    pub fn reliability(self) -> (u8, bool) {
        match self {
            Self::HandshakeRequest => (0, true),
            Self::HandshakeResponse => (0, true),
            Self::PlayerInput => (1, false),
            Self::EntitySnapshot => (1, false),
            Self::ChunkData => (0, true),
            Self::ChunkRequest => (1, false),
            Self::PlayerJoin => (0, true),
            Self::PlayerLeave => (0, true),
            Self::ChatMessage => (2, true),
            Self::Disconnect => (0, true),
            Self::Ping => (1, false),
            Self::Pong => (1, false),
            Self::BlockUpdate => (2, true),
            Self::PlayerSpawn => (0, true),
        }
    }

    pub fn channel(self) -> u8 {
        self.reliability().0
    }

    pub fn is_reliable(self) -> bool {
        self.reliability().1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_id() {
        for id in 0..14u8 {
            let ty = PacketType::from_u8(id).expect("known id");
            assert_eq!(ty as u8, id);
        }
        assert!(PacketType::from_u8(14).is_none());
    }

    #[test]
    fn reliability_matches_the_channel_table() {
        assert_eq!(PacketType::HandshakeRequest.reliability(), (0, true));
        assert_eq!(PacketType::PlayerInput.reliability(), (1, false));
        assert_eq!(PacketType::EntitySnapshot.reliability(), (1, false));
        assert_eq!(PacketType::ChatMessage.reliability(), (2, true));
        assert_eq!(PacketType::BlockUpdate.reliability(), (2, true));
        assert_eq!(PacketType::Pong.reliability(), (1, false));
    }
}
