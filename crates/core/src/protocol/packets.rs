use glam::{Quat, Vec3};

use crate::codec::{PacketReader, PacketWriter, DEFAULT_POSITION_PRECISION};
use crate::entity::EntityId;

use super::packet_type::PacketType;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InputFlags: u8 {
        const SPRINT = 1 << 0;
        const JUMP = 1 << 1;
        const FLY_TOGGLE = 1 << 2;
        const SWIM_TOGGLE = 1 << 3;
    }
}

const YAW_PITCH_PRECISION: f32 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeRequest {
    pub protocol_version: u32,
    pub player_name: String,
    pub client_version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeResponse {
    pub accepted: bool,
    pub player_id: EntityId,
    pub spawn: Vec3,
    pub world_seed: i64,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerInput {
    pub sequence: u32,
    pub delta_time: f32,
    pub wish_direction: Vec3,
    pub flags: InputFlags,
    pub yaw_deg: f32,
    pub pitch_deg: f32,
    pub action_flags: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityState {
    pub id: EntityId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Quat,
    pub animation_state: u8,
    pub state_flags: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub server_tick: u32,
    pub last_consumed_input_seq: u32,
    pub entities: Vec<EntityState>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkData {
    pub cx: i32,
    pub cz: i32,
    pub fragment_id: u16,
    pub is_last: bool,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkRequest {
    pub cx: i32,
    pub cz: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerJoin {
    pub player_id: EntityId,
    pub player_name: String,
    pub spawn_position: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerLeave {
    pub player_id: EntityId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub sender_id: EntityId,
    pub message: String,
    pub timestamp: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Disconnect {
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ping {
    pub client_time: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pong {
    pub client_time: u32,
    pub server_time: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockUpdate {
    pub world_x: i32,
    pub world_y: i32,
    pub world_z: i32,
    pub block_id: u16,
    pub player_id: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSpawn {
    pub player_id: EntityId,
    pub position: Vec3,
    pub rotation: Quat,
}

/// One decoded application packet, tagged by its [`PacketType`]. `serialize` writes
/// only the payload; the caller is responsible for the header (see `protocol::encode`).
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    HandshakeRequest(HandshakeRequest),
    HandshakeResponse(HandshakeResponse),
    PlayerInput(PlayerInput),
    EntitySnapshot(EntitySnapshot),
    ChunkData(ChunkData),
    ChunkRequest(ChunkRequest),
    PlayerJoin(PlayerJoin),
    PlayerLeave(PlayerLeave),
    ChatMessage(ChatMessage),
    Disconnect(Disconnect),
    Ping(Ping),
    Pong(Pong),
    BlockUpdate(BlockUpdate),
    PlayerSpawn(PlayerSpawn),
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::HandshakeRequest(_) => PacketType::HandshakeRequest,
            Self::HandshakeResponse(_) => PacketType::HandshakeResponse,
            Self::PlayerInput(_) => PacketType::PlayerInput,
            Self::EntitySnapshot(_) => PacketType::EntitySnapshot,
            Self::ChunkData(_) => PacketType::ChunkData,
            Self::ChunkRequest(_) => PacketType::ChunkRequest,
            Self::PlayerJoin(_) => PacketType::PlayerJoin,
            Self::PlayerLeave(_) => PacketType::PlayerLeave,
            Self::ChatMessage(_) => PacketType::ChatMessage,
            Self::Disconnect(_) => PacketType::Disconnect,
            Self::Ping(_) => PacketType::Ping,
            Self::Pong(_) => PacketType::Pong,
            Self::BlockUpdate(_) => PacketType::BlockUpdate,
            Self::PlayerSpawn(_) => PacketType::PlayerSpawn,
        }
    }

    pub fn write_payload(&self, writer: &mut PacketWriter) {
        match self {
            Self::HandshakeRequest(p) => {
                writer.write_u32(p.protocol_version);
                writer.write_string(&p.player_name);
                writer.write_string(&p.client_version);
            }
            Self::HandshakeResponse(p) => {
                writer.write_u8(p.accepted as u8);
                writer.write_u64(p.player_id);
                writer.write_vec3(p.spawn);
                writer.write_i64(p.world_seed);
                writer.write_string(&p.message);
            }
            Self::PlayerInput(p) => {
                writer.write_u32(p.sequence);
                writer.write_f32(p.delta_time);
                writer.write_vec3_quantized(p.wish_direction, DEFAULT_POSITION_PRECISION);
                writer.write_u8(p.flags.bits());
                writer.write_i16(crate::codec::quantize_component(
                    p.yaw_deg,
                    YAW_PITCH_PRECISION,
                ));
                writer.write_i16(crate::codec::quantize_component(
                    p.pitch_deg,
                    YAW_PITCH_PRECISION,
                ));
                writer.write_u8(p.action_flags);
            }
            Self::EntitySnapshot(p) => {
                writer.write_u32(p.server_tick);
                writer.write_u32(p.last_consumed_input_seq);
                writer.write_u16(p.entities.len() as u16);
                for e in &p.entities {
                    writer.write_u64(e.id);
                    writer.write_vec3_quantized(e.position, DEFAULT_POSITION_PRECISION);
                    writer.write_vec3_quantized(e.velocity, DEFAULT_POSITION_PRECISION);
                    writer.write_quat_compressed(e.rotation);
                    writer.write_u8(e.animation_state);
                    writer.write_u8(e.state_flags);
                }
            }
            Self::ChunkData(p) => {
                writer.write_i32(p.cx);
                writer.write_i32(p.cz);
                writer.write_u16(p.fragment_id);
                writer.write_u8(p.is_last as u8);
                writer.write_u32(p.bytes.len() as u32);
                for &b in &p.bytes {
                    writer.write_u8(b);
                }
            }
            Self::ChunkRequest(p) => {
                writer.write_i32(p.cx);
                writer.write_i32(p.cz);
            }
            Self::PlayerJoin(p) => {
                writer.write_u64(p.player_id);
                writer.write_string(&p.player_name);
                writer.write_vec3(p.spawn_position);
            }
            Self::PlayerLeave(p) => {
                writer.write_u64(p.player_id);
                writer.write_string(&p.reason);
            }
            Self::ChatMessage(p) => {
                writer.write_u64(p.sender_id);
                writer.write_string(&p.message);
                writer.write_u32(p.timestamp);
            }
            Self::Disconnect(p) => {
                writer.write_string(&p.reason);
            }
            Self::Ping(p) => {
                writer.write_u32(p.client_time);
            }
            Self::Pong(p) => {
                writer.write_u32(p.client_time);
                writer.write_u32(p.server_time);
            }
            Self::BlockUpdate(p) => {
                writer.write_i32(p.world_x);
                writer.write_i32(p.world_y);
                writer.write_i32(p.world_z);
                writer.write_u16(p.block_id);
                writer.write_u64(p.player_id);
            }
            Self::PlayerSpawn(p) => {
                writer.write_u64(p.player_id);
                writer.write_vec3(p.position);
                writer.write_quat(p.rotation);
            }
        }
    }

    pub fn read_payload(packet_type: PacketType, reader: &mut PacketReader) -> Self {
        match packet_type {
            PacketType::HandshakeRequest => Self::HandshakeRequest(HandshakeRequest {
                protocol_version: reader.read_u32(),
                player_name: reader.read_string(),
                client_version: reader.read_string(),
            }),
            PacketType::HandshakeResponse => Self::HandshakeResponse(HandshakeResponse {
                accepted: reader.read_u8() != 0,
                player_id: reader.read_u64(),
                spawn: reader.read_vec3(),
                world_seed: reader.read_i64(),
                message: reader.read_string(),
            }),
            PacketType::PlayerInput => {
                let sequence = reader.read_u32();
                let delta_time = reader.read_f32();
                let wish_direction = reader.read_vec3_quantized(DEFAULT_POSITION_PRECISION);
                let flags = InputFlags::from_bits_truncate(reader.read_u8());
                let yaw_deg =
                    crate::codec::dequantize_component(reader.read_i16(), YAW_PITCH_PRECISION);
                let pitch_deg =
                    crate::codec::dequantize_component(reader.read_i16(), YAW_PITCH_PRECISION);
                let action_flags = reader.read_u8();
                Self::PlayerInput(PlayerInput {
                    sequence,
                    delta_time,
                    wish_direction,
                    flags,
                    yaw_deg,
                    pitch_deg,
                    action_flags,
                })
            }
            PacketType::EntitySnapshot => {
                let server_tick = reader.read_u32();
                let last_consumed_input_seq = reader.read_u32();
                let count = reader.read_u16();
                let mut entities = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    entities.push(EntityState {
                        id: reader.read_u64(),
                        position: reader.read_vec3_quantized(DEFAULT_POSITION_PRECISION),
                        velocity: reader.read_vec3_quantized(DEFAULT_POSITION_PRECISION),
                        rotation: reader.read_quat_compressed(),
                        animation_state: reader.read_u8(),
                        state_flags: reader.read_u8(),
                    });
                }
                Self::EntitySnapshot(EntitySnapshot {
                    server_tick,
                    last_consumed_input_seq,
                    entities,
                })
            }
            PacketType::ChunkData => {
                let cx = reader.read_i32();
                let cz = reader.read_i32();
                let fragment_id = reader.read_u16();
                let is_last = reader.read_u8() != 0;
                let byte_count = reader.read_u32() as usize;
                let mut bytes = Vec::with_capacity(byte_count);
                for _ in 0..byte_count {
                    bytes.push(reader.read_u8());
                }
                Self::ChunkData(ChunkData {
                    cx,
                    cz,
                    fragment_id,
                    is_last,
                    bytes,
                })
            }
            PacketType::ChunkRequest => Self::ChunkRequest(ChunkRequest {
                cx: reader.read_i32(),
                cz: reader.read_i32(),
            }),
            PacketType::PlayerJoin => Self::PlayerJoin(PlayerJoin {
                player_id: reader.read_u64(),
                player_name: reader.read_string(),
                spawn_position: reader.read_vec3(),
            }),
            PacketType::PlayerLeave => Self::PlayerLeave(PlayerLeave {
                player_id: reader.read_u64(),
                reason: reader.read_string(),
            }),
            PacketType::ChatMessage => Self::ChatMessage(ChatMessage {
                sender_id: reader.read_u64(),
                message: reader.read_string(),
                timestamp: reader.read_u32(),
            }),
            PacketType::Disconnect => Self::Disconnect(Disconnect {
                reason: reader.read_string(),
            }),
            PacketType::Ping => Self::Ping(Ping {
                client_time: reader.read_u32(),
            }),
            PacketType::Pong => Self::Pong(Pong {
                client_time: reader.read_u32(),
                server_time: reader.read_u32(),
            }),
            PacketType::BlockUpdate => Self::BlockUpdate(BlockUpdate {
                world_x: reader.read_i32(),
                world_y: reader.read_i32(),
                world_z: reader.read_i32(),
                block_id: reader.read_u16(),
                player_id: reader.read_u64(),
            }),
            PacketType::PlayerSpawn => Self::PlayerSpawn(PlayerSpawn {
                player_id: reader.read_u64(),
                position: reader.read_vec3(),
                rotation: reader.read_quat(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(packet: Packet) -> Packet {
        let mut writer = PacketWriter::default();
        packet.write_payload(&mut writer);
        let bytes = writer.into_bytes();
        let mut reader = PacketReader::new(&bytes);
        Packet::read_payload(packet.packet_type(), &mut reader)
    }

    #[test]
    fn handshake_request_round_trips() {
        let packet = Packet::HandshakeRequest(HandshakeRequest {
            protocol_version: 1,
            player_name: "Notch".into(),
            client_version: "0.1.0".into(),
        });
        assert_eq!(round_trip(packet.clone()), packet);
    }

    #[test]
    fn player_input_round_trips_within_quantization() {
        let packet = Packet::PlayerInput(PlayerInput {
            sequence: 42,
            delta_time: 1.0 / 60.0,
            wish_direction: Vec3::new(1.0, 0.0, -1.0).normalize(),
            flags: InputFlags::SPRINT | InputFlags::JUMP,
            yaw_deg: 45.0,
            pitch_deg: -10.0,
            action_flags: 0b1010,
        });
        let Packet::PlayerInput(decoded) = round_trip(packet.clone()) else {
            panic!("wrong variant")
        };
        let Packet::PlayerInput(original) = packet else {
            unreachable!()
        };
        assert_eq!(decoded.sequence, original.sequence);
        assert_eq!(decoded.flags, original.flags);
        assert!((decoded.yaw_deg - original.yaw_deg).abs() < 0.02);
        assert!((decoded.pitch_deg - original.pitch_deg).abs() < 0.02);
    }

    #[test]
    fn entity_snapshot_round_trips() {
        let packet = Packet::EntitySnapshot(EntitySnapshot {
            server_tick: 100,
            last_consumed_input_seq: 99,
            entities: vec![EntityState {
                id: 7,
                position: Vec3::new(1.0, 2.0, 3.0),
                velocity: Vec3::ZERO,
                rotation: Quat::IDENTITY,
                animation_state: 1,
                state_flags: 0,
            }],
        });
        let Packet::EntitySnapshot(decoded) = round_trip(packet) else {
            panic!("wrong variant")
        };
        assert_eq!(decoded.entities.len(), 1);
        assert_eq!(decoded.entities[0].id, 7);
    }

    #[test]
    fn chunk_data_round_trips() {
        let packet = Packet::ChunkData(ChunkData {
            cx: 3,
            cz: -5,
            fragment_id: 2,
            is_last: true,
            bytes: vec![1, 2, 3, 4],
        });
        assert_eq!(round_trip(packet.clone()), packet);
    }

    #[test]
    fn every_packet_type_reports_reliability_consistent_with_the_table() {
        assert_eq!(PacketType::ChatMessage.channel(), 2);
        assert!(PacketType::ChatMessage.is_reliable());
        assert_eq!(PacketType::Ping.channel(), 1);
        assert!(!PacketType::Ping.is_reliable());
    }
}
