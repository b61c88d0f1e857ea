//! Host-agnostic core: wire codec, transport, shared movement physics, and the
//! authoritative server / predicting client built on top of them. A host binary
//! supplies the world, entity store and event sink; this crate never touches a
//! socket the host didn't ask it to open, and never renders or reads local input.

pub mod chunk_transfer;
pub mod client;
pub mod codec;
pub mod config;
pub mod entity;
pub mod event;
pub mod physics;
pub mod protocol;
pub mod server;
pub mod time;
pub mod transport;
pub mod world;

pub use chunk_transfer::{split_into_fragments, FragmentAssembler};
pub use client::{Client, ClientState, InterpolatedPose};
pub use config::Configuration;
pub use entity::{
    Entity, EntityId, EntitySnapshotSample, EntityStore, SimpleEntityStore, SnapshotRing,
    ENTITY_ID_NONE,
};
pub use event::{EventBus, GameEvent, QueueEventBus};
pub use physics::{
    default_player_half_extents, integrate, is_grounded, raycast, resolve, simulate_step,
    step_up, BlockFace, CollisionResult, MovementInput, MovementMode, MovementParams,
    MovementState, PlayerBody, RaycastHit,
};
pub use protocol::{Packet, PacketHeader, PacketType, HEADER_SIZE};
pub use server::{ConnectedClient, Server};
pub use transport::{
    ConnectionState, HostEvent, NetworkHost, NetworkStats, PacketLossSimulation, PeerHandle,
    DISCONNECT_REASON_REQUESTED, DISCONNECT_REASON_TIMEOUT, NUM_CHANNELS,
};
pub use world::{
    Aabb, Block, BlockRegistry, Chunk, ChunkKey, World, WorldAccess, WorldReader, WorldWriter,
    BLOCK_EMPTY, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z, CHUNK_VOLUME,
};
