//! The authoritative game server: owns the transport host and per-client
//! bookkeeping, and borrows its world/entity-store/event-bus from the host for the
//! duration of each `update` call rather than owning them, per the host-provided
//! collaborator model this core is built around.

mod clients;

pub use clients::ConnectedClient;

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;

use glam::{Quat, Vec3};

use crate::chunk_transfer::split_into_fragments;
use crate::config::Configuration;
use crate::entity::{EntityId, EntityStore};
use crate::event::{EventBus, GameEvent};
use crate::physics::{default_player_half_extents, simulate_step, MovementInput, PlayerBody};
use crate::protocol::{
    self, ChunkRequest, Disconnect as DisconnectPacket, EntitySnapshot, EntityState,
    HandshakeRequest, HandshakeResponse, InputFlags, Packet, PlayerInput, PlayerJoin,
    PlayerLeave, Ping, Pong,
};
use crate::time::now_ms_i64;
use crate::transport::{
    HostEvent, NetworkHost, PeerHandle, DISCONNECT_REASON_REQUESTED, DISCONNECT_REASON_TIMEOUT,
};
use crate::world::{ChunkKey, WorldAccess, WorldReader, CHUNK_SIZE_X, CHUNK_SIZE_Z};

const CHUNK_DATA_FIXED_OVERHEAD: usize = 4 + 4 + 2 + 1 + 4;

pub struct Server<'h> {
    host: NetworkHost,
    config: Configuration,
    world: Option<&'h mut dyn WorldAccess>,
    entities: Option<&'h mut dyn EntityStore>,
    events: Option<&'h mut dyn EventBus>,
    clients: HashMap<PeerHandle, ConnectedClient>,
    server_tick: u32,
    sim_accum: f32,
    snap_accum: f32,
}

impl<'h> Server<'h> {
    pub fn new(port: u16, config: Configuration) -> io::Result<Self> {
        let host = NetworkHost::bind(("0.0.0.0", port))?;
        Ok(Self {
            host,
            config,
            world: None,
            entities: None,
            events: None,
            clients: HashMap::new(),
            server_tick: 0,
            sim_accum: 0.0,
            snap_accum: 0.0,
        })
    }

    pub fn set_world(&mut self, world: &'h mut dyn WorldAccess) {
        self.world = Some(world);
    }

    pub fn set_entities(&mut self, entities: &'h mut dyn EntityStore) {
        self.entities = Some(entities);
    }

    pub fn set_events(&mut self, events: &'h mut dyn EventBus) {
        self.events = Some(events);
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.host.local_addr()
    }

    pub fn connected_client_count(&self) -> usize {
        self.clients.values().filter(|c| c.is_handshaken()).count()
    }

    pub fn server_tick(&self) -> u32 {
        self.server_tick
    }

    pub fn network_stats(&self) -> &crate::transport::NetworkStats {
        self.host.stats()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.as_ref().map_or(0, |e| e.iter().count())
    }

    pub fn initialize(&mut self) {
        if let Some(events) = self.events.as_mut() {
            events.publish(GameEvent::ServerStarted {
                port: self.host.local_addr().port(),
            });
        }
    }

    pub fn shutdown(&mut self) {
        let peers: Vec<PeerHandle> = self.clients.keys().copied().collect();
        for peer in peers {
            self.disconnect_client(peer, "server shutting down".to_string());
        }
        if let Some(events) = self.events.as_mut() {
            events.publish(GameEvent::ServerStopped);
        }
    }

    /// Drains transport events, advances the fixed-rate simulation and snapshot
    /// clocks, and recomputes each client's desired chunk set. Call once per host
    /// loop iteration with the real elapsed time.
    pub fn update(&mut self, dt: f32) {
        let transport_events = self.host.service();
        for event in transport_events {
            self.handle_transport_event(event);
        }

        self.sim_accum += dt;
        let tick_dt = 1.0 / self.config.simulation_tick_rate as f32;
        while self.sim_accum >= tick_dt {
            self.sim_accum -= tick_dt;
            self.server_tick = self.server_tick.wrapping_add(1);
        }

        self.snap_accum += dt;
        let snap_dt = 1.0 / self.config.snapshot_rate as f32;
        if self.snap_accum >= snap_dt {
            self.snap_accum -= snap_dt;
            self.broadcast_snapshots();
        }

        self.stream_chunks();
    }

    fn handle_transport_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Connect { peer } => {
                self.clients
                    .entry(peer)
                    .or_insert_with(|| ConnectedClient::new(peer, now_ms_i64()));
            }
            HostEvent::Disconnect { peer, reason_code } => {
                self.drop_client(peer, reason_code == DISCONNECT_REASON_TIMEOUT);
            }
            HostEvent::Receive {
                peer,
                channel: _,
                bytes,
            } => match protocol::decode(&bytes) {
                Ok((_, packet)) => self.handle_packet(peer, packet),
                Err(_) => log::warn!("dropped malformed datagram from peer {peer}"),
            },
        }
    }

    fn handle_packet(&mut self, peer: PeerHandle, packet: Packet) {
        match packet {
            Packet::HandshakeRequest(p) => self.handle_handshake_request(peer, p),
            Packet::PlayerInput(p) => self.handle_player_input(peer, p),
            Packet::ChunkRequest(p) => self.handle_chunk_request(peer, p),
            Packet::Ping(p) => self.handle_ping(peer, p),
            Packet::Disconnect(p) => self.handle_disconnect_packet(peer, p),
            Packet::ChatMessage(p) => self.handle_chat_message(peer, p),
            // BlockUpdate, PlayerJoin/Leave, HandshakeResponse, EntitySnapshot,
            // ChunkData and PlayerSpawn are server-to-client only; Pong is never
            // sent by a well-behaved client.
            _ => {}
        }
    }

    fn handle_handshake_request(&mut self, peer: PeerHandle, request: HandshakeRequest) {
        self.clients
            .entry(peer)
            .or_insert_with(|| ConnectedClient::new(peer, now_ms_i64()));

        if request.player_name.trim().is_empty() {
            self.reject_handshake(peer, "player name must not be empty".to_string());
            return;
        }
        if request.protocol_version != self.config.protocol_version {
            self.reject_handshake(
                peer,
                format!(
                    "protocol version mismatch: server expects {}",
                    self.config.protocol_version
                ),
            );
            return;
        }
        let handshaken = self.clients.values().filter(|c| c.is_handshaken()).count();
        if handshaken >= self.config.max_clients {
            self.reject_handshake(peer, "server is full".to_string());
            return;
        }

        let Some(entities) = self.entities.as_deref_mut() else {
            return;
        };
        let entity_name = format!("Player:{}", request.player_name);
        let entity_id = entities.create(&entity_name, self.config.spawn_position);

        let client = self.clients.get_mut(&peer).expect("inserted above");
        client.player_entity_id = entity_id;
        client.player_name = request.player_name.clone();

        self.send_to(
            peer,
            Packet::HandshakeResponse(HandshakeResponse {
                accepted: true,
                player_id: entity_id,
                spawn: self.config.spawn_position,
                world_seed: self.config.world_seed,
                message: "welcome".to_string(),
            }),
        );

        if let Some(events) = self.events.as_mut() {
            events.publish(GameEvent::ConnectionEstablished { entity_id });
            events.publish(GameEvent::PlayerJoined {
                entity_id,
                name: request.player_name.clone(),
            });
        }

        let join = Packet::PlayerJoin(PlayerJoin {
            player_id: entity_id,
            player_name: request.player_name,
            spawn_position: self.config.spawn_position,
        });
        let others: Vec<PeerHandle> = self
            .clients
            .iter()
            .filter(|&(&p, ref c)| p != peer && c.is_handshaken())
            .map(|(&p, _)| p)
            .collect();
        for other in others {
            self.send_to(other, join.clone());
        }
    }

    fn reject_handshake(&mut self, peer: PeerHandle, message: String) {
        self.send_to(
            peer,
            Packet::HandshakeResponse(HandshakeResponse {
                accepted: false,
                player_id: 0,
                spawn: Vec3::ZERO,
                world_seed: 0,
                message,
            }),
        );
        self.disconnect_client(peer, "handshake rejected".to_string());
    }

    fn handle_player_input(&mut self, peer: PeerHandle, input: PlayerInput) {
        let Some(client) = self.clients.get_mut(&peer) else {
            return;
        };
        if !client.is_handshaken() {
            return;
        }

        if crate::transport::sequence_greater_than(input.sequence, client.last_input_sequence)
            || client.last_input_sequence == 0
        {
            client.last_input_sequence = input.sequence;
        }
        client.apply_mode_toggles(input.flags);
        let mode = client.movement_mode;
        let entity_id = client.player_entity_id;

        let Some(entities) = self.entities.as_deref_mut() else {
            return;
        };
        let Some(entity) = entities.get_mut(entity_id) else {
            return;
        };
        let Some(world) = self.world.as_deref() else {
            return;
        };
        let world: &dyn WorldReader = world;

        let half_extents = default_player_half_extents();
        let body = PlayerBody {
            position: entity.position,
            velocity: entity.velocity,
            half_extents,
        };
        let feet = body.position - Vec3::new(0.0, half_extents.y, 0.0);
        let in_water = world.is_fluid(
            feet.x.floor() as i32,
            feet.y.floor() as i32,
            feet.z.floor() as i32,
        );

        let movement_input = MovementInput {
            wish_dir: input.wish_direction,
            wish_sprint: input.flags.contains(InputFlags::SPRINT),
            wish_jump: input.flags.contains(InputFlags::JUMP),
        };

        let dt = input.delta_time.max(0.0);
        let next = simulate_step(
            body,
            &movement_input,
            mode,
            in_water,
            &self.config.movement,
            world,
            dt,
        );
        entity.position = next.position;
        entity.velocity = next.velocity;
        entity.rotation = Quat::from_euler(
            glam::EulerRot::YXZ,
            input.yaw_deg.to_radians(),
            input.pitch_deg.to_radians(),
            0.0,
        );
    }

    fn handle_chunk_request(&mut self, peer: PeerHandle, request: ChunkRequest) {
        let Some(client) = self.clients.get(&peer) else {
            return;
        };
        if !client.is_handshaken() {
            return;
        }
        self.send_chunk(peer, request.cx, request.cz);
    }

    fn handle_ping(&mut self, peer: PeerHandle, ping: Ping) {
        // Same tick-relative clock `EntitySnapshot` samples are stamped in (see
        // `Client::tick_to_wall_ms`), not the Unix epoch, so a client's estimated
        // server time can be compared directly against its snapshot buffer.
        let server_time = (self.server_tick as u64 * 1000
            / self.config.simulation_tick_rate.max(1) as u64) as u32;
        self.send_to(
            peer,
            Packet::Pong(Pong {
                client_time: ping.client_time,
                server_time,
            }),
        );
    }

    fn handle_disconnect_packet(&mut self, peer: PeerHandle, _packet: DisconnectPacket) {
        self.disconnect_client(peer, "client disconnected".to_string());
    }

    fn handle_chat_message(&mut self, peer: PeerHandle, packet: crate::protocol::ChatMessage) {
        let Some(client) = self.clients.get(&peer) else {
            return;
        };
        if !client.is_handshaken() {
            return;
        }
        let relay = Packet::ChatMessage(packet);
        let recipients: Vec<PeerHandle> = self
            .clients
            .iter()
            .filter(|(_, c)| c.is_handshaken())
            .map(|(&p, _)| p)
            .collect();
        for recipient in recipients {
            self.send_to(recipient, relay.clone());
        }
    }

    /// Notifies every handshaken client that a block changed. Not driven by any
    /// client packet — the host calls this after it mutates the world directly.
    pub fn broadcast_block_update(
        &mut self,
        world_x: i32,
        world_y: i32,
        world_z: i32,
        block_id: u16,
        player_id: EntityId,
    ) {
        let packet = Packet::BlockUpdate(crate::protocol::BlockUpdate {
            world_x,
            world_y,
            world_z,
            block_id,
            player_id,
        });
        let recipients: Vec<PeerHandle> = self
            .clients
            .iter()
            .filter(|(_, c)| c.is_handshaken())
            .map(|(&p, _)| p)
            .collect();
        for recipient in recipients {
            self.send_to(recipient, packet.clone());
        }
    }

    fn disconnect_client(&mut self, peer: PeerHandle, reason: String) {
        self.remove_client(peer, reason);
        self.host.disconnect(peer, DISCONNECT_REASON_REQUESTED);
    }

    fn drop_client(&mut self, peer: PeerHandle, was_timeout: bool) {
        let reason = if was_timeout {
            "connection timed out".to_string()
        } else {
            "disconnected".to_string()
        };
        if let Some(events) = self.events.as_mut() {
            events.publish(GameEvent::ConnectionLost {
                reason: reason.clone(),
                was_timeout,
            });
        }
        self.remove_client(peer, reason);
    }

    fn remove_client(&mut self, peer: PeerHandle, reason: String) {
        let Some(client) = self.clients.remove(&peer) else {
            return;
        };
        if !client.is_handshaken() {
            return;
        }
        if let Some(entities) = self.entities.as_deref_mut() {
            entities.destroy(client.player_entity_id);
        }
        if let Some(events) = self.events.as_mut() {
            events.publish(GameEvent::PlayerLeft {
                entity_id: client.player_entity_id,
                reason: reason.clone(),
            });
        }
        let leave = Packet::PlayerLeave(PlayerLeave {
            player_id: client.player_entity_id,
            reason,
        });
        let others: Vec<PeerHandle> = self.clients.keys().copied().collect();
        for other in others {
            self.send_to(other, leave.clone());
        }
    }

    fn broadcast_snapshots(&mut self) {
        let Some(entities) = self.entities.as_deref() else {
            return;
        };
        let states: Vec<EntityState> = entities
            .iter()
            .map(|e| EntityState {
                id: e.id,
                position: e.position,
                velocity: e.velocity,
                rotation: e.rotation,
                animation_state: e.animation_state,
                state_flags: e.state_flags,
            })
            .collect();

        let recipients: Vec<(PeerHandle, u32)> = self
            .clients
            .iter()
            .filter(|(_, c)| c.is_handshaken())
            .map(|(&p, c)| (p, c.last_input_sequence))
            .collect();

        let tick = self.server_tick;
        for (peer, last_consumed) in recipients {
            let snapshot = EntitySnapshot {
                server_tick: tick,
                last_consumed_input_seq: last_consumed,
                entities: states.clone(),
            };
            self.send_to(peer, Packet::EntitySnapshot(snapshot));
            if let Some(client) = self.clients.get_mut(&peer) {
                client.last_snapshot_tick = tick;
            }
        }
    }

    fn stream_chunks(&mut self) {
        let Some(entities) = self.entities.as_deref() else {
            return;
        };
        let render_distance = self.config.render_distance;
        let targets: Vec<(PeerHandle, HashSet<ChunkKey>)> = self
            .clients
            .iter()
            .filter(|(_, c)| c.is_handshaken())
            .filter_map(|(&peer, c)| {
                entities.get(c.player_entity_id).map(|e| {
                    let cx = (e.position.x / CHUNK_SIZE_X as f32).floor() as i32;
                    let cz = (e.position.z / CHUNK_SIZE_Z as f32).floor() as i32;
                    let mut desired = HashSet::new();
                    for dx in -render_distance..=render_distance {
                        for dz in -render_distance..=render_distance {
                            desired.insert((cx + dx, cz + dz));
                        }
                    }
                    (peer, desired)
                })
            })
            .collect();

        for (peer, desired) in targets {
            let already = self
                .clients
                .get(&peer)
                .map(|c| c.loaded_chunks.clone())
                .unwrap_or_default();

            for key in desired.difference(&already) {
                self.send_chunk(peer, key.0, key.1);
            }

            if let Some(client) = self.clients.get_mut(&peer) {
                for key in already.difference(&desired) {
                    client.loaded_chunks.remove(key);
                }
            }
        }
    }

    fn send_chunk(&mut self, peer: PeerHandle, cx: i32, cz: i32) {
        let Some(world) = self.world.as_deref() else {
            return;
        };
        let Some(chunk) = world.get_chunk(cx, cz) else {
            return;
        };
        let encoded = chunk.encode_rle();
        let max_fragment = self.max_fragment_payload();
        let fragments = split_into_fragments(cx, cz, &encoded, max_fragment);
        for fragment in fragments {
            self.send_to(peer, Packet::ChunkData(fragment));
        }
        if let Some(client) = self.clients.get_mut(&peer) {
            client.loaded_chunks.insert((cx, cz));
        }
    }

    fn max_fragment_payload(&self) -> usize {
        self.config
            .max_packet_size
            .saturating_sub(protocol::HEADER_SIZE + CHUNK_DATA_FIXED_OVERHEAD)
            .max(1)
    }

    fn send_to(&mut self, peer: PeerHandle, packet: Packet) {
        let sequence = self
            .clients
            .get_mut(&peer)
            .map(|c| c.take_send_sequence())
            .unwrap_or(0);
        let channel = packet.packet_type().channel();
        let bytes = protocol::encode(&packet, sequence, crate::time::now_ms());
        let _ = self.host.send(peer, channel, &bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SimpleEntityStore;
    use crate::event::QueueEventBus;
    use crate::world::{BlockRegistry, World};

    #[test]
    fn rejects_handshake_with_empty_player_name() {
        let mut server = Server::new(0, Configuration::default()).expect("bind");
        let mut world = World::new(BlockRegistry::default());
        let mut entities = SimpleEntityStore::default();
        let mut events = QueueEventBus::default();
        server.set_world(&mut world);
        server.set_entities(&mut entities);
        server.set_events(&mut events);

        server.handle_handshake_request(
            1,
            HandshakeRequest {
                protocol_version: 1,
                player_name: "   ".to_string(),
                client_version: "1.0".to_string(),
            },
        );

        assert_eq!(server.connected_client_count(), 0);
    }

    #[test]
    fn accepted_handshake_spawns_an_entity_and_publishes_events() {
        let mut server = Server::new(0, Configuration::default()).expect("bind");
        let mut world = World::new(BlockRegistry::default());
        let mut entities = SimpleEntityStore::default();
        let mut events = QueueEventBus::default();
        server.set_world(&mut world);
        server.set_entities(&mut entities);
        server.set_events(&mut events);

        server.handle_handshake_request(
            7,
            HandshakeRequest {
                protocol_version: 1,
                player_name: "Notch".to_string(),
                client_version: "1.0".to_string(),
            },
        );

        assert_eq!(server.connected_client_count(), 1);
        assert!(server.clients.get(&7).unwrap().is_handshaken());
    }
}
