//! The predicting client: sends local input immediately, simulates it the same way
//! the server will, and reconciles against the server's periodic `EntitySnapshot`.
//! Remote entities are never simulated locally — they're interpolated from a buffer
//! of received snapshots, delayed by `interpolation_delay_ms` so a bracketing pair is
//! almost always available.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;

use glam::{Quat, Vec3};

use crate::chunk_transfer::FragmentAssembler;
use crate::config::Configuration;
use crate::entity::{EntityId, EntitySnapshotSample, SnapshotRing, ENTITY_ID_NONE};
use crate::event::{EventBus, GameEvent};
use crate::physics::{
    default_player_half_extents, simulate_step, MovementInput, MovementMode, PlayerBody,
};
use crate::protocol::{
    self, BlockUpdate, ChatMessage, ChunkRequest, Disconnect as DisconnectPacket, EntitySnapshot,
    HandshakeRequest, HandshakeResponse, InputFlags, Packet, Ping, PlayerInput, Pong,
};
use crate::time::now_ms;
use crate::transport::{HostEvent, NetworkHost, PeerHandle, DISCONNECT_REASON_REQUESTED};
use crate::world::{WorldAccess, WorldReader, CHUNK_SIZE_Y};

const CLIENT_VERSION: &str = "1.0.0";

/// Connection lifecycle state, mirrored from the data model's state diagram. The
/// transport's own `ConnectionState` only knows about the UDP handshake; this adds
/// the application-level handshake on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// One remote entity's interpolated pose at a given render time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolatedPose {
    pub position: Vec3,
    pub rotation: Quat,
    pub animation_state: u8,
}

pub struct Client<'h> {
    host: NetworkHost,
    peer: Option<PeerHandle>,
    config: Configuration,
    player_name: String,
    state: ClientState,

    local_player_id: EntityId,
    predicted_body: PlayerBody,
    local_rotation: Quat,
    movement_mode: MovementMode,
    previous_input_flags: InputFlags,

    next_input_sequence: u32,
    input_buffer: VecDeque<PlayerInput>,
    next_send_sequence: u32,

    server_time_offset_ms: f64,
    ping_accum_secs: f32,

    remote_entities: HashMap<EntityId, SnapshotRing>,
    fragment_assembler: FragmentAssembler,
    pending_chat: VecDeque<(EntityId, String)>,

    world: Option<&'h mut dyn WorldAccess>,
    events: Option<&'h mut dyn EventBus>,
}

impl<'h> Client<'h> {
    pub fn new(player_name: String, config: Configuration) -> std::io::Result<Self> {
        let host = NetworkHost::bind(("0.0.0.0", 0))?;
        Ok(Self {
            host,
            peer: None,
            config,
            player_name,
            state: ClientState::Disconnected,

            local_player_id: ENTITY_ID_NONE,
            predicted_body: PlayerBody {
                position: Vec3::ZERO,
                velocity: Vec3::ZERO,
                half_extents: default_player_half_extents(),
            },
            local_rotation: Quat::IDENTITY,
            movement_mode: MovementMode::Walking,
            previous_input_flags: InputFlags::empty(),

            next_input_sequence: 0,
            input_buffer: VecDeque::new(),
            next_send_sequence: 0,

            server_time_offset_ms: 0.0,
            ping_accum_secs: 0.0,

            remote_entities: HashMap::new(),
            fragment_assembler: FragmentAssembler::default(),
            pending_chat: VecDeque::new(),

            world: None,
            events: None,
        })
    }

    pub fn set_world(&mut self, world: &'h mut dyn WorldAccess) {
        self.world = Some(world);
    }

    pub fn set_events(&mut self, events: &'h mut dyn EventBus) {
        self.events = Some(events);
    }

    pub fn world(&self) -> Option<&dyn WorldAccess> {
        self.world.as_deref()
    }

    pub fn connection_state(&self) -> ClientState {
        self.state
    }

    pub fn local_player_id(&self) -> EntityId {
        self.local_player_id
    }

    pub fn predicted_position(&self) -> Vec3 {
        self.predicted_body.position
    }

    pub fn predicted_velocity(&self) -> Vec3 {
        self.predicted_body.velocity
    }

    pub fn predicted_rotation(&self) -> Quat {
        self.local_rotation
    }

    pub fn ping_ms(&self) -> f32 {
        self.peer.map(|p| self.host.ping_ms(p)).unwrap_or(0.0)
    }

    /// Local estimate of the server's current wall clock, smoothed over many pings.
    /// This is the same tick-relative clock `EntitySnapshot` samples are stamped in
    /// (see `tick_to_wall_ms`), not the Unix epoch, so it compares directly against
    /// `SnapshotRing` entries.
    pub fn estimated_server_time_ms(&self) -> i64 {
        now_ms() as i64 + self.server_time_offset_ms.round() as i64
    }

    pub fn drain_chat(&mut self) -> Vec<(EntityId, String)> {
        self.pending_chat.drain(..).collect()
    }

    pub fn remote_entity_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.remote_entities.keys()
    }

    /// Interpolated pose for a remote entity at `render_time_ms`, usually
    /// `estimated_server_time_ms() - config.interpolation_delay_ms`. Clamps to the
    /// oldest/newest buffered sample when `render_time_ms` falls outside the buffer.
    pub fn interpolated_pose(&self, entity_id: EntityId, render_time_ms: i64) -> Option<InterpolatedPose> {
        let ring = self.remote_entities.get(&entity_id)?;
        if let Some((a, b)) = ring.bracket(render_time_ms) {
            let span = (b.wall_ms - a.wall_ms).max(1) as f32;
            let alpha = ((render_time_ms - a.wall_ms) as f32 / span).clamp(0.0, 1.0);
            return Some(InterpolatedPose {
                position: a.position.lerp(b.position, alpha),
                rotation: a.rotation.slerp(b.rotation, alpha),
                animation_state: if alpha < 0.5 {
                    a.animation_state
                } else {
                    b.animation_state
                },
            });
        }
        let sample = if render_time_ms <= ring.earliest()?.wall_ms {
            ring.earliest()?
        } else {
            ring.latest()?
        };
        Some(InterpolatedPose {
            position: sample.position,
            rotation: sample.rotation,
            animation_state: sample.animation_state,
        })
    }

    /// Dials `address:port` and sends the initial handshake request. Legal only from
    /// `Disconnected`; a no-op otherwise so a host can call it defensively.
    pub fn connect(&mut self, address: &str, port: u16) -> std::io::Result<()> {
        if self.state != ClientState::Disconnected {
            return Ok(());
        }
        let addr: SocketAddr = format!("{address}:{port}")
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{e}")))?;

        self.next_input_sequence = 0;
        self.input_buffer.clear();
        self.remote_entities.clear();

        let peer = self.host.connect(addr);
        self.peer = Some(peer);
        self.state = ClientState::Connecting;

        self.send_to(Packet::HandshakeRequest(HandshakeRequest {
            protocol_version: self.config.protocol_version,
            player_name: self.player_name.clone(),
            client_version: CLIENT_VERSION.to_string(),
        }));
        Ok(())
    }

    /// Graceful disconnect: sends a `Disconnect` packet (best-effort, no flush wait)
    /// before tearing down. Idempotent.
    pub fn disconnect(&mut self, reason: String) {
        if self.state == ClientState::Disconnected {
            return;
        }
        if self.state == ClientState::Connected {
            self.state = ClientState::Disconnecting;
            self.send_to(Packet::Disconnect(DisconnectPacket { reason }));
        }
        self.disconnect_now();
    }

    /// Immediate teardown, skipping the farewell packet.
    pub fn disconnect_now(&mut self) {
        if let Some(peer) = self.peer.take() {
            self.host.disconnect(peer, DISCONNECT_REASON_REQUESTED);
        }
        self.state = ClientState::Disconnected;
        self.local_player_id = ENTITY_ID_NONE;
        self.input_buffer.clear();
        self.remote_entities.clear();
    }

    /// Drains transport events, sends a periodic ping, and evicts stale chunk
    /// fragment buffers. Call once per host frame with the real elapsed time.
    pub fn update(&mut self, dt: f32) {
        let transport_events = self.host.service();
        for event in transport_events {
            self.handle_transport_event(event);
        }

        self.fragment_assembler.evict_expired();

        if self.state == ClientState::Connected {
            self.ping_accum_secs += dt;
            let interval = self.config.ping_interval_ms as f32 / 1000.0;
            if self.ping_accum_secs >= interval {
                self.ping_accum_secs -= interval;
                self.send_to(Packet::Ping(Ping {
                    client_time: now_ms(),
                }));
            }
        }
    }

    /// Feeds host-gathered input for this tick: predicts locally, buffers it for
    /// reconciliation replay, and sends it to the server. `input.sequence` is
    /// overwritten; the caller doesn't need to track it.
    pub fn send_input(&mut self, mut input: PlayerInput) {
        if self.state != ClientState::Connected {
            return;
        }
        input.sequence = self.next_input_sequence;
        self.next_input_sequence = self.next_input_sequence.wrapping_add(1);

        self.apply_mode_toggles(input.flags);
        self.local_rotation = Quat::from_euler(
            glam::EulerRot::YXZ,
            input.yaw_deg.to_radians(),
            input.pitch_deg.to_radians(),
            0.0,
        );

        if let Some(world) = self.world.as_deref() {
            let world: &dyn WorldReader = world;
            self.predicted_body = step_once(
                self.predicted_body,
                &input,
                self.movement_mode,
                world,
                &self.config.movement,
            );
        }

        self.input_buffer.push_back(input);
        if self.input_buffer.len() > self.config.input_buffer_capacity {
            self.input_buffer.pop_front();
        }

        self.send_to(Packet::PlayerInput(input));
    }

    pub fn request_chunk(&mut self, cx: i32, cz: i32) {
        if self.state != ClientState::Connected {
            return;
        }
        self.send_to(Packet::ChunkRequest(ChunkRequest { cx, cz }));
    }

    pub fn send_chat(&mut self, message: String) {
        if self.state != ClientState::Connected {
            return;
        }
        self.send_to(Packet::ChatMessage(ChatMessage {
            sender_id: self.local_player_id,
            message,
            timestamp: now_ms(),
        }));
    }

    fn apply_mode_toggles(&mut self, flags: InputFlags) {
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

    fn handle_transport_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Connect { .. } => {
                // The application only considers itself Connected once the
                // handshake response accepts us, not on the bare UDP round trip.
            }
            HostEvent::Disconnect { reason_code, .. } => {
                if let Some(events) = self.events.as_mut() {
                    events.publish(GameEvent::ConnectionLost {
                        reason: "transport disconnected".to_string(),
                        was_timeout: reason_code == crate::transport::DISCONNECT_REASON_TIMEOUT,
                    });
                }
                self.disconnect_now();
            }
            HostEvent::Receive { bytes, .. } => match protocol::decode(&bytes) {
                Ok((_, packet)) => self.handle_packet(packet),
                Err(_) => log::warn!("dropped malformed datagram from server"),
            },
        }
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::HandshakeResponse(p) => self.handle_handshake_response(p),
            Packet::EntitySnapshot(p) => self.handle_entity_snapshot(p),
            Packet::ChunkData(fragment) => {
                let (cx, cz) = (fragment.cx, fragment.cz);
                if let Some(chunk) = self.fragment_assembler.accept(&fragment) {
                    if let Some(world) = self.world.as_deref_mut() {
                        *world.get_or_create_chunk(cx, cz) = chunk;
                    }
                    if let Some(events) = self.events.as_mut() {
                        events.publish(GameEvent::ChunkReceived { cx, cz });
                    }
                }
            }
            Packet::Pong(p) => self.handle_pong(p),
            Packet::PlayerJoin(p) => {
                if let Some(events) = self.events.as_mut() {
                    events.publish(GameEvent::PlayerJoined {
                        entity_id: p.player_id,
                        name: p.player_name,
                    });
                }
            }
            Packet::PlayerLeave(p) => {
                self.remote_entities.remove(&p.player_id);
                if let Some(events) = self.events.as_mut() {
                    events.publish(GameEvent::PlayerLeft {
                        entity_id: p.player_id,
                        reason: p.reason,
                    });
                }
            }
            Packet::ChatMessage(p) => self.pending_chat.push_back((p.sender_id, p.message)),
            Packet::BlockUpdate(p) => self.apply_block_update(p),
            // HandshakeRequest, PlayerInput, ChunkRequest and Disconnect are
            // client-to-server only; Ping and PlayerSpawn aren't produced by this
            // server implementation's reply path.
            _ => {}
        }
    }

    fn handle_handshake_response(&mut self, response: HandshakeResponse) {
        if !response.accepted {
            log::warn!("handshake rejected: {}", response.message);
            self.disconnect_now();
            return;
        }
        self.local_player_id = response.player_id;
        self.predicted_body.position = response.spawn;
        self.predicted_body.velocity = Vec3::ZERO;
        self.state = ClientState::Connected;
        if let Some(events) = self.events.as_mut() {
            events.publish(GameEvent::ConnectionEstablished {
                entity_id: response.player_id,
            });
        }
    }

    fn handle_entity_snapshot(&mut self, snapshot: EntitySnapshot) {
        let mut local_position = None;
        for e in &snapshot.entities {
            if e.id == self.local_player_id {
                local_position = Some(e.position);
                continue;
            }
            let wall_ms = self.tick_to_wall_ms(snapshot.server_tick);
            self.remote_entities
                .entry(e.id)
                .or_default()
                .push(EntitySnapshotSample {
                    server_tick: snapshot.server_tick,
                    wall_ms,
                    position: e.position,
                    velocity: e.velocity,
                    rotation: e.rotation,
                    animation_state: e.animation_state,
                });
        }

        match local_position {
            Some(position) => self.reconcile(position, snapshot.last_consumed_input_seq),
            None => self.input_buffer.retain(|input| {
                crate::transport::sequence_greater_than(
                    input.sequence,
                    snapshot.last_consumed_input_seq,
                )
            }),
        }
    }

    fn tick_to_wall_ms(&self, tick: u32) -> i64 {
        (tick as i64 * 1000) / self.config.simulation_tick_rate.max(1) as i64
    }

    /// Snaps or eases toward the authoritative position (depending on how far the
    /// prediction drifted), drops acknowledged inputs, then replays whatever's left
    /// from the corrected base so prediction doesn't regress on the next frame.
    fn reconcile(&mut self, server_position: Vec3, last_consumed: u32) {
        let error = server_position - self.predicted_body.position;
        if error.length() > self.config.prediction_error_threshold {
            self.predicted_body.position = server_position;
        } else {
            self.predicted_body.position += error * self.config.prediction_correction_factor;
        }

        self.input_buffer.retain(|input| {
            crate::transport::sequence_greater_than(input.sequence, last_consumed)
        });

        let Some(world) = self.world.as_deref() else {
            return;
        };
        let world: &dyn WorldReader = world;
        let mode = self.movement_mode;
        let mut body = self.predicted_body;
        for input in self.input_buffer.iter() {
            body = step_once(body, input, mode, world, &self.config.movement);
        }
        self.predicted_body = body;
    }

    fn handle_pong(&mut self, pong: Pong) {
        let now = now_ms() as i64;
        let rtt = (now - pong.client_time as i64).max(0);
        let estimated_server_now = pong.server_time as i64 - rtt / 2;
        let offset = estimated_server_now as f64 - now as f64;
        self.server_time_offset_ms = 0.9 * self.server_time_offset_ms + 0.1 * offset;
    }

    fn apply_block_update(&mut self, update: BlockUpdate) {
        if !(0..CHUNK_SIZE_Y).contains(&update.world_y) {
            return;
        }
        let Some(world) = self.world.as_deref_mut() else {
            return;
        };
        let cx = update.world_x.div_euclid(crate::world::CHUNK_SIZE_X);
        let cz = update.world_z.div_euclid(crate::world::CHUNK_SIZE_Z);
        let lx = update.world_x.rem_euclid(crate::world::CHUNK_SIZE_X);
        let lz = update.world_z.rem_euclid(crate::world::CHUNK_SIZE_Z);
        world
            .get_or_create_chunk(cx, cz)
            .set_block(lx, update.world_y, lz, update.block_id);
    }

    fn send_to(&mut self, packet: Packet) {
        let Some(peer) = self.peer else { return };
        let sequence = self.next_send_sequence;
        self.next_send_sequence = self.next_send_sequence.wrapping_add(1);
        let channel = packet.packet_type().channel();
        let bytes = protocol::encode(&packet, sequence, now_ms());
        let _ = self.host.send(peer, channel, &bytes);
    }
}

fn step_once(
    body: PlayerBody,
    input: &PlayerInput,
    mode: MovementMode,
    world: &dyn WorldReader,
    params: &crate::physics::MovementParams,
) -> PlayerBody {
    let feet = body.position - Vec3::new(0.0, body.half_extents.y, 0.0);
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
    simulate_step(
        body,
        &movement_input,
        mode,
        in_water,
        params,
        world,
        input.delta_time.max(0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::QueueEventBus;
    use crate::protocol::EntityState;
    use crate::world::{BlockRegistry, World};

    #[test]
    fn handshake_response_transitions_to_connected_and_adopts_spawn() {
        let mut client = Client::new("Notch".to_string(), Configuration::default()).expect("bind");
        let mut events = QueueEventBus::default();
        client.set_events(&mut events);
        client.state = ClientState::Connecting;

        client.handle_handshake_response(HandshakeResponse {
            accepted: true,
            player_id: 42,
            spawn: Vec3::new(1.0, 2.0, 3.0),
            world_seed: 0,
            message: "welcome".to_string(),
        });

        assert_eq!(client.connection_state(), ClientState::Connected);
        assert_eq!(client.local_player_id(), 42);
        assert_eq!(client.predicted_position(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn rejected_handshake_resets_to_disconnected() {
        let mut client = Client::new("Notch".to_string(), Configuration::default()).expect("bind");
        client.state = ClientState::Connecting;
        client.handle_handshake_response(HandshakeResponse {
            accepted: false,
            player_id: 0,
            spawn: Vec3::ZERO,
            world_seed: 0,
            message: "name taken".to_string(),
        });
        assert_eq!(client.connection_state(), ClientState::Disconnected);
    }

    #[test]
    fn large_reconcile_error_snaps_instead_of_easing() {
        let mut client = Client::new("Notch".to_string(), Configuration::default()).expect("bind");
        let mut world = World::new(BlockRegistry::default());
        client.set_world(&mut world);
        client.local_player_id = 1;
        client.predicted_body.position = Vec3::ZERO;

        client.reconcile(Vec3::new(100.0, 0.0, 0.0), 0);

        assert_eq!(client.predicted_body.position, Vec3::new(100.0, 0.0, 0.0));
    }

    #[test]
    fn small_reconcile_error_eases_towards_server_position() {
        let mut client = Client::new("Notch".to_string(), Configuration::default()).expect("bind");
        let mut world = World::new(BlockRegistry::default());
        client.set_world(&mut world);
        client.local_player_id = 1;
        client.predicted_body.position = Vec3::ZERO;

        client.reconcile(Vec3::new(0.1, 0.0, 0.0), 0);

        assert!(client.predicted_body.position.x > 0.0);
        assert!(client.predicted_body.position.x < 0.1);
    }

    #[test]
    fn fly_toggle_flips_mode_only_on_rising_edge() {
        let mut client = Client::new("Notch".to_string(), Configuration::default()).expect("bind");
        client.apply_mode_toggles(InputFlags::FLY_TOGGLE);
        assert_eq!(client.movement_mode, MovementMode::Flying);
        client.apply_mode_toggles(InputFlags::FLY_TOGGLE);
        assert_eq!(client.movement_mode, MovementMode::Flying);
        client.apply_mode_toggles(InputFlags::empty());
        client.apply_mode_toggles(InputFlags::FLY_TOGGLE);
        assert_eq!(client.movement_mode, MovementMode::Walking);
    }

    #[test]
    fn interpolated_pose_lerps_between_bracketing_snapshots() {
        let mut client = Client::new("Notch".to_string(), Configuration::default()).expect("bind");
        client.local_player_id = 1;
        let tick_rate = client.config.simulation_tick_rate;

        client.handle_entity_snapshot(EntitySnapshot {
            server_tick: 0,
            last_consumed_input_seq: 0,
            entities: vec![EntityState {
                id: 2,
                position: Vec3::new(0.0, 0.0, 0.0),
                velocity: Vec3::ZERO,
                rotation: Quat::IDENTITY,
                animation_state: 0,
                state_flags: 0,
            }],
        });
        client.handle_entity_snapshot(EntitySnapshot {
            server_tick: tick_rate,
            last_consumed_input_seq: 0,
            entities: vec![EntityState {
                id: 2,
                position: Vec3::new(10.0, 0.0, 0.0),
                velocity: Vec3::ZERO,
                rotation: Quat::IDENTITY,
                animation_state: 0,
                state_flags: 0,
            }],
        });

        // Halfway between tick 0 (wall_ms 0) and tick `tick_rate` (wall_ms 1000).
        let pose = client.interpolated_pose(2, 500).expect("bracketing samples exist");
        assert!((pose.position.x - 5.0).abs() < 0.01);
    }

    #[test]
    fn estimated_server_time_lines_up_with_snapshot_clock() {
        let mut client = Client::new("Notch".to_string(), Configuration::default()).expect("bind");
        let tick_rate = client.config.simulation_tick_rate;

        // A snapshot at tick `tick_rate` is stamped wall_ms = 1000 by tick_to_wall_ms.
        // A pong reporting the same tick-relative server_time should make the
        // client's estimated server clock land in the same domain, not the Unix
        // epoch.
        client.handle_pong(Pong {
            client_time: now_ms(),
            server_time: 1000,
        });

        let estimated = client.estimated_server_time_ms();
        let sample_wall_ms = client.tick_to_wall_ms(tick_rate);
        assert!(
            (estimated - sample_wall_ms).abs() < 50,
            "estimated server time {estimated} should track the snapshot clock {sample_wall_ms}"
        );
    }
}
