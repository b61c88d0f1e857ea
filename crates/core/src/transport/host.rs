use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use super::channel::ChannelState;
use super::frame::Frame;
use super::stats::{NetworkStats, PacketLossSimulation};

pub const NUM_CHANNELS: usize = 3;
const RECV_BUFFER_SIZE: usize = 2048;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const DISCONNECT_REASON_TIMEOUT: u8 = 1;
pub const DISCONNECT_REASON_REQUESTED: u8 = 2;

pub type PeerHandle = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
}

pub enum HostEvent {
    Connect {
        peer: PeerHandle,
    },
    Disconnect {
        peer: PeerHandle,
        reason_code: u8,
    },
    Receive {
        peer: PeerHandle,
        channel: u8,
        bytes: Vec<u8>,
    },
}

struct PeerState {
    addr: SocketAddr,
    state: ConnectionState,
    channels: [ChannelState; NUM_CHANNELS],
    last_receive: Instant,
}

fn new_channels() -> [ChannelState; NUM_CHANNELS] {
    [
        ChannelState::new(true),  // channel 0: reliable-ordered
        ChannelState::new(false), // channel 1: unreliable-sequenced
        ChannelState::new(true),  // channel 2: reliable-ordered
    ]
}

/// A UDP host serving many peers over three logical channels, modelled on an
/// ENet-style reliable-UDP library. Every datagram is wrapped in an internal
/// [`Frame`] that carries the channel, sequence, and piggybacked ack; the
/// application-level [`crate::protocol`] bytes are the frame's payload.
pub struct NetworkHost {
    socket: UdpSocket,
    local_addr: SocketAddr,
    peers_by_addr: HashMap<SocketAddr, PeerHandle>,
    peers: HashMap<PeerHandle, PeerState>,
    next_handle: PeerHandle,
    timeout: Duration,
    stats: NetworkStats,
    packet_loss: Option<PacketLossSimulation>,
    recv_buffer: [u8; RECV_BUFFER_SIZE],
}

impl NetworkHost {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;
        Ok(Self {
            socket,
            local_addr,
            peers_by_addr: HashMap::new(),
            peers: HashMap::new(),
            next_handle: 1,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            stats: NetworkStats::default(),
            packet_loss: None,
            recv_buffer: [0u8; RECV_BUFFER_SIZE],
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn set_packet_loss_simulation(&mut self, sim: Option<PacketLossSimulation>) {
        self.packet_loss = sim;
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn peer_addr(&self, peer: PeerHandle) -> Option<SocketAddr> {
        self.peers.get(&peer).map(|p| p.addr)
    }

    pub fn connection_state(&self, peer: PeerHandle) -> Option<ConnectionState> {
        self.peers.get(&peer).map(|p| p.state)
    }

    pub fn ping_ms(&self, peer: PeerHandle) -> f32 {
        self.peers
            .get(&peer)
            .map(|p| p.channels[0].rtt_ms())
            .unwrap_or(0.0)
    }

    /// Registers a peer to dial. The connection is confirmed (transitions to
    /// `Connected`) once the first datagram arrives back from `addr`.
    pub fn connect(&mut self, addr: SocketAddr) -> PeerHandle {
        if let Some(&handle) = self.peers_by_addr.get(&addr) {
            return handle;
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.peers.insert(
            handle,
            PeerState {
                addr,
                state: ConnectionState::Connecting,
                channels: new_channels(),
                last_receive: Instant::now(),
            },
        );
        self.peers_by_addr.insert(addr, handle);
        handle
    }

    pub fn disconnect(&mut self, peer: PeerHandle, reason_code: u8) {
        if let Some(state) = self.peers.remove(&peer) {
            self.peers_by_addr.remove(&state.addr);
        }
        let _ = reason_code;
    }

    /// Sends `payload` on `channel`; reliability follows that channel's fixed mode
    /// (0 and 2 are reliable-ordered, 1 is unreliable-sequenced).
    pub fn send(&mut self, peer: PeerHandle, channel: u8, payload: &[u8]) -> io::Result<()> {
        let state = self
            .peers
            .get_mut(&peer)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "unknown peer"))?;
        let ch = &mut state.channels[channel as usize];
        let sequence = ch.begin_send();
        let (ack, ack_bitfield) = ch.ack_data();
        let frame = Frame {
            channel,
            ack_only: false,
            sequence,
            ack,
            ack_bitfield,
            payload: payload.to_vec(),
        };
        let bytes = frame.encode();
        ch.store_outgoing(sequence, bytes.clone());
        self.socket.send_to(&bytes, state.addr)?;
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes.len() as u64;
        Ok(())
    }

    /// Drains the socket and advances retransmission/timeout bookkeeping. Never
    /// blocks; call once per host update.
    pub fn service(&mut self) -> Vec<HostEvent> {
        let mut events = Vec::new();
        self.drain_socket(&mut events);
        self.resend_due_frames();
        self.drop_timed_out_peers(&mut events);
        events
    }

    fn drain_socket(&mut self, events: &mut Vec<HostEvent>) {
        loop {
            let (size, addr) = match self.socket.recv_from(&mut self.recv_buffer) {
                Ok(result) => result,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(_) => break,
            };

            if let Some(sim) = &self.packet_loss {
                if sim.should_drop() {
                    continue;
                }
            }

            let Some(frame) = Frame::decode(&self.recv_buffer[..size]) else {
                continue;
            };
            if frame.channel as usize >= NUM_CHANNELS {
                continue;
            }

            let handle = match self.peers_by_addr.get(&addr).copied() {
                Some(handle) => handle,
                None => {
                    let handle = self.next_handle;
                    self.next_handle += 1;
                    self.peers.insert(
                        handle,
                        PeerState {
                            addr,
                            state: ConnectionState::Connected,
                            channels: new_channels(),
                            last_receive: Instant::now(),
                        },
                    );
                    self.peers_by_addr.insert(addr, handle);
                    events.push(HostEvent::Connect { peer: handle });
                    handle
                }
            };

            let state = self.peers.get_mut(&handle).expect("peer just resolved");
            if state.state == ConnectionState::Connecting {
                state.state = ConnectionState::Connected;
                events.push(HostEvent::Connect { peer: handle });
            }
            state.last_receive = Instant::now();
            self.stats.packets_received += 1;
            self.stats.bytes_received += size as u64;

            let ch = &mut state.channels[frame.channel as usize];
            ch.process_ack(frame.ack, frame.ack_bitfield);

            if frame.ack_only {
                continue;
            }

            let is_reliable = ch.is_reliable();
            let channel = frame.channel;
            if let Some(ready) = ch.accept_incoming(frame.sequence, frame.payload) {
                if is_reliable {
                    let (ack, ack_bitfield) = ch.ack_data();
                    let ack_frame = Frame {
                        channel,
                        ack_only: true,
                        sequence: 0,
                        ack,
                        ack_bitfield,
                        payload: Vec::new(),
                    };
                    let _ = self.socket.send_to(&ack_frame.encode(), addr);
                }
                for bytes in ready {
                    events.push(HostEvent::Receive { peer: handle, channel, bytes });
                }
            }
        }
    }

    fn resend_due_frames(&mut self) {
        for state in self.peers.values_mut() {
            for channel in state.channels.iter_mut() {
                for bytes in channel.packets_to_resend() {
                    let _ = self.socket.send_to(&bytes, state.addr);
                }
            }
        }
    }

    fn drop_timed_out_peers(&mut self, events: &mut Vec<HostEvent>) {
        let timeout = self.timeout;
        let timed_out: Vec<PeerHandle> = self
            .peers
            .iter()
            .filter(|(_, s)| s.last_receive.elapsed() > timeout)
            .map(|(&handle, _)| handle)
            .collect();
        for handle in timed_out {
            if let Some(state) = self.peers.remove(&handle) {
                self.peers_by_addr.remove(&state.addr);
                events.push(HostEvent::Disconnect {
                    peer: handle,
                    reason_code: DISCONNECT_REASON_TIMEOUT,
                });
            }
        }
    }
}
