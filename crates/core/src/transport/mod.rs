//! Unreliable-datagram transport with per-channel reliability, modelled on a
//! well-known UDP networking library: three logical channels, per-peer
//! connect/disconnect events with an opaque reason code, and a per-peer RTT
//! estimate derived from channel 0's ack round trips.

mod channel;
mod frame;
mod host;
mod sequence;
mod stats;
mod tracking;

pub use host::{
    ConnectionState, HostEvent, NetworkHost, PeerHandle, DISCONNECT_REASON_REQUESTED,
    DISCONNECT_REASON_TIMEOUT, NUM_CHANNELS,
};
pub use sequence::sequence_greater_than;
pub use stats::{NetworkStats, PacketLossSimulation};
