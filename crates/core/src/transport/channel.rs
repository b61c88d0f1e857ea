use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use super::sequence::sequence_greater_than;
use super::tracking::{AckTracker, ReceiveTracker};

const RESEND_INTERVAL: Duration = Duration::from_millis(150);
const MAX_PENDING_RELIABLE: usize = 256;

struct OutgoingReliable {
    sequence: u32,
    frame_bytes: Vec<u8>,
    last_sent: Instant,
}

/// Per-peer, per-channel send/receive bookkeeping. Channels 0 and 2 are
/// reliable-ordered and retransmit unacked frames; a reorder buffer withholds
/// an accepted sequence until every lower sequence on the channel has been
/// delivered, so a retransmitted or UDP-reordered frame never reaches the
/// application ahead of one it should follow. Channel 1 is
/// unreliable-sequenced and only remembers the newest sequence it has applied so
/// that a stale, reordered datagram is dropped rather than replayed.
pub struct ChannelState {
    reliable: bool,
    send_sequence: u32,
    last_applied_sequence: Option<u32>,
    next_expected_sequence: u32,
    reorder_buffer: BTreeMap<u32, Vec<u8>>,
    ack_tracker: AckTracker,
    receive_tracker: ReceiveTracker,
    outgoing: VecDeque<OutgoingReliable>,
}

impl ChannelState {
    pub fn new(reliable: bool) -> Self {
        Self {
            reliable,
            send_sequence: 0,
            last_applied_sequence: None,
            next_expected_sequence: 0,
            reorder_buffer: BTreeMap::new(),
            ack_tracker: AckTracker::new(MAX_PENDING_RELIABLE),
            receive_tracker: ReceiveTracker::new(),
            outgoing: VecDeque::new(),
        }
    }

    pub fn is_reliable(&self) -> bool {
        self.reliable
    }

    pub fn begin_send(&mut self) -> u32 {
        let sequence = self.send_sequence;
        self.send_sequence = self.send_sequence.wrapping_add(1);
        self.ack_tracker.track_packet(sequence);
        sequence
    }

    /// Retains the encoded frame for retransmission. No-op on unreliable channels.
    pub fn store_outgoing(&mut self, sequence: u32, frame_bytes: Vec<u8>) {
        if !self.reliable {
            return;
        }
        if self.outgoing.len() >= MAX_PENDING_RELIABLE {
            self.outgoing.pop_front();
        }
        self.outgoing.push_back(OutgoingReliable {
            sequence,
            frame_bytes,
            last_sent: Instant::now(),
        });
    }

    /// Returns `None` if `sequence` is a duplicate (never ack, never deliver).
    /// Otherwise returns the payloads, in order, that the caller should now
    /// deliver to the application — possibly empty.
    ///
    /// On the reliable-ordered channels, a sequence that isn't the next
    /// expected one is held in the reorder buffer and delivers nothing yet;
    /// receiving the gap-filling sequence then flushes it and any buffered
    /// sequences that chain on from it. On the unreliable-sequenced channel,
    /// anything older than the newest sequence already applied is dropped.
    pub fn accept_incoming(&mut self, sequence: u32, payload: Vec<u8>) -> Option<Vec<Vec<u8>>> {
        if !self.receive_tracker.record_received(sequence) {
            return None;
        }
        if !self.reliable {
            let accept = match self.last_applied_sequence {
                Some(last) => sequence_greater_than(sequence, last),
                None => true,
            };
            if !accept {
                return Some(Vec::new());
            }
            self.last_applied_sequence = Some(sequence);
            return Some(vec![payload]);
        }

        if sequence != self.next_expected_sequence {
            if sequence_greater_than(sequence, self.next_expected_sequence) {
                self.reorder_buffer.insert(sequence, payload);
            }
            return Some(Vec::new());
        }

        let mut ready = vec![payload];
        self.next_expected_sequence = self.next_expected_sequence.wrapping_add(1);
        while let Some(buffered) = self.reorder_buffer.remove(&self.next_expected_sequence) {
            ready.push(buffered);
            self.next_expected_sequence = self.next_expected_sequence.wrapping_add(1);
        }
        Some(ready)
    }

    pub fn ack_data(&self) -> (u32, u32) {
        self.receive_tracker.ack_data()
    }

    pub fn process_ack(&mut self, ack: u32, ack_bitfield: u32) {
        let acked = self.ack_tracker.process_ack(ack, ack_bitfield);
        if self.reliable && !acked.is_empty() {
            self.outgoing.retain(|p| !acked.contains(&p.sequence));
        }
    }

    pub fn rtt_ms(&self) -> f32 {
        self.ack_tracker.srtt()
    }

    /// Frames due for retransmission. Empty on unreliable channels.
    pub fn packets_to_resend(&mut self) -> Vec<Vec<u8>> {
        if !self.reliable {
            return Vec::new();
        }
        let now = Instant::now();
        let mut due = Vec::new();
        for packet in self.outgoing.iter_mut() {
            if now.duration_since(packet.last_sent) >= RESEND_INTERVAL {
                packet.last_sent = now;
                due.push(packet.frame_bytes.clone());
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreliable_channel_drops_stale_sequence() {
        let mut channel = ChannelState::new(false);
        assert_eq!(channel.accept_incoming(5, vec![5]), Some(vec![vec![5]]));
        assert_eq!(channel.accept_incoming(3, vec![3]), Some(Vec::new()));
        assert_eq!(channel.accept_incoming(6, vec![6]), Some(vec![vec![6]]));
    }

    #[test]
    fn reliable_channel_requeues_until_acked() {
        let mut channel = ChannelState::new(true);
        let sequence = channel.begin_send();
        channel.store_outgoing(sequence, vec![1, 2, 3]);
        assert!(channel.packets_to_resend().is_empty());
        channel.process_ack(sequence, 0);
        // after ack, nothing left to resend even once the interval elapses.
        assert!(channel.packets_to_resend().is_empty());
    }

    #[test]
    fn reliable_channel_delivers_in_order_despite_reordered_arrival() {
        let mut channel = ChannelState::new(true);

        // Sequence 2 arrives before 0 and 1 (UDP reordering / a retransmit race).
        assert_eq!(channel.accept_incoming(2, vec![2]), Some(Vec::new()));
        assert_eq!(channel.accept_incoming(0, vec![0]), Some(vec![vec![0]]));
        // Sequence 1 fills the gap and releases the buffered sequence 2 right behind it.
        assert_eq!(
            channel.accept_incoming(1, vec![1]),
            Some(vec![vec![1], vec![2]])
        );
    }

    #[test]
    fn reliable_channel_rejects_duplicate_sequence() {
        let mut channel = ChannelState::new(true);
        assert_eq!(channel.accept_incoming(0, vec![0]), Some(vec![vec![0]]));
        assert_eq!(channel.accept_incoming(0, vec![0]), None);
    }
}
