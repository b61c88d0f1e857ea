use crate::codec::{PacketReader, PacketWriter};

/// Internal per-datagram envelope the transport wraps around an application
/// packet (or an ack-only keepalive with an empty payload). This framing is
/// transport-private — it never appears in the packet schema the host sees.
pub const FRAME_HEADER_SIZE: usize = 1 + 1 + 4 + 4 + 4;

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub channel: u8,
    pub ack_only: bool,
    pub sequence: u32,
    pub ack: u32,
    pub ack_bitfield: u32,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = PacketWriter::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        writer.write_u8(self.channel);
        writer.write_u8(self.ack_only as u8);
        writer.write_u32(self.sequence);
        writer.write_u32(self.ack);
        writer.write_u32(self.ack_bitfield);
        let mut bytes = writer.into_bytes();
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < FRAME_HEADER_SIZE {
            return None;
        }
        let mut reader = PacketReader::new(data);
        let channel = reader.read_u8();
        let ack_only = reader.read_u8() != 0;
        let sequence = reader.read_u32();
        let ack = reader.read_u32();
        let ack_bitfield = reader.read_u32();
        Some(Self {
            channel,
            ack_only,
            sequence,
            ack,
            ack_bitfield,
            payload: data[FRAME_HEADER_SIZE..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips() {
        let frame = Frame {
            channel: 2,
            ack_only: false,
            sequence: 7,
            ack: 6,
            ack_bitfield: 0b101,
            payload: vec![9, 9, 9],
        };
        let bytes = frame.encode();
        assert_eq!(Frame::decode(&bytes), Some(frame));
    }

    #[test]
    fn short_buffer_fails_to_decode() {
        assert_eq!(Frame::decode(&[1, 2, 3]), None);
    }
}
