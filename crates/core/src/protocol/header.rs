use crate::codec::{PacketReader, PacketWriter};

/// Fixed 11-byte prefix on every datagram. `payload_size` is the length of the
/// bytes that follow, not the whole datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_type: u8,
    pub payload_size: u16,
    pub sequence: u32,
    pub timestamp_ms: u32,
}

pub const HEADER_SIZE: usize = 11;

impl PacketHeader {
    pub fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(self.packet_type);
        writer.write_u16(self.payload_size);
        writer.write_u32(self.sequence);
        writer.write_u32(self.timestamp_ms);
    }

    pub fn read(reader: &mut PacketReader) -> Self {
        Self {
            packet_type: reader.read_u8(),
            payload_size: reader.read_u16(),
            sequence: reader.read_u32(),
            timestamp_ms: reader.read_u32(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = PacketHeader {
            packet_type: 3,
            payload_size: 42,
            sequence: 1000,
            timestamp_ms: 123456,
        };
        let mut w = PacketWriter::default();
        header.write(&mut w);
        assert_eq!(w.len(), HEADER_SIZE);
        let bytes = w.into_bytes();
        let mut r = PacketReader::new(&bytes);
        assert_eq!(PacketHeader::read(&mut r), header);
    }
}
