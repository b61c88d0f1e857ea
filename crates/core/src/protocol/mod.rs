//! Packet schema: the wire-level framing (header) and the typed payloads that ride
//! inside it. [`encode`]/`decode` are what the transport layer calls at the
//! datagram boundary; everything above that boundary works with [`Packet`] values.

mod header;
mod packet_type;
mod packets;

pub use header::{PacketHeader, HEADER_SIZE};
pub use packet_type::PacketType;
pub use packets::*;

use crate::codec::{PacketReader, PacketWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    TooShort,
    PayloadOverrun,
    UnknownType(u8),
    Truncated,
}

/// Builds a complete datagram: header followed by the packet's payload.
/// `sequence`/`timestamp_ms` are filled in by the transport layer, which owns
/// per-channel sequencing.
pub fn encode(packet: &Packet, sequence: u32, timestamp_ms: u32) -> Vec<u8> {
    let mut payload = PacketWriter::default();
    packet.write_payload(&mut payload);
    let payload_bytes = payload.into_bytes();

    let header = PacketHeader {
        packet_type: packet.packet_type() as u8,
        payload_size: payload_bytes.len() as u16,
        sequence,
        timestamp_ms,
    };

    let mut writer = PacketWriter::with_capacity(HEADER_SIZE + payload_bytes.len());
    header.write(&mut writer);
    let mut bytes = writer.into_bytes();
    bytes.extend_from_slice(&payload_bytes);
    bytes
}

/// Parses a complete datagram per the framing rule in the transport contract:
/// at least [`HEADER_SIZE`] bytes, and the declared `payload_size` must not exceed
/// what actually follows. Anything short of that is a framing error, not a
/// packet-level one, and must be dropped before any state changes.
pub fn decode(datagram: &[u8]) -> Result<(PacketHeader, Packet), DecodeError> {
    if datagram.len() < HEADER_SIZE {
        return Err(DecodeError::TooShort);
    }
    let mut reader = PacketReader::new(datagram);
    let header = PacketHeader::read(&mut reader);

    let remaining = datagram.len() - HEADER_SIZE;
    if header.payload_size as usize > remaining {
        return Err(DecodeError::PayloadOverrun);
    }

    let packet_type =
        PacketType::from_u8(header.packet_type).ok_or(DecodeError::UnknownType(header.packet_type))?;

    let payload = &datagram[HEADER_SIZE..HEADER_SIZE + header.payload_size as usize];
    let mut payload_reader = PacketReader::new(payload);
    let packet = Packet::read_payload(packet_type, &mut payload_reader);
    if payload_reader.overflowed() {
        return Err(DecodeError::Truncated);
    }

    Ok((header, packet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn encode_decode_round_trips_a_packet() {
        let packet = Packet::Ping(Ping { client_time: 555 });
        let bytes = encode(&packet, 10, 20000);
        let (header, decoded) = decode(&bytes).expect("decodes");
        assert_eq!(header.sequence, 10);
        assert_eq!(header.timestamp_ms, 20000);
        assert_eq!(decoded, packet);
    }

    #[test]
    fn undersized_datagram_is_rejected() {
        let bytes = [0u8; 5];
        assert_eq!(decode(&bytes), Err(DecodeError::TooShort));
    }

    #[test]
    fn declared_payload_size_larger_than_remaining_bytes_is_rejected() {
        let packet = Packet::HandshakeRequest(HandshakeRequest {
            protocol_version: 1,
            player_name: "a".into(),
            client_version: "b".into(),
        });
        let mut bytes = encode(&packet, 0, 0);
        // Lie about the payload size without adding the bytes to match.
        bytes[1] = 0xff;
        bytes[2] = 0xff;
        assert_eq!(decode(&bytes), Err(DecodeError::PayloadOverrun));
    }

    #[test]
    fn unknown_packet_type_is_rejected() {
        let packet = Packet::Ping(Ping { client_time: 1 });
        let mut bytes = encode(&packet, 0, 0);
        bytes[0] = 200;
        assert_eq!(decode(&bytes), Err(DecodeError::UnknownType(200)));
    }

    #[test]
    fn handshake_response_carries_full_precision_spawn() {
        let packet = Packet::HandshakeResponse(HandshakeResponse {
            accepted: true,
            player_id: 42,
            spawn: Vec3::new(1.5, 80.25, -3.75),
            world_seed: -123456789,
            message: "welcome".into(),
        });
        let bytes = encode(&packet, 1, 1);
        let (_, decoded) = decode(&bytes).expect("decodes");
        assert_eq!(decoded, packet);
    }
}
