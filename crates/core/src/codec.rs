//! Binary wire codec shared by every packet type.
//!
//! Fixed-width fields are little-endian with no padding. `PacketReader` never panics on
//! truncated input: a read past the end of the buffer sets a sticky overflow flag and
//! returns a zeroed value, so a caller can finish decoding a malformed packet and then
//! check [`PacketReader::overflowed`] once instead of threading a `Result` through every
//! field access.

use glam::{Quat, Vec3};

const QUAT_LARGEST_MASK: u8 = 0x3;
const QUAT_SIGN_MASK: u8 = 0x4;
const QUAT_SCALE: f32 = 32767.0;

/// Default quantization step for positions and velocities, in world units per step.
pub const DEFAULT_POSITION_PRECISION: f32 = 0.01;

pub fn quantize_component(value: f32, precision: f32) -> i16 {
    let scaled = value / precision;
    let clamped = scaled.clamp(i16::MIN as f32, i16::MAX as f32);
    clamped.round() as i16
}

pub fn dequantize_component(value: i16, precision: f32) -> f32 {
    value as f32 * precision
}

/// Appends primitives to a growable byte buffer in wire order.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buffer: Vec<u8>,
}

impl PacketWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.write_u64(value as u64);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Length-prefixed UTF-8 string. Truncates to 65535 bytes if longer.
    pub fn write_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        let len = bytes.len().min(u16::MAX as usize);
        self.write_u16(len as u16);
        self.buffer.extend_from_slice(&bytes[..len]);
    }

    pub fn write_vec3(&mut self, value: Vec3) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
    }

    pub fn write_quat(&mut self, value: Quat) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
        self.write_f32(value.w);
    }

    pub fn write_vec3_quantized(&mut self, value: Vec3, precision: f32) {
        self.write_i16(quantize_component(value.x, precision));
        self.write_i16(quantize_component(value.y, precision));
        self.write_i16(quantize_component(value.z, precision));
    }

    /// "Smallest three" quaternion compression: drop the largest-magnitude component
    /// (it's reconstructable from the other three since the quaternion is unit length)
    /// and quantize the rest to 16 bits. Costs 7 bytes instead of 16.
    pub fn write_quat_compressed(&mut self, value: Quat) {
        let normalized = value.normalize();
        let components = [normalized.x, normalized.y, normalized.z, normalized.w];

        let mut largest_idx = 0u8;
        let mut largest_value = components[0].abs();
        for (i, &c) in components.iter().enumerate().skip(1) {
            let abs_value = c.abs();
            if abs_value > largest_value {
                largest_idx = i as u8;
                largest_value = abs_value;
            }
        }

        let is_negative = components[largest_idx as usize] < 0.0;

        let mut header = largest_idx & QUAT_LARGEST_MASK;
        if is_negative {
            header |= QUAT_SIGN_MASK;
        }
        self.write_u8(header);

        for (i, &c) in components.iter().enumerate() {
            if i as u8 == largest_idx {
                continue;
            }
            let mut component = c;
            if is_negative {
                component = -component;
            }
            let quantized = (component.clamp(-1.0, 1.0) * QUAT_SCALE).round() as i16;
            self.write_i16(quantized);
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

/// Reads primitives from a borrowed byte slice in wire order.
///
/// Every read that runs past the end of `data` sets `overflowed` and returns a
/// zeroed/default value rather than panicking, mirroring how untrusted packet bytes
/// are handled throughout the codebase: decode everything that can be decoded, then
/// let the caller decide whether the result is usable.
pub struct PacketReader<'a> {
    data: &'a [u8],
    position: usize,
    overflowed: bool,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            overflowed: false,
        }
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    fn ensure_available(&mut self, bytes: usize) -> bool {
        if self.position + bytes <= self.data.len() {
            true
        } else {
            self.overflowed = true;
            false
        }
    }

    pub fn read_u8(&mut self) -> u8 {
        if !self.ensure_available(1) {
            return 0;
        }
        let value = self.data[self.position];
        self.position += 1;
        value
    }

    pub fn read_u16(&mut self) -> u16 {
        if !self.ensure_available(2) {
            return 0;
        }
        let bytes = [self.data[self.position], self.data[self.position + 1]];
        self.position += 2;
        u16::from_le_bytes(bytes)
    }

    pub fn read_u32(&mut self) -> u32 {
        if !self.ensure_available(4) {
            return 0;
        }
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[self.position..self.position + 4]);
        self.position += 4;
        u32::from_le_bytes(bytes)
    }

    pub fn read_u64(&mut self) -> u64 {
        if !self.ensure_available(8) {
            return 0;
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.data[self.position..self.position + 8]);
        self.position += 8;
        u64::from_le_bytes(bytes)
    }

    pub fn read_i8(&mut self) -> i8 {
        self.read_u8() as i8
    }

    pub fn read_i16(&mut self) -> i16 {
        self.read_u16() as i16
    }

    pub fn read_i32(&mut self) -> i32 {
        self.read_u32() as i32
    }

    pub fn read_i64(&mut self) -> i64 {
        self.read_u64() as i64
    }

    pub fn read_f32(&mut self) -> f32 {
        if !self.ensure_available(4) {
            return 0.0;
        }
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[self.position..self.position + 4]);
        self.position += 4;
        f32::from_le_bytes(bytes)
    }

    pub fn read_f64(&mut self) -> f64 {
        if !self.ensure_available(8) {
            return 0.0;
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.data[self.position..self.position + 8]);
        self.position += 8;
        f64::from_le_bytes(bytes)
    }

    pub fn read_string(&mut self) -> String {
        let len = self.read_u16() as usize;
        if !self.ensure_available(len) {
            return String::new();
        }
        let bytes = &self.data[self.position..self.position + len];
        self.position += len;
        String::from_utf8_lossy(bytes).into_owned()
    }

    pub fn read_vec3(&mut self) -> Vec3 {
        Vec3::new(self.read_f32(), self.read_f32(), self.read_f32())
    }

    pub fn read_quat(&mut self) -> Quat {
        Quat::from_xyzw(
            self.read_f32(),
            self.read_f32(),
            self.read_f32(),
            self.read_f32(),
        )
    }

    pub fn read_vec3_quantized(&mut self, precision: f32) -> Vec3 {
        let x = dequantize_component(self.read_i16(), precision);
        let y = dequantize_component(self.read_i16(), precision);
        let z = dequantize_component(self.read_i16(), precision);
        Vec3::new(x, y, z)
    }

    pub fn read_quat_compressed(&mut self) -> Quat {
        if !self.ensure_available(1 + 2 * 3) {
            return Quat::IDENTITY;
        }

        let header = self.read_u8();
        let largest_idx = (header & QUAT_LARGEST_MASK) as usize;
        let is_negative = (header & QUAT_SIGN_MASK) != 0;

        let mut components = [0.0f32; 4];
        let mut sum_squares = 0.0f32;

        for i in 0..4 {
            if i == largest_idx {
                continue;
            }
            let quantized = self.read_i16();
            let value = quantized as f32 / QUAT_SCALE;
            components[i] = value;
            sum_squares += value * value;
        }

        components[largest_idx] = (1.0 - sum_squares).max(0.0).sqrt();
        if is_negative {
            components[largest_idx] = -components[largest_idx];
        }

        Quat::from_xyzw(components[0], components[1], components[2], components[3])
    }

    pub fn skip(&mut self, bytes: usize) {
        if self.ensure_available(bytes) {
            self.position += bytes;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalars() {
        let mut w = PacketWriter::default();
        w.write_u8(7);
        w.write_u16(1000);
        w.write_u32(1_000_000);
        w.write_u64(u64::MAX);
        w.write_i16(-12345);
        w.write_f32(3.5);

        let bytes = w.into_bytes();
        let mut r = PacketReader::new(&bytes);
        assert_eq!(r.read_u8(), 7);
        assert_eq!(r.read_u16(), 1000);
        assert_eq!(r.read_u32(), 1_000_000);
        assert_eq!(r.read_u64(), u64::MAX);
        assert_eq!(r.read_i16(), -12345);
        assert_eq!(r.read_f32(), 3.5);
        assert!(!r.overflowed());
    }

    #[test]
    fn round_trips_string() {
        let mut w = PacketWriter::default();
        w.write_string("hello world");
        let bytes = w.into_bytes();
        let mut r = PacketReader::new(&bytes);
        assert_eq!(r.read_string(), "hello world");
    }

    #[test]
    fn overflow_is_sticky_and_non_panicking() {
        let bytes = [1u8, 2, 3];
        let mut r = PacketReader::new(&bytes);
        let _ = r.read_u64();
        assert!(r.overflowed());
        assert_eq!(r.read_u32(), 0);
        assert!(r.overflowed());
    }

    #[test]
    fn quantized_vec3_round_trips_within_precision() {
        let mut w = PacketWriter::default();
        let original = Vec3::new(12.345, -5.0, 300.01);
        w.write_vec3_quantized(original, DEFAULT_POSITION_PRECISION);
        let bytes = w.into_bytes();
        let mut r = PacketReader::new(&bytes);
        let decoded = r.read_vec3_quantized(DEFAULT_POSITION_PRECISION);
        assert!((decoded - original).length() < DEFAULT_POSITION_PRECISION * 2.0);
    }

    #[test]
    fn compressed_quat_round_trips_within_epsilon() {
        let mut w = PacketWriter::default();
        let original = Quat::from_euler(glam::EulerRot::YXZ, 0.7, 0.3, -0.1).normalize();
        w.write_quat_compressed(original);
        let bytes = w.into_bytes();
        let mut r = PacketReader::new(&bytes);
        let decoded = r.read_quat_compressed();

        let dot = original.dot(decoded).abs();
        assert!(dot > 0.999, "dot = {dot}");
    }

    #[test]
    fn quat_compressed_layout_is_seven_bytes() {
        let mut w = PacketWriter::default();
        w.write_quat_compressed(Quat::IDENTITY);
        assert_eq!(w.len(), 1 + 2 * 3);
    }
}
