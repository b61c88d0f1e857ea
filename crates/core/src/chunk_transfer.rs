//! Splits an encoded chunk payload into MTU-sized fragments for sending, and
//! reassembles fragments back into a payload on the receiving side. Shared by the
//! server (chunk streaming) and the client (chunk reassembly) so the framing rule
//! lives in one place.

use std::collections::HashMap;
use std::time::Instant;

use crate::protocol::ChunkData;
use crate::world::Chunk;

/// Splits `bytes` (a chunk's `encode_rle()` output) into `ChunkData` fragments no
/// larger than `max_fragment_size`, in ascending `fragment_id` order with the last
/// one flagged `is_last`.
pub fn split_into_fragments(
    cx: i32,
    cz: i32,
    bytes: &[u8],
    max_fragment_size: usize,
) -> Vec<ChunkData> {
    if bytes.is_empty() {
        return vec![ChunkData {
            cx,
            cz,
            fragment_id: 0,
            is_last: true,
            bytes: Vec::new(),
        }];
    }

    let chunks: Vec<&[u8]> = bytes.chunks(max_fragment_size.max(1)).collect();
    let last_id = (chunks.len() - 1) as u16;
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, slice)| ChunkData {
            cx,
            cz,
            fragment_id: i as u16,
            is_last: i as u16 == last_id,
            bytes: slice.to_vec(),
        })
        .collect()
}

#[derive(Debug)]
struct FragmentBuffer {
    fragments: HashMap<u16, Vec<u8>>,
    last_fragment_id: Option<u16>,
    last_update: Instant,
}

impl FragmentBuffer {
    fn new() -> Self {
        Self {
            fragments: HashMap::new(),
            last_fragment_id: None,
            last_update: Instant::now(),
        }
    }

    fn complete(&self) -> bool {
        match self.last_fragment_id {
            Some(last) => self.fragments.len() == last as usize + 1,
            None => false,
        }
    }

    fn assemble(&self) -> Vec<u8> {
        let last = self.last_fragment_id.unwrap_or(0);
        let mut out = Vec::new();
        for id in 0..=last {
            if let Some(bytes) = self.fragments.get(&id) {
                out.extend_from_slice(bytes);
            }
        }
        out
    }
}

const FRAGMENT_BUFFER_EXPIRY_MS: u128 = 5000;

/// Reassembles `ChunkData` fragments for many in-flight chunks at once, evicting
/// any chunk whose fragments stop arriving for [`FRAGMENT_BUFFER_EXPIRY_MS`].
#[derive(Debug, Default)]
pub struct FragmentAssembler {
    pending: HashMap<(i32, i32), FragmentBuffer>,
}

impl FragmentAssembler {
    /// Feeds one fragment in. Returns the decoded chunk once every fragment for
    /// `(cx, cz)` has arrived; the pending entry is removed either way once complete.
    pub fn accept(&mut self, fragment: &ChunkData) -> Option<Chunk> {
        let key = (fragment.cx, fragment.cz);
        let buffer = self.pending.entry(key).or_insert_with(FragmentBuffer::new);
        buffer.last_update = Instant::now();
        buffer
            .fragments
            .insert(fragment.fragment_id, fragment.bytes.clone());
        if fragment.is_last {
            buffer.last_fragment_id = Some(fragment.fragment_id);
        }

        if !buffer.complete() {
            return None;
        }

        let assembled = buffer.assemble();
        self.pending.remove(&key);
        Chunk::decode_rle(&assembled)
    }

    /// Drops any fragment buffer that hasn't seen an update recently. Call once per
    /// client update tick.
    pub fn evict_expired(&mut self) {
        self.pending
            .retain(|_, buffer| buffer.last_update.elapsed().as_millis() < FRAGMENT_BUFFER_EXPIRY_MS);
    }

    pub fn is_pending(&self, cx: i32, cz: i32) -> bool {
        self.pending.contains_key(&(cx, cz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::BLOCK_EMPTY;

    #[test]
    fn splits_and_reassembles_a_chunk() {
        let chunk = Chunk::uniform(7);
        let encoded = chunk.encode_rle();
        let fragments = split_into_fragments(3, -5, &encoded, 16);
        assert!(fragments.len() > 1);
        assert!(fragments.last().unwrap().is_last);

        let mut assembler = FragmentAssembler::default();
        let mut result = None;
        for fragment in &fragments {
            result = assembler.accept(fragment);
        }
        let reassembled = result.expect("completes on the last fragment");
        assert_eq!(reassembled.get_block(0, 0, 0), 7);
        assert!(!assembler.is_pending(3, -5));
    }

    #[test]
    fn single_fragment_chunk_completes_immediately() {
        let chunk = Chunk::empty();
        let encoded = chunk.encode_rle();
        let fragments = split_into_fragments(0, 0, &encoded, 4096);
        assert_eq!(fragments.len(), 1);

        let mut assembler = FragmentAssembler::default();
        let reassembled = assembler.accept(&fragments[0]).expect("completes");
        assert_eq!(reassembled.get_block(1, 1, 1), BLOCK_EMPTY);
    }
}
