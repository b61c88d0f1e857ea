mod aabb;
mod block;
mod chunk;

pub use aabb::Aabb;
pub use block::{Block, BlockRegistry, BLOCK_EMPTY};
pub use chunk::{Chunk, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z, CHUNK_VOLUME};

use std::collections::HashMap;
use glam::{IVec3, Vec3};

pub type ChunkKey = (i32, i32);

/// Host collaborator consumed by the physics module. `&dyn WorldReader` is handed
/// into the collision/raycast routines so they never own the world they query.
pub trait WorldReader {
    fn get_block(&self, x: i32, y: i32, z: i32) -> Block;
    fn is_solid(&self, x: i32, y: i32, z: i32) -> bool;
    fn is_fluid(&self, x: i32, y: i32, z: i32) -> bool;
    fn get_block_aabb(&self, ix: i32, iy: i32, iz: i32) -> Aabb;
    fn surrounding_blocks(&self, aabb: &Aabb) -> Vec<IVec3>;
}

/// Host collaborator consumed by chunk streaming.
pub trait WorldWriter {
    fn get_or_create_chunk(&mut self, cx: i32, cz: i32) -> &mut Chunk;
    fn get_chunk(&self, cx: i32, cz: i32) -> Option<&Chunk>;
}

/// The server and client both need a world that can answer physics queries and
/// serve/install chunk data; this is the one trait object `Server`/`Client` actually
/// borrow, rather than juggling two separate reference fields for what is, for every
/// host implementation in practice, a single world value.
pub trait WorldAccess: WorldReader + WorldWriter {}
impl<T: WorldReader + WorldWriter> WorldAccess for T {}

/// Sparse chunk store. Reads against an absent chunk see solid-free empty space.
#[derive(Debug, Default)]
pub struct World {
    chunks: HashMap<ChunkKey, Chunk>,
    registry: BlockRegistry,
}

impl World {
    pub fn new(registry: BlockRegistry) -> Self {
        Self {
            chunks: HashMap::new(),
            registry,
        }
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    fn world_to_chunk(x: i32, z: i32) -> (ChunkKey, i32, i32) {
        let cx = x.div_euclid(CHUNK_SIZE_X);
        let cz = z.div_euclid(CHUNK_SIZE_Z);
        let lx = x.rem_euclid(CHUNK_SIZE_X);
        let lz = z.rem_euclid(CHUNK_SIZE_Z);
        ((cx, cz), lx, lz)
    }
}

impl WorldReader for World {
    fn get_block(&self, x: i32, y: i32, z: i32) -> Block {
        if !(0..CHUNK_SIZE_Y).contains(&y) {
            return BLOCK_EMPTY;
        }
        let (key, lx, lz) = Self::world_to_chunk(x, z);
        self.chunks
            .get(&key)
            .map(|chunk| chunk.get_block(lx, y, lz))
            .unwrap_or(BLOCK_EMPTY)
    }

    fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        self.registry.is_solid(self.get_block(x, y, z))
    }

    fn is_fluid(&self, x: i32, y: i32, z: i32) -> bool {
        self.registry.is_fluid(self.get_block(x, y, z))
    }

    fn get_block_aabb(&self, ix: i32, iy: i32, iz: i32) -> Aabb {
        let min = Vec3::new(ix as f32, iy as f32, iz as f32);
        Aabb::new(min, min + Vec3::ONE)
    }

    fn surrounding_blocks(&self, aabb: &Aabb) -> Vec<IVec3> {
        let min = aabb.min().floor();
        let max = aabb.max().ceil();
        let mut result = Vec::new();
        let (min_x, min_y, min_z) = (min.x as i32, min.y as i32, min.z as i32);
        let (max_x, max_y, max_z) = (max.x as i32, max.y as i32, max.z as i32);
        for y in min_y..max_y {
            for z in min_z..max_z {
                for x in min_x..max_x {
                    if self.is_solid(x, y, z) {
                        result.push(IVec3::new(x, y, z));
                    }
                }
            }
        }
        result
    }
}

impl WorldWriter for World {
    fn get_or_create_chunk(&mut self, cx: i32, cz: i32) -> &mut Chunk {
        self.chunks.entry((cx, cz)).or_insert_with(Chunk::empty)
    }

    fn get_chunk(&self, cx: i32, cz: i32) -> Option<&Chunk> {
        self.chunks.get(&(cx, cz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_chunk_reads_as_empty() {
        let world = World::new(BlockRegistry::default());
        assert_eq!(world.get_block(0, 0, 0), BLOCK_EMPTY);
        assert!(!world.is_solid(0, 0, 0));
    }

    #[test]
    fn installed_chunk_is_queryable_with_world_coordinates() {
        let mut world = World::new(BlockRegistry::default());
        world.get_or_create_chunk(1, -1).set_block(3, 5, 7, 9);
        // chunk (1, -1) covers x in [16, 32), z in [-16, 0)
        assert_eq!(world.get_block(16 + 3, 5, -16 + 7), 9);
        assert!(world.is_solid(16 + 3, 5, -16 + 7));
    }
}
