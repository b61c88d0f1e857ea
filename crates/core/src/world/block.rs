/// A single voxel id. `0` denotes empty space.
pub type Block = u16;

pub const BLOCK_EMPTY: Block = 0;

/// Which block ids are solid (collide) and which one is the single fluid id.
///
/// The original terrain carried this as scattered per-block flags on a registry;
/// this core only needs the two predicates physics and streaming actually consult,
/// so they're expressed directly rather than through a block-definition table.
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    solid_threshold: Block,
    fluid_id: Block,
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self {
            solid_threshold: 1,
            fluid_id: 0,
        }
    }
}

impl BlockRegistry {
    /// `solid_threshold`: ids `>= solid_threshold` (and `!= fluid_id`) are solid.
    pub fn new(solid_threshold: Block, fluid_id: Block) -> Self {
        Self {
            solid_threshold,
            fluid_id,
        }
    }

    pub fn is_solid(&self, block: Block) -> bool {
        block != BLOCK_EMPTY && block >= self.solid_threshold && block != self.fluid_id
    }

    pub fn is_fluid(&self, block: Block) -> bool {
        block == self.fluid_id && block != BLOCK_EMPTY
    }
}
