//! Amanatides-Woo voxel DDA raycasting.

use glam::{IVec3, Vec3};

use crate::world::WorldReader;

const EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFace {
    Left,
    Right,
    Bottom,
    Top,
    Back,
    Front,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RaycastHit {
    pub hit: bool,
    pub block_pos: IVec3,
    pub position: Vec3,
    pub normal: Vec3,
    pub distance: f32,
    pub face: Option<BlockFace>,
}

fn sign(value: f32) -> i32 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

fn intbound(s: f32, ds: f32) -> f32 {
    if ds.abs() <= EPSILON {
        return f32::INFINITY;
    }
    let mut s_fraction = s - s.floor();
    if ds < 0.0 {
        s_fraction = 1.0 - s_fraction;
    }
    s_fraction / ds.abs()
}

fn face_from_step(axis: usize, step: i32) -> BlockFace {
    match axis {
        0 => if step > 0 { BlockFace::Left } else { BlockFace::Right },
        1 => if step > 0 { BlockFace::Bottom } else { BlockFace::Top },
        _ => if step > 0 { BlockFace::Back } else { BlockFace::Front },
    }
}

/// Walks integer voxels along `origin + t*direction` up to `max_distance`, returning
/// the first solid voxel encountered. The starting voxel is tested before stepping;
/// if it's already solid, a zero-distance hit is returned.
pub fn raycast(
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    world: &dyn WorldReader,
) -> RaycastHit {
    let mut result = RaycastHit::default();

    if max_distance <= 0.0 || direction.length_squared() <= EPSILON {
        return result;
    }
    let dir = direction.normalize();

    let mut current_cell = origin.floor().as_ivec3();
    let step = IVec3::new(sign(dir.x), sign(dir.y), sign(dir.z));

    let mut t_max = Vec3::new(
        intbound(origin.x, dir.x),
        intbound(origin.y, dir.y),
        intbound(origin.z, dir.z),
    );

    let t_delta = Vec3::new(
        if step.x == 0 { f32::INFINITY } else { (1.0 / dir.x).abs() },
        if step.y == 0 { f32::INFINITY } else { (1.0 / dir.y).abs() },
        if step.z == 0 { f32::INFINITY } else { (1.0 / dir.z).abs() },
    );

    if world.is_solid(current_cell.x, current_cell.y, current_cell.z) {
        result.hit = true;
        result.block_pos = current_cell;
        result.position = origin;
        result.distance = 0.0;
        result.face = Some(BlockFace::Front);
        return result;
    }

    let mut distance_travelled = 0.0f32;
    while distance_travelled <= max_distance {
        let axis = if t_max.x < t_max.y {
            if t_max.x < t_max.z { 0 } else { 2 }
        } else if t_max.y < t_max.z {
            1
        } else {
            2
        };

        distance_travelled = t_max[axis];
        if distance_travelled > max_distance {
            break;
        }

        current_cell[axis] += step[axis];
        t_max[axis] += t_delta[axis];

        if world.is_solid(current_cell.x, current_cell.y, current_cell.z) {
            result.hit = true;
            result.block_pos = current_cell;
            result.distance = distance_travelled;
            result.position = origin + dir * distance_travelled;

            let mut normal = Vec3::ZERO;
            normal[axis] = -step[axis] as f32;
            result.normal = normal;
            result.face = Some(face_from_step(axis, step[axis]));
            return result;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Block, BLOCK_EMPTY};
    use glam::IVec3 as V;

    struct TestWorld {
        solid: std::collections::HashSet<(i32, i32, i32)>,
    }

    impl WorldReader for TestWorld {
        fn get_block(&self, x: i32, y: i32, z: i32) -> Block {
            if self.solid.contains(&(x, y, z)) { 1 } else { BLOCK_EMPTY }
        }
        fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
            self.solid.contains(&(x, y, z))
        }
        fn is_fluid(&self, _x: i32, _y: i32, _z: i32) -> bool {
            false
        }
        fn get_block_aabb(&self, ix: i32, iy: i32, iz: i32) -> crate::world::Aabb {
            let min = Vec3::new(ix as f32, iy as f32, iz as f32);
            crate::world::Aabb::new(min, min + Vec3::ONE)
        }
        fn surrounding_blocks(&self, _aabb: &crate::world::Aabb) -> Vec<V> {
            Vec::new()
        }
    }

    #[test]
    fn hits_block_below_from_above() {
        let world = TestWorld {
            solid: [(0, 0, 0)].into_iter().collect(),
        };
        let hit = raycast(
            Vec3::new(0.5, 1.5, 0.5),
            Vec3::new(0.0, -1.0, 0.0),
            10.0,
            &world,
        );
        assert!(hit.hit);
        assert_eq!(hit.block_pos, V::new(0, 0, 0));
        assert_eq!(hit.normal, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(hit.face, Some(BlockFace::Top));
        assert!((hit.distance - 0.5).abs() < 1e-5);
    }

    #[test]
    fn misses_when_nothing_in_range() {
        let world = TestWorld {
            solid: std::collections::HashSet::new(),
        };
        let hit = raycast(Vec3::new(0.5, 0.5, 0.5), Vec3::new(1.0, 0.0, 0.0), 5.0, &world);
        assert!(!hit.hit);
    }

    #[test]
    fn zero_distance_hit_when_origin_is_solid() {
        let world = TestWorld {
            solid: [(0, 0, 0)].into_iter().collect(),
        };
        let hit = raycast(Vec3::new(0.5, 0.5, 0.5), Vec3::new(1.0, 0.0, 0.0), 5.0, &world);
        assert!(hit.hit);
        assert_eq!(hit.distance, 0.0);
    }
}
