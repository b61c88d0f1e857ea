//! Swept-AABB collision against a voxel grid. Must produce bit-identical results on
//! client and server (same f32 operations, same iteration order) for prediction to
//! converge, so this module touches no randomness and no host state beyond
//! [`WorldReader`].

use glam::Vec3;

use crate::world::{Aabb, WorldReader};

const MAX_ITERATIONS: u32 = 3;
const TOI_EPSILON: f32 = 1e-4;
const MIN_DISPLACEMENT: f32 = 1e-4;
const OVERBOUNCE: f32 = 1.001;
const GROUND_CHECK_DEPTH: f32 = 0.05;
const GROUND_VELOCITY_EPS: f32 = 0.5;
const STEP_INCREMENT: f32 = 0.1;

#[derive(Debug, Clone, Copy, Default)]
pub struct CollisionResult {
    pub position: Vec3,
    pub velocity: Vec3,
    pub normal: Vec3,
    pub penetration: f32,
    pub collided: bool,
}

/// Declaration order used to break penetration-axis ties: X-, X+, Y-, Y+, Z-, Z+.
fn penetration_normal(moving: &Aabb, block: &Aabb) -> (Vec3, f32) {
    let moving_min = moving.min();
    let moving_max = moving.max();
    let block_min = block.min();
    let block_max = block.max();

    let candidates = [
        (Vec3::new(-1.0, 0.0, 0.0), block_max.x - moving_min.x),
        (Vec3::new(1.0, 0.0, 0.0), moving_max.x - block_min.x),
        (Vec3::new(0.0, -1.0, 0.0), block_max.y - moving_min.y),
        (Vec3::new(0.0, 1.0, 0.0), moving_max.y - block_min.y),
        (Vec3::new(0.0, 0.0, -1.0), block_max.z - moving_min.z),
        (Vec3::new(0.0, 0.0, 1.0), moving_max.z - block_min.z),
    ];

    let mut best = candidates[0];
    for &candidate in &candidates[1..] {
        if candidate.1 < best.1 {
            best = candidate;
        }
    }
    (best.0, best.1)
}

fn clip_velocity(velocity: Vec3, normal: Vec3, overbounce: f32) -> Vec3 {
    let backoff = velocity.dot(normal) * overbounce;
    let clipped = velocity - normal * backoff;
    if clipped.length_squared() < 1e-4 {
        Vec3::ZERO
    } else {
        clipped
    }
}

/// Resolves `bounds` moving by `displacement` against every solid block it sweeps
/// through, bouncing off up to [`MAX_ITERATIONS`] surfaces in one call.
pub fn resolve(bounds: Aabb, displacement: Vec3, world: &dyn WorldReader) -> CollisionResult {
    let mut result = CollisionResult {
        velocity: displacement,
        ..Default::default()
    };

    let mut remaining = displacement;
    let mut current_center = bounds.center();
    let extents = bounds.extents();

    for _ in 0..MAX_ITERATIONS {
        if remaining.length_squared() < MIN_DISPLACEMENT * MIN_DISPLACEMENT {
            let moved = Aabb::from_center_extents(current_center + remaining, extents);
            let solids = world.surrounding_blocks(&moved);

            let mut earliest_penetration = f32::MAX;
            let mut best_normal = Vec3::ZERO;
            let mut resolved_position = moved.center();

            for block_pos in solids {
                let block_aabb =
                    world.get_block_aabb(block_pos.x, block_pos.y, block_pos.z);
                if !moved.intersects(&block_aabb) {
                    continue;
                }
                let (normal, penetration) = penetration_normal(&moved, &block_aabb);
                if penetration < earliest_penetration {
                    earliest_penetration = penetration;
                    best_normal = normal;
                    resolved_position = moved.center() + normal * penetration;
                }
            }

            if earliest_penetration < f32::MAX {
                result.collided = true;
                result.normal = best_normal;
                result.penetration = earliest_penetration;
                result.position = resolved_position;
                result.velocity = clip_velocity(remaining, best_normal, OVERBOUNCE);
            } else {
                result.position = moved.center();
                result.velocity = remaining;
            }
            return result;
        }

        let expanded = Aabb::from_center_extents(current_center, extents).translate(remaining);
        let solids = world.surrounding_blocks(&expanded);

        let moving_min = current_center - extents;
        let moving_max = current_center + extents;

        let mut hit_time = 1.0f32;
        let mut hit_normal = Vec3::ZERO;
        let mut hit = false;

        for block_pos in solids {
            let block_aabb = world.get_block_aabb(block_pos.x, block_pos.y, block_pos.z);
            let block_min = block_aabb.min();
            let block_max = block_aabb.max();

            let mut enter = 0.0f32;
            let mut exit = 1.0f32;
            let mut normal = Vec3::ZERO;
            let mut rejected = false;

            for axis in 0..3 {
                let min = moving_min[axis];
                let max = moving_max[axis];
                let block_min_axis = block_min[axis];
                let block_max_axis = block_max[axis];
                let dir = remaining[axis];

                if dir.abs() < TOI_EPSILON {
                    if max <= block_min_axis || min >= block_max_axis {
                        enter = 1.0;
                        exit = 0.0;
                        rejected = true;
                        break;
                    }
                    continue;
                }

                let inv_dir = 1.0 / dir;
                let t1 = (block_min_axis - max) * inv_dir;
                let t2 = (block_max_axis - min) * inv_dir;

                let slab_enter = t1.min(t2);
                let slab_exit = t1.max(t2);

                if slab_enter > enter {
                    enter = slab_enter;
                    normal = Vec3::ZERO;
                    normal[axis] = if dir > 0.0 { -1.0 } else { 1.0 };
                }
                exit = exit.min(slab_exit);

                if enter > exit || exit < 0.0 || enter > 1.0 {
                    rejected = true;
                    break;
                }
            }

            if !rejected && enter <= exit && enter >= 0.0 && enter < hit_time {
                hit_time = enter;
                hit_normal = normal;
                hit = true;
            }
        }

        if !hit {
            current_center += remaining;
            result.position = current_center;
            result.velocity = remaining;
            return result;
        }

        let move_vec = remaining * (hit_time - TOI_EPSILON).max(0.0);
        current_center += move_vec;

        result.collided = true;
        result.normal = hit_normal;
        result.position = current_center;

        let mut remaining_after_hit = remaining - move_vec;
        remaining_after_hit -= hit_normal * remaining_after_hit.dot(hit_normal);
        remaining = clip_velocity(remaining_after_hit, hit_normal, OVERBOUNCE);
    }

    result.position = current_center;
    result.velocity = Vec3::ZERO;
    result
}

/// True iff `bounds` has a solid block within [`GROUND_CHECK_DEPTH`] below it and is
/// not currently moving upward faster than [`GROUND_VELOCITY_EPS`].
pub fn is_grounded(bounds: Aabb, velocity: Vec3, world: &dyn WorldReader) -> bool {
    if velocity.y > GROUND_VELOCITY_EPS {
        return false;
    }

    let probe = bounds.translate(Vec3::new(0.0, -GROUND_CHECK_DEPTH, 0.0));
    world
        .surrounding_blocks(&probe)
        .into_iter()
        .any(|block_pos| {
            let block_aabb = world.get_block_aabb(block_pos.x, block_pos.y, block_pos.z);
            probe.intersects(&block_aabb)
        })
}

/// Attempts to lift `bounds` in [`STEP_INCREMENT`] increments up to `max_step_height`,
/// committing the first lift whose resulting box is clear of solid blocks. Only
/// attempted when vertical velocity is near zero (a player is neither jumping nor
/// falling).
pub fn step_up(
    bounds: Aabb,
    velocity: Vec3,
    world: &dyn WorldReader,
    max_step_height: f32,
) -> Option<Aabb> {
    if velocity.y.abs() > 0.0001 {
        return None;
    }

    let mut step = STEP_INCREMENT;
    while step <= max_step_height {
        let raised = bounds.translate(Vec3::new(0.0, step, 0.0));
        let blocked = world.surrounding_blocks(&raised).into_iter().any(|block_pos| {
            let block_aabb = world.get_block_aabb(block_pos.x, block_pos.y, block_pos.z);
            raised.intersects(&block_aabb)
        });

        if !blocked {
            return Some(raised);
        }
        step += STEP_INCREMENT;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Block, BlockRegistry, BLOCK_EMPTY, WorldWriter};
    use glam::IVec3;

    /// Minimal in-memory WorldReader for physics unit tests: a set of solid cells.
    struct TestWorld {
        solid: std::collections::HashSet<(i32, i32, i32)>,
    }

    impl TestWorld {
        fn new(solid_cells: &[(i32, i32, i32)]) -> Self {
            Self {
                solid: solid_cells.iter().copied().collect(),
            }
        }
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
        fn get_block_aabb(&self, ix: i32, iy: i32, iz: i32) -> Aabb {
            let min = Vec3::new(ix as f32, iy as f32, iz as f32);
            Aabb::new(min, min + Vec3::ONE)
        }
        fn surrounding_blocks(&self, aabb: &Aabb) -> Vec<IVec3> {
            let min = aabb.min().floor();
            let max = aabb.max().ceil();
            let mut out = Vec::new();
            for y in min.y as i32..max.y as i32 {
                for z in min.z as i32..max.z as i32 {
                    for x in min.x as i32..max.x as i32 {
                        if self.is_solid(x, y, z) {
                            out.push(IVec3::new(x, y, z));
                        }
                    }
                }
            }
            out
        }
    }

    #[test]
    fn unobstructed_move_translates_cleanly() {
        let world = TestWorld::new(&[]);
        let bounds = Aabb::from_center_extents(Vec3::new(0.5, 0.5, 0.5), Vec3::splat(0.3));
        let result = resolve(bounds, Vec3::new(1.0, 0.0, 0.0), &world);
        assert!(!result.collided);
        assert_eq!(result.position, Vec3::new(1.5, 0.5, 0.5));
    }

    #[test]
    fn resting_on_floor_zeroes_vertical_velocity_and_reports_grounded() {
        let world = TestWorld::new(&[(0, 0, 0), (0, 0, -1)]);
        // bounds resting just above the floor
        let bounds = Aabb::from_center_extents(Vec3::new(0.5, 1.15, 0.5), Vec3::splat(0.3));
        let dt = 1.0 / 60.0;
        let gravity = 20.0;
        let velocity = Vec3::new(0.0, -gravity * dt, 0.0);
        let result = resolve(bounds, velocity * dt, &world);
        assert!(result.collided);
        assert_eq!(result.velocity.y, 0.0);

        let grounded = is_grounded(
            Aabb::from_center_extents(result.position, Vec3::splat(0.3)),
            result.velocity,
            &world,
        );
        assert!(grounded);
    }

    #[test]
    fn step_up_succeeds_under_max_height_and_fails_above() {
        let mut registry_world = crate::world::World::new(BlockRegistry::default());
        registry_world.get_or_create_chunk(0, 0).set_block(0, 0, 0, 1);
        // 0.5-high step: a half-block is approximated here with a full solid block
        // at y=0 and bounds already resting at y=0.5, so the step clears at 0.5.
        let solids = TestWorld::new(&[(0, 0, 0)]);
        let bounds = Aabb::from_center_extents(Vec3::new(0.5, 1.5, 0.5), Vec3::splat(0.3));
        let lifted = step_up(bounds, Vec3::ZERO, &solids, 0.5);
        assert!(lifted.is_some());

        let blocked = TestWorld::new(&[(0, 0, 0), (0, 1, 0)]);
        let bounds_blocked = Aabb::from_center_extents(Vec3::new(0.5, 1.0, 0.5), Vec3::splat(0.3));
        let not_lifted = step_up(bounds_blocked, Vec3::ZERO, &blocked, 0.5);
        assert!(not_lifted.is_none());
    }
}
