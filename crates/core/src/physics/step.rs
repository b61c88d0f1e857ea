//! The single per-tick player physics step. Both the server's authoritative
//! simulation and the client's prediction call this exact function so the two stay
//! bit-identical; duplicating the integrate-then-resolve sequence in two places
//! would be an easy way to let them drift apart.

use glam::Vec3;

use crate::world::{Aabb, WorldReader};

use super::collision::{is_grounded, resolve};
use super::movement::{integrate, MovementInput, MovementMode, MovementParams, MovementState};

#[derive(Debug, Clone, Copy)]
pub struct PlayerBody {
    pub position: Vec3,
    pub velocity: Vec3,
    pub half_extents: Vec3,
}

/// The player collision box shared by the server's authoritative simulation and the
/// client's local prediction; not configurable since both sides must agree exactly.
pub fn default_player_half_extents() -> Vec3 {
    Vec3::new(0.3, 0.9, 0.3)
}

pub fn simulate_step(
    body: PlayerBody,
    input: &MovementInput,
    mode: MovementMode,
    in_water: bool,
    params: &MovementParams,
    world: &dyn WorldReader,
    dt: f32,
) -> PlayerBody {
    let bounds = Aabb::from_center_extents(body.position, body.half_extents);
    let grounded = is_grounded(bounds, body.velocity, world);

    let state = MovementState {
        grounded,
        in_water,
        mode,
    };
    let velocity = integrate(body.velocity, input, &state, params, dt);

    let result = resolve(bounds, velocity * dt, world);

    PlayerBody {
        position: result.position,
        velocity: result.velocity,
        half_extents: body.half_extents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Block, BLOCK_EMPTY};
    use glam::IVec3;

    struct FloorWorld;

    impl WorldReader for FloorWorld {
        fn get_block(&self, _x: i32, y: i32, _z: i32) -> Block {
            if y < 0 { 1 } else { BLOCK_EMPTY }
        }
        fn is_solid(&self, _x: i32, y: i32, _z: i32) -> bool {
            y < 0
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
    fn resting_player_stays_grounded_with_zero_vertical_velocity() {
        let world = FloorWorld;
        let body = PlayerBody {
            position: Vec3::new(0.5, 0.31, 0.5),
            velocity: Vec3::ZERO,
            half_extents: Vec3::splat(0.3),
        };
        let input = MovementInput::default();
        let params = MovementParams::default();
        let next = simulate_step(
            body,
            &input,
            MovementMode::Walking,
            false,
            &params,
            &world,
            1.0 / 60.0,
        );
        assert!((next.velocity.y).abs() < 1e-5);
    }
}
