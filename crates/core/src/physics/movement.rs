//! Friction/acceleration/gravity movement integrator. Shared bit-for-bit between the
//! server's authoritative simulation and the client's local prediction.

use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementMode {
    Walking,
    Flying,
    Swimming,
}

#[derive(Debug, Clone, Copy)]
pub struct MovementParams {
    pub walk_speed: f32,
    pub sprint_speed: f32,
    pub fly_speed: f32,
    pub swim_speed: f32,
    pub gravity: f32,
    pub jump_force: f32,
    pub ground_friction: f32,
    pub air_friction: f32,
    pub water_friction: f32,
    pub acceleration: f32,
}

impl Default for MovementParams {
    fn default() -> Self {
        Self {
            walk_speed: 4.3,
            sprint_speed: 6.5,
            fly_speed: 10.0,
            swim_speed: 3.0,
            gravity: 20.0,
            jump_force: 8.0,
            ground_friction: 8.0,
            air_friction: 0.5,
            water_friction: 3.0,
            acceleration: 40.0,
        }
    }
}

/// Per-tick movement input, already decoded from a `PlayerInput` packet.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementInput {
    pub wish_dir: Vec3,
    pub wish_sprint: bool,
    pub wish_jump: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct MovementState {
    pub grounded: bool,
    pub in_water: bool,
    pub mode: MovementMode,
}

fn apply_friction(velocity: Vec3, wish_dir: Vec3, friction: f32, dt: f32) -> Vec3 {
    if wish_dir.length_squared() > 0.0 {
        return velocity;
    }
    velocity * (1.0 - friction * dt).max(0.0)
}

fn accelerate(velocity: Vec3, wish_dir: Vec3, target_speed: f32, accel: f32, dt: f32) -> Vec3 {
    if wish_dir.length_squared() <= 0.0 {
        return velocity;
    }
    let dir = wish_dir.normalize();
    let mut v = velocity + dir * accel * dt;

    let current_speed = v.dot(dir);
    if current_speed > target_speed {
        v -= dir * (current_speed - target_speed);
    }
    v
}

fn target_speed(input: &MovementInput, state: &MovementState, params: &MovementParams) -> f32 {
    match state.mode {
        MovementMode::Flying => params.fly_speed,
        MovementMode::Swimming => params.swim_speed,
        MovementMode::Walking => {
            if input.wish_sprint {
                params.sprint_speed
            } else {
                params.walk_speed
            }
        }
    }
}

/// Advances `velocity` by one tick of `dt` seconds. Branch selection and the
/// friction/acceleration/gravity/jump rules follow the movement contract exactly:
/// water takes priority, then grounded-non-flying, then air.
pub fn integrate(
    velocity: Vec3,
    input: &MovementInput,
    state: &MovementState,
    params: &MovementParams,
    dt: f32,
) -> Vec3 {
    let wish_dir = input.wish_dir;
    let speed = target_speed(input, state, params);

    let mut v = if state.in_water {
        let v = apply_friction(velocity, wish_dir, params.water_friction, dt);
        accelerate(v, wish_dir, speed, params.acceleration, dt)
    } else if state.grounded && state.mode != MovementMode::Flying {
        let v = apply_friction(velocity, wish_dir, params.ground_friction, dt);
        accelerate(v, wish_dir, speed, params.acceleration, dt)
    } else {
        let v = apply_friction(velocity, wish_dir, params.air_friction, dt);
        accelerate(v, wish_dir, speed, params.acceleration * 0.5, dt)
    };

    if state.mode != MovementMode::Flying && !state.in_water {
        v.y -= params.gravity * dt;
    }

    if input.wish_jump {
        if state.in_water {
            v.y = params.jump_force * 0.5;
        } else if state.grounded && state.mode != MovementMode::Flying {
            v.y = params.jump_force;
        } else if state.mode == MovementMode::Flying {
            v.y = params.fly_speed;
        }
    }

    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friction_decays_velocity_with_no_wish_direction() {
        let params = MovementParams::default();
        let input = MovementInput::default();
        let state = MovementState {
            grounded: true,
            in_water: false,
            mode: MovementMode::Walking,
        };
        let v = integrate(Vec3::new(5.0, 0.0, 0.0), &input, &state, &params, 1.0 / 60.0);
        assert!(v.x < 5.0);
        assert!(v.x > 0.0);
    }

    #[test]
    fn ground_jump_sets_exact_jump_force() {
        let params = MovementParams::default();
        let input = MovementInput {
            wish_jump: true,
            ..Default::default()
        };
        let state = MovementState {
            grounded: true,
            in_water: false,
            mode: MovementMode::Walking,
        };
        let v = integrate(Vec3::ZERO, &input, &state, &params, 1.0 / 60.0);
        assert_eq!(v.y, params.jump_force);
    }

    #[test]
    fn air_move_uses_half_acceleration() {
        let params = MovementParams::default();
        let input = MovementInput {
            wish_dir: Vec3::new(1.0, 0.0, 0.0),
            ..Default::default()
        };
        let state_air = MovementState {
            grounded: false,
            in_water: false,
            mode: MovementMode::Walking,
        };
        let state_ground = MovementState {
            grounded: true,
            ..state_air
        };
        let dt = 1.0 / 60.0;
        let v_air = integrate(Vec3::ZERO, &input, &state_air, &params, dt);
        let v_ground = integrate(Vec3::ZERO, &input, &state_ground, &params, dt);
        assert!((v_air.x - v_ground.x / 2.0).abs() < 1e-5);
    }

    #[test]
    fn flying_skips_gravity() {
        let params = MovementParams::default();
        let input = MovementInput::default();
        let state = MovementState {
            grounded: false,
            in_water: false,
            mode: MovementMode::Flying,
        };
        let v = integrate(Vec3::ZERO, &input, &state, &params, 1.0 / 60.0);
        assert_eq!(v.y, 0.0);
    }

    #[test]
    fn water_jump_is_half_force() {
        let params = MovementParams::default();
        let input = MovementInput {
            wish_jump: true,
            ..Default::default()
        };
        let state = MovementState {
            grounded: false,
            in_water: true,
            mode: MovementMode::Swimming,
        };
        let v = integrate(Vec3::ZERO, &input, &state, &params, 1.0 / 60.0);
        assert_eq!(v.y, params.jump_force * 0.5);
    }
}
