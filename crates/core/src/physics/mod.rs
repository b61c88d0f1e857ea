mod collision;
mod dda;
mod movement;
mod step;

pub use collision::{is_grounded, resolve, step_up, CollisionResult};
pub use dda::{raycast, BlockFace, RaycastHit};
pub use movement::{integrate, MovementInput, MovementMode, MovementParams, MovementState};
pub use step::{default_player_half_extents, simulate_step, PlayerBody};
