use crate::physics::MovementParams;

/// Every tunable the core needs, handed in by the host at construction time. A plain
/// struct rather than a generic key-value store since every key §6 names is known
/// statically; no config-file layer backs it, matching how the host binaries build
/// their own config structs straight from CLI flags.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub simulation_tick_rate: u32,
    pub snapshot_rate: u32,
    pub max_clients: usize,
    pub render_distance: i32,
    pub max_packet_size: usize,

    pub position_precision: f32,
    pub prediction_error_threshold: f32,
    pub prediction_correction_factor: f32,

    pub interpolation_delay_ms: i64,
    pub ping_interval_ms: u64,
    pub input_buffer_capacity: usize,
    pub fragment_buffer_timeout_ms: i64,

    pub protocol_version: u32,
    pub world_seed: i64,
    pub spawn_position: glam::Vec3,
    pub max_step_height: f32,

    pub movement: MovementParams,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            simulation_tick_rate: 60,
            snapshot_rate: 20,
            max_clients: 32,
            render_distance: 8,
            max_packet_size: 1200,

            position_precision: 0.01,
            prediction_error_threshold: 0.5,
            prediction_correction_factor: 0.1,

            interpolation_delay_ms: 100,
            ping_interval_ms: 1000,
            input_buffer_capacity: 256,
            fragment_buffer_timeout_ms: 5000,

            protocol_version: 1,
            world_seed: 0,
            spawn_position: glam::Vec3::new(0.0, 80.0, 0.0),
            max_step_height: 0.5,

            movement: MovementParams::default(),
        }
    }
}
