use voxelnet::Configuration;

/// CLI-tunable subset of [`Configuration`]; everything else keeps the core's
/// defaults.
#[derive(Debug, Clone)]
pub struct ServerArgs {
    pub tick_rate: u32,
    pub max_clients: usize,
    pub render_distance: i32,
}

impl ServerArgs {
    pub fn into_configuration(self) -> Configuration {
        Configuration {
            simulation_tick_rate: self.tick_rate,
            max_clients: self.max_clients,
            render_distance: self.render_distance,
            ..Configuration::default()
        }
    }
}
