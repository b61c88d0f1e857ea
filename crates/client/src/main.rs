mod tui;

use clap::Parser;
use voxelnet::{BlockRegistry, World};

#[derive(Parser)]
#[command(name = "voxelnet-client")]
#[command(about = "Voxel-world game client")]
struct Args {
    #[arg(short, long, default_value = "player")]
    name: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let mut world = World::new(BlockRegistry::default());

    let mut tui = tui::Tui::new(args.name)?;
    tui.run(&mut world)?;

    Ok(())
}
