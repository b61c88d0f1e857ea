mod config;
mod tui;

use std::io;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use voxelnet::{BlockRegistry, GameEvent, QueueEventBus, Server, SimpleEntityStore, World};

use config::ServerArgs;

#[derive(Parser)]
#[command(name = "voxelnet-server")]
#[command(about = "Authoritative voxel-world game server")]
struct Args {
    #[arg(short, long, default_value_t = 0)]
    port: u16,

    #[arg(short, long, default_value_t = 60)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 32)]
    max_clients: usize,

    #[arg(short, long, default_value_t = 8)]
    render_distance: i32,

    #[arg(long, help = "Run without the interactive dashboard")]
    headless: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = ServerArgs {
        tick_rate: args.tick_rate,
        max_clients: args.max_clients,
        render_distance: args.render_distance,
    }
    .into_configuration();

    let mut world = World::new(BlockRegistry::default());
    let mut entities = SimpleEntityStore::default();
    let mut events = QueueEventBus::default();

    let mut server = Server::new(args.port, config)?;
    server.set_world(&mut world);
    server.set_entities(&mut entities);
    server.set_events(&mut events);
    server.initialize();

    if args.headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        log::info!("server listening on {}", server.local_addr());
        run_headless(&mut server, &mut events);
    } else {
        run_with_tui(&mut server, &mut events, args.max_clients)?;
    }

    server.shutdown();
    Ok(())
}

fn run_headless(server: &mut Server<'_>, events: &mut QueueEventBus) {
    let mut last = Instant::now();
    loop {
        let now = Instant::now();
        let dt = (now - last).as_secs_f32();
        last = now;

        server.update(dt);
        log_events(events);

        std::thread::sleep(Duration::from_millis(10));
    }
}

fn run_with_tui(
    server: &mut Server<'_>,
    events: &mut QueueEventBus,
    max_clients: usize,
) -> io::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let start = Instant::now();
    let mut last = Instant::now();
    let mut running = true;

    while running {
        let now = Instant::now();
        let dt = (now - last).as_secs_f32();
        last = now;

        server.update(dt);
        log_events(events);

        if event::poll(Duration::from_millis(1))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                {
                    running = false;
                }
            }
        }

        let stats = tui::ServerStats {
            uptime_secs: start.elapsed().as_secs(),
            tick: server.server_tick(),
            client_count: server.connected_client_count(),
            max_clients,
            entity_count: server.entity_count(),
            network_stats: server.network_stats().clone(),
        };
        terminal.draw(|frame| tui::render(frame, &stats))?;
    }

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;
    Ok(())
}

fn log_events(events: &mut QueueEventBus) {
    for event in events.drain() {
        match event {
            GameEvent::ServerStarted { port } => log::info!("listening on port {port}"),
            GameEvent::ServerStopped => log::info!("server stopped"),
            GameEvent::ConnectionEstablished { entity_id } => {
                log::info!("handshake complete for entity {entity_id}")
            }
            GameEvent::ConnectionLost { reason, was_timeout } => {
                log::info!("connection lost ({reason}), timeout={was_timeout}")
            }
            GameEvent::PlayerJoined { entity_id, name } => {
                log::info!("{name} joined as entity {entity_id}")
            }
            GameEvent::PlayerLeft { entity_id, reason } => {
                log::info!("entity {entity_id} left: {reason}")
            }
            GameEvent::ChunkReceived { cx, cz } => log::debug!("chunk ({cx}, {cz}) received"),
        }
    }
}
