mod screens;

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use glam::Vec3;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use voxelnet::protocol::{InputFlags, PlayerInput};
use voxelnet::{Client, ClientState, Configuration, World};

pub use screens::Screen;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const CHAT_LOG_CAPACITY: usize = 50;
/// Terminals rarely deliver key-release events; a directional key is treated as
/// "held" until this long after its last observed press, which rides on the
/// OS key-repeat rate while a key is down.
const KEY_HOLD_WINDOW: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Normal,
    Chat,
}

#[derive(Default)]
struct MoveState {
    forward_until: Option<Instant>,
    back_until: Option<Instant>,
    left_until: Option<Instant>,
    right_until: Option<Instant>,
    sprint_until: Option<Instant>,
    jump_pulse: bool,
}

impl MoveState {
    fn press(&mut self, field: fn(&mut Self) -> &mut Option<Instant>) {
        *field(self) = Some(Instant::now() + KEY_HOLD_WINDOW);
    }

    fn active(until: Option<Instant>) -> bool {
        until.is_some_and(|t| Instant::now() < t)
    }
}

pub struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    screen: Screen,
    player_name: String,
    address_input: String,
    connect_error: Option<String>,
    selected_index: usize,
    should_quit: bool,
    input_mode: InputMode,
    chat_input: String,
    chat_log: Vec<String>,
    yaw_deg: f32,
    pitch_deg: f32,
    move_state: MoveState,
    connect_started: Option<Instant>,
    last_tick: Instant,
}

impl Tui {
    pub fn new(player_name: String) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            screen: Screen::MainMenu,
            player_name,
            address_input: String::from("127.0.0.1:27015"),
            connect_error: None,
            selected_index: 0,
            should_quit: false,
            input_mode: InputMode::Normal,
            chat_input: String::new(),
            chat_log: Vec::new(),
            yaw_deg: 0.0,
            pitch_deg: 0.0,
            move_state: MoveState::default(),
            connect_started: None,
            last_tick: Instant::now(),
        })
    }

    /// Binds the client socket once up front, then drives the menu/connect/play
    /// loop against it for the life of the process; reconnecting re-uses the same
    /// socket and world rather than tearing either down.
    pub fn run(&mut self, world: &mut World) -> io::Result<()> {
        let mut client = Client::new(self.player_name.clone(), Configuration::default())?;
        client.set_world(world);

        while !self.should_quit {
            self.tick(&mut client);
            self.draw(&client)?;

            if event::poll(Duration::from_millis(8))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code, key.modifiers, &mut client);
                    }
                }
            }
        }

        client.disconnect(String::from("client quit"));
        self.restore_terminal()
    }

    fn tick(&mut self, client: &mut Client<'_>) {
        let dt = self.last_tick.elapsed().as_secs_f32();
        self.last_tick = Instant::now();
        client.update(dt);

        for (speaker, message) in client.drain_chat() {
            self.push_chat(format!("[{speaker}] {message}"));
        }

        match (self.screen, client.connection_state()) {
            (Screen::Connecting, ClientState::Connected) => {
                self.screen = Screen::Connected;
                self.connect_started = None;
            }
            (Screen::Connecting, ClientState::Disconnected) => {
                self.connect_error = Some("server rejected the connection".to_string());
                self.screen = Screen::Connect;
                return;
            }
            (Screen::Connecting, _) => {
                if self
                    .connect_started
                    .is_some_and(|t| t.elapsed() > Duration::from_secs(CONNECT_TIMEOUT_SECS))
                {
                    self.connect_error = Some("connection timed out".to_string());
                    client.disconnect_now();
                    self.screen = Screen::Connect;
                    return;
                }
            }
            (Screen::Connected, ClientState::Disconnected) => {
                self.push_chat("disconnected from server".to_string());
                self.screen = Screen::MainMenu;
                self.selected_index = 0;
                return;
            }
            _ => {}
        }

        if self.screen == Screen::Connected {
            self.send_movement(client);
        }
    }

    fn send_movement(&mut self, client: &mut Client<'_>) {
        let yaw = self.yaw_deg.to_radians();
        let forward = Vec3::new(-yaw.sin(), 0.0, -yaw.cos());
        let right = Vec3::new(yaw.cos(), 0.0, -yaw.sin());

        let mut wish = Vec3::ZERO;
        if MoveState::active(self.move_state.forward_until) {
            wish += forward;
        }
        if MoveState::active(self.move_state.back_until) {
            wish -= forward;
        }
        if MoveState::active(self.move_state.right_until) {
            wish += right;
        }
        if MoveState::active(self.move_state.left_until) {
            wish -= right;
        }

        let mut flags = InputFlags::empty();
        if MoveState::active(self.move_state.sprint_until) {
            flags |= InputFlags::SPRINT;
        }
        if self.move_state.jump_pulse {
            flags |= InputFlags::JUMP;
            self.move_state.jump_pulse = false;
        }

        client.send_input(PlayerInput {
            sequence: 0,
            delta_time: 1.0 / 60.0,
            wish_direction: wish,
            flags,
            yaw_deg: self.yaw_deg,
            pitch_deg: self.pitch_deg,
            action_flags: 0,
        });
    }

    fn send_toggle(&self, client: &mut Client<'_>, flags: InputFlags) {
        client.send_input(PlayerInput {
            sequence: 0,
            delta_time: 0.0,
            wish_direction: Vec3::ZERO,
            flags,
            yaw_deg: self.yaw_deg,
            pitch_deg: self.pitch_deg,
            action_flags: 0,
        });
    }

    fn draw(&mut self, client: &Client<'_>) -> io::Result<()> {
        let screen = self.screen;
        let selected = self.selected_index;
        let address_input = self.address_input.clone();
        let connect_error = self.connect_error.clone();
        let player_name = self.player_name.clone();
        let chat_log = self.chat_log.clone();
        let chat_editing = self.input_mode == InputMode::Chat;
        let chat_input = self.chat_input.clone();

        self.terminal.draw(|frame| {
            screens::render(
                frame,
                screen,
                selected,
                &address_input,
                connect_error.as_deref(),
                &player_name,
                client,
                &chat_log,
                chat_editing,
                &chat_input,
            );
        })?;

        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers, client: &mut Client<'_>) {
        if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if self.input_mode == InputMode::Chat {
            self.handle_chat_key(code, client);
            return;
        }

        match self.screen {
            Screen::MainMenu => self.handle_main_menu_key(code),
            Screen::Connect => self.handle_connect_key(code, client),
            Screen::Connecting => self.handle_connecting_key(code, client),
            Screen::Connected => self.handle_connected_key(code, modifiers, client),
        }
    }

    fn handle_main_menu_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_index = self.selected_index.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected_index = (self.selected_index + 1).min(1);
            }
            KeyCode::Enter => match self.selected_index {
                0 => self.screen = Screen::Connect,
                1 => self.should_quit = true,
                _ => {}
            },
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            _ => {}
        }
    }

    fn handle_connect_key(&mut self, code: KeyCode, client: &mut Client<'_>) {
        match code {
            KeyCode::Esc => {
                self.connect_error = None;
                self.screen = Screen::MainMenu;
            }
            KeyCode::Enter => self.begin_connect(client),
            KeyCode::Backspace => {
                self.address_input.pop();
            }
            KeyCode::Char(c) => {
                if c.is_ascii_digit() || c == '.' || c == ':' {
                    self.address_input.push(c);
                }
            }
            _ => {}
        }
    }

    fn handle_connecting_key(&mut self, code: KeyCode, client: &mut Client<'_>) {
        if matches!(code, KeyCode::Esc) {
            client.disconnect_now();
            self.screen = Screen::MainMenu;
        }
    }

    fn handle_connected_key(&mut self, code: KeyCode, modifiers: KeyModifiers, client: &mut Client<'_>) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                client.disconnect(String::from("user disconnected"));
            }
            KeyCode::Enter => {
                self.input_mode = InputMode::Chat;
                self.chat_input.clear();
            }
            KeyCode::Char('w') => {
                self.move_state.press(|s| &mut s.forward_until);
                if modifiers.contains(KeyModifiers::SHIFT) {
                    self.move_state.press(|s| &mut s.sprint_until);
                }
            }
            KeyCode::Char('s') => self.move_state.press(|s| &mut s.back_until),
            KeyCode::Char('a') => self.move_state.press(|s| &mut s.left_until),
            KeyCode::Char('d') => self.move_state.press(|s| &mut s.right_until),
            KeyCode::Char(' ') => self.move_state.jump_pulse = true,
            KeyCode::Left => self.yaw_deg -= 4.0,
            KeyCode::Right => self.yaw_deg += 4.0,
            KeyCode::Up => self.pitch_deg = (self.pitch_deg + 4.0).min(89.0),
            KeyCode::Down => self.pitch_deg = (self.pitch_deg - 4.0).max(-89.0),
            KeyCode::Char('f') => self.send_toggle(client, InputFlags::FLY_TOGGLE),
            KeyCode::Char('g') => self.send_toggle(client, InputFlags::SWIM_TOGGLE),
            _ => {}
        }
    }

    fn handle_chat_key(&mut self, code: KeyCode, client: &mut Client<'_>) {
        match code {
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.chat_input.clear();
            }
            KeyCode::Enter => {
                let message = self.chat_input.trim().to_string();
                if !message.is_empty() {
                    client.send_chat(message.clone());
                    self.push_chat(format!("[{}] {}", self.player_name, message));
                }
                self.input_mode = InputMode::Normal;
                self.chat_input.clear();
            }
            KeyCode::Backspace => {
                self.chat_input.pop();
            }
            KeyCode::Char(c) => self.chat_input.push(c),
            _ => {}
        }
    }

    fn begin_connect(&mut self, client: &mut Client<'_>) {
        let Ok(addr) = self.address_input.parse::<std::net::SocketAddr>() else {
            self.connect_error = Some("invalid address, expected host:port".to_string());
            return;
        };

        if let Err(e) = client.connect(&addr.ip().to_string(), addr.port()) {
            self.connect_error = Some(format!("connect failed: {e}"));
            return;
        }

        self.connect_error = None;
        self.connect_started = Some(Instant::now());
        self.screen = Screen::Connecting;
    }

    fn push_chat(&mut self, line: String) {
        self.chat_log.push(line);
        if self.chat_log.len() > CHAT_LOG_CAPACITY {
            self.chat_log.remove(0);
        }
    }

    fn restore_terminal(&mut self) -> io::Result<()> {
        terminal::disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            cursor::Show
        )?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = self.restore_terminal();
    }
}
