use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph};

use voxelnet::Client;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    MainMenu,
    Connect,
    Connecting,
    Connected,
}

#[allow(clippy::too_many_arguments)]
pub fn render(
    frame: &mut Frame,
    screen: Screen,
    selected: usize,
    address_input: &str,
    connect_error: Option<&str>,
    player_name: &str,
    client: &Client<'_>,
    chat_log: &[String],
    chat_editing: bool,
    chat_input: &str,
) {
    let area = frame.area();

    let block = Block::default()
        .title(" voxelnet ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(block, area);

    let inner = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([Constraint::Min(0)])
        .split(area)[0];

    match screen {
        Screen::MainMenu => render_main_menu(frame, inner, selected),
        Screen::Connect => render_connect(frame, inner, address_input, connect_error),
        Screen::Connecting => render_connecting(frame, inner, client),
        Screen::Connected => {
            render_connected(frame, inner, player_name, client, chat_log, chat_editing, chat_input)
        }
    }
}

fn render_main_menu(frame: &mut Frame, area: Rect, selected: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Length(1), Constraint::Min(0)])
        .split(area);

    let title = r#"
 __   _____  __ _____ _    _   _ ___ _____
 \ \ / / _ \ \ \/ / __| |  | \ | | __|_   _|
  \ V / (_) | >  <| _|| |__|  \| | _|  | |
   \_/ \___/ /_/\_\___|____|_|\_|___| |_|
"#;

    let title_widget = Paragraph::new(title)
        .style(Style::default().fg(Color::Cyan))
        .alignment(Alignment::Center);
    frame.render_widget(title_widget, chunks[0]);

    let menu_items = vec![
        ListItem::new("  Connect to Server"),
        ListItem::new("  Quit"),
    ];

    let menu_items: Vec<ListItem> = menu_items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            if i == selected {
                item.style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            } else {
                item.style(Style::default().fg(Color::White))
            }
        })
        .collect();

    let menu = List::new(menu_items).block(
        Block::default()
            .title(" Menu ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    let menu_area = centered_rect(40, 6, chunks[2]);
    frame.render_widget(menu, menu_area);
}

fn render_connect(frame: &mut Frame, area: Rect, input: &str, error: Option<&str>) {
    let dialog_area = centered_rect(50, 10, area);
    frame.render_widget(Clear, dialog_area);

    let dialog = Block::default()
        .title(" Connect to Server ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(dialog, dialog_area);

    let inner = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(dialog_area);

    let label = Paragraph::new("Server Address:").style(Style::default().fg(Color::White));
    frame.render_widget(label, inner[0]);

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let input_text = Paragraph::new(format!("{input}_"))
        .style(Style::default().fg(Color::White))
        .block(input_block);
    frame.render_widget(input_text, inner[1]);

    if let Some(err) = error {
        let error_text = Paragraph::new(err)
            .style(Style::default().fg(Color::Red))
            .alignment(Alignment::Center);
        frame.render_widget(error_text, inner[2]);
    }

    let help = Paragraph::new("Enter Connect  Esc Cancel")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(help, inner[3]);
}

fn render_connecting(frame: &mut Frame, area: Rect, client: &Client<'_>) {
    let dialog_area = centered_rect(40, 8, area);
    frame.render_widget(Clear, dialog_area);

    let dialog = Block::default()
        .title(" Connecting ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    frame.render_widget(dialog, dialog_area);

    let inner = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(dialog_area);

    let status = format!("Status: {:?}\n\nPlease wait...", client.connection_state());
    let status_text = Paragraph::new(status)
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Center);
    frame.render_widget(status_text, inner[0]);

    let help = Paragraph::new("Esc Cancel")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(help, inner[1]);
}

#[allow(clippy::too_many_arguments)]
fn render_connected(
    frame: &mut Frame,
    area: Rect,
    player_name: &str,
    client: &Client<'_>,
    chat_log: &[String],
    chat_editing: bool,
    chat_input: &str,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    let pos = client.predicted_position();
    let status = vec![
        Line::from(vec![
            Span::styled("Player: ", Style::default().fg(Color::Gray)),
            Span::styled(player_name, Style::default().fg(Color::White)),
            Span::raw("   "),
            Span::styled("Ping: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:.0}ms", client.ping_ms()),
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::from(vec![
            Span::styled("Position: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:.1}, {:.1}, {:.1}", pos.x, pos.y, pos.z),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(Span::styled(
            "WASD move  Shift sprint  Space jump  F fly  G swim  Arrows look  Enter chat  Q quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let status_block = Block::default()
        .title(" Connected ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));
    frame.render_widget(Paragraph::new(status).block(status_block), chunks[0]);

    let chat_items: Vec<ListItem> = chat_log.iter().rev().take(chunks[1].height as usize).rev()
        .map(|line| ListItem::new(line.as_str()))
        .collect();
    let chat_block = Block::default().title(" Chat ").borders(Borders::ALL);
    frame.render_widget(List::new(chat_items).block(chat_block), chunks[1]);

    let input_style = if chat_editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let input_block = Block::default()
        .title(if chat_editing { " Chat (Enter to send, Esc to cancel) " } else { " Press Enter to chat " })
        .borders(Borders::ALL)
        .border_style(input_style);
    let input_text = if chat_editing { format!("{chat_input}_") } else { String::new() };
    frame.render_widget(Paragraph::new(input_text).block(input_block), chunks[2]);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
