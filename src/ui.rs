use crate::app::{App, InputMode};
use crate::model::ListKind;
use crate::playlist::BufferStatus;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use std::time::Duration;

const APP_TITLE: &str = "randplay  ";

#[derive(Clone, Copy)]
struct Palette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    focus_border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    selected_bg: Color,
}

const COLORS: Palette = Palette {
    bg: Color::Rgb(10, 15, 24),
    panel_bg: Color::Rgb(19, 29, 43),
    panel_alt_bg: Color::Rgb(24, 38, 58),
    border: Color::Rgb(69, 121, 176),
    focus_border: Color::Rgb(100, 203, 184),
    text: Color::Rgb(214, 228, 248),
    muted: Color::Rgb(149, 173, 204),
    accent: Color::Rgb(100, 203, 184),
    alert: Color::Rgb(249, 174, 88),
    selected_bg: Color::Rgb(34, 55, 82),
};

pub fn draw(frame: &mut Frame, app: &App) {
    let colors = COLORS;
    let core = &app.core;
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let songs_left = core
        .songs_left()
        .map(|left| left.to_string())
        .unwrap_or_else(|| String::from("-"));
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("Pool {}", core.pool().len()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("No-repeat {}", core.window()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("Songs left {songs_left}"),
            Style::default().fg(colors.alert),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(now_playing_line(app), Style::default().fg(colors.text)),
    ]))
    .block(panel_block("Status", colors.panel_bg, colors.text, colors.border));
    frame.render_widget(header, vertical[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(vertical[1]);

    draw_upcoming(frame, app, body[0], &colors);
    draw_browse(frame, app, body[1], &colors);

    let (input_title, input_text) = match app.input_mode {
        InputMode::Search => ("Search", format!("/{}", app.input)),
        InputMode::Command => ("Command", format!(":{}", app.input)),
        InputMode::Normal if core.query_is_valid() => ("Query", core.query_text().to_string()),
        InputMode::Normal => ("Query", format!("{}  (invalid)", core.query_text())),
    };
    let input_style = if core.query_is_valid() || app.input_mode == InputMode::Command {
        Style::default().fg(colors.text)
    } else {
        Style::default().fg(colors.alert)
    };
    let input = Paragraph::new(Span::styled(input_text, input_style)).block(panel_block(
        input_title,
        colors.panel_alt_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(input, vertical[2]);

    let status_style = match core.buffer_status() {
        BufferStatus::Filled => Style::default().fg(colors.text),
        BufferStatus::Exhausted { .. } => Style::default().fg(colors.alert),
    };
    let footer = Paragraph::new(Line::from(vec![
        Span::styled(
            "Keys: n/p next/prev, Tab switch, Enter play, + queue, x remove, r reshuffle, / search, : command, q quit",
            Style::default().fg(colors.muted),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(core.status.as_str(), status_style),
    ]))
    .block(panel_block(
        "Message",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(footer, vertical[3]);
}

fn draw_upcoming(frame: &mut Frame, app: &App, area: Rect, colors: &Palette) {
    let core = &app.core;
    let rows = core.upcoming_rows();
    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| {
            let marker = match row.offset {
                0 if row.selected => String::from(" >  "),
                0 => String::from(" .  "),
                offset if offset < 0 => String::from("    "),
                offset if row.queued => format!("{offset:>2}+ "),
                offset => format!("{offset:>3} "),
            };
            let name = row
                .item
                .map(|item| core.display_name(item))
                .unwrap_or_default();
            let style = if row.offset < 0 {
                Style::default().fg(colors.muted)
            } else if row.selected {
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(colors.text)
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.muted)),
                Span::styled(name, style),
            ]))
        })
        .collect();

    let behind = core.settings().look_behind_before as isize;
    let mut state = ListState::default();
    if app.focus == ListKind::Playlist {
        state.select(usize::try_from(app.upcoming_offset + behind).ok());
    }

    let list = List::new(items)
        .block(focus_block("Up Next", app.focus == ListKind::Playlist, colors))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_browse(frame: &mut Frame, app: &App, area: Rect, colors: &Palette) {
    let core = &app.core;
    let rows = core.browse_rows();
    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| {
            let marker = if row.selected { " >  " } else { "    " };
            let style = if row.selected {
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(colors.text)
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(colors.muted)),
                Span::styled(core.display_name(row.item), style),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    if app.focus == ListKind::Browse && !rows.is_empty() {
        state.select(Some(app.browse_row.min(rows.len() - 1)));
    }

    let title = format!("Browse ({}/{})", rows.len(), core.pool().len());
    let list = List::new(items)
        .block(focus_block(&title, app.focus == ListKind::Browse, colors))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn now_playing_line(app: &App) -> String {
    let core = &app.core;
    let Some(item) = core.now_playing() else {
        return String::from("Nothing playing");
    };
    let elapsed = app
        .player()
        .elapsed()
        .map(format_duration)
        .unwrap_or_else(|| String::from("--:--"));
    format!(
        "{} [{}] {elapsed} via {}",
        core.display_name(item),
        core.cursor().active().label(),
        app.player().name()
    )
}

fn focus_block<'a>(title: &'a str, focused: bool, colors: &Palette) -> Block<'a> {
    let border = if focused {
        colors.focus_border
    } else {
        colors.border
    };
    panel_block(title, colors.panel_bg, colors.text, border)
}

fn panel_block(title: &str, bg: Color, text: Color, border: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg))
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes:02}:{seconds:02}")
}
