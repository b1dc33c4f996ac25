//! Settings and session screens, and the popups drawn over them.

use super::effects::Spinner;
use super::render::draw_help;
use super::snapshot::Snapshot;
use super::theme::{Icons, Theme};
use crate::app::{ConnectStatus, DeleteChoice, SessionSelection, SettingsField, SettingsModal};
use crate::keyboard::EntryView;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthChar;

const FIELDS: [SettingsField; 3] = [SettingsField::Endpoint, SettingsField::ApiKey, SettingsField::DefaultModel];

fn screen_chunks(area: Rect) -> (Rect, Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Title
            Constraint::Min(0),    // Body
            Constraint::Length(1), // Help
        ])
        .split(area);
    (chunks[0], chunks[1], chunks[2])
}

fn draw_title(buf: &mut Buffer, area: Rect, title: &str) {
    let line = Line::from(vec![
        Span::styled("◆ ", Theme::accent()),
        Span::styled(title.to_string(), Theme::title()),
    ]);
    buf.set_line(area.x + 1, area.y, &line, area.width.saturating_sub(2));
}

pub(super) fn draw_settings(
    f: &mut Frame,
    area: Rect,
    snap: &Snapshot<'_>,
    field: SettingsField,
    modal: &SettingsModal,
    icons: &Icons,
) {
    let (title, body, help) = screen_chunks(area);
    let buf = f.buffer_mut();
    draw_title(buf, title, "Settings");

    let settings = snap.settings;
    let mut anchor = body;
    for (i, candidate) in FIELDS.iter().enumerate() {
        let y = body.y + i as u16 * 2;
        if y >= body.bottom() {
            break;
        }
        let selected = *candidate == field;
        let value = match candidate {
            SettingsField::Endpoint => settings.endpoint.clone(),
            SettingsField::ApiKey if settings.api_key.is_empty() => "(not set)".to_string(),
            SettingsField::ApiKey => "•".repeat(settings.api_key.chars().count().min(24)),
            SettingsField::DefaultModel => settings
                .default_model()
                .map(str::to_string)
                .or_else(|| snap.directory.selected_model().map(str::to_string))
                .unwrap_or_else(|| "(none)".to_string()),
        };
        let marker = if selected { icons.selected } else { " " };
        let label_style = if selected { Theme::selected_row() } else { Theme::muted() };
        let line = Line::from(vec![
            Span::styled(format!(" {marker} "), Theme::accent()),
            Span::styled(format!("{:<14}", candidate.label()), label_style),
            Span::styled(value, Theme::text()),
        ]);
        buf.set_line(body.x, y, &line, body.width);
        if *candidate == SettingsField::DefaultModel {
            anchor = Rect::new(body.x + 18, y, body.width.saturating_sub(18), 1);
        }
    }

    let status_y = body.y + FIELDS.len() as u16 * 2 + 1;
    if status_y < body.bottom() {
        let status = if snap.connect_failed {
            Line::styled("   Connection failed. Check the endpoint and API key.", Theme::error())
        } else if snap.directory.is_loaded() && !snap.directory.is_empty() {
            Line::styled(
                format!("   Connected · {} model(s) available", snap.directory.models().len()),
                Theme::success(),
            )
        } else {
            Line::default()
        };
        buf.set_line(body.x, status_y, &status, body.width);
    }

    let hints: &[(&str, &str)] = match modal {
        SettingsModal::ModelDropdown { .. } => &[("↑↓", "choose"), ("Enter", "save"), ("Esc", "cancel")],
        SettingsModal::Keyboard(_) => &[("Enter", "save"), ("Esc", "cancel")],
        SettingsModal::Connecting(_) => &[("hold q", "quit")],
        SettingsModal::None => &[("↑↓", "field"), ("Enter", "edit"), ("Esc", "back")],
    };
    draw_help(buf, help, hints);

    if snap.clock.dropdown_visible() {
        let hovered = match modal {
            SettingsModal::ModelDropdown { hovered } => Some(*hovered),
            _ => None,
        };
        draw_model_dropdown(buf, anchor, snap, hovered, icons);
    }
    if let SettingsModal::Connecting(flow) = modal {
        draw_connecting(buf, area, flow.status(), snap);
    }
}

/// Model list sliding out of `anchor`, its height eased by the clock.
pub(super) fn draw_model_dropdown(
    buf: &mut Buffer,
    anchor: Rect,
    snap: &Snapshot<'_>,
    hovered: Option<usize>,
    icons: &Icons,
) {
    let models = snap.directory.models();
    let screen = buf.area;
    let wanted = snap.clock.dropdown_height.round() as u16;
    let room_above = anchor.y.saturating_sub(screen.y);
    let room_below = screen.bottom().saturating_sub(anchor.bottom());
    let (y, height) = if room_above >= wanted || room_above >= room_below {
        let height = wanted.min(room_above);
        (anchor.y - height, height)
    } else {
        (anchor.bottom(), wanted.min(room_below))
    };
    if height < 2 {
        return;
    }

    let longest = models.iter().map(|m| m.chars().count()).max().unwrap_or(0) as u16;
    let width = (longest + 6).clamp(20, screen.width);
    let x = (anchor.x + anchor.width / 2)
        .saturating_sub(width / 2)
        .min(screen.right().saturating_sub(width));
    let rect = Rect::new(x, y, width, height);
    Clear.render(rect, buf);

    let rows = height.saturating_sub(2) as usize;
    let focus = hovered.or(snap.directory.selected()).unwrap_or(0);
    let first = focus.saturating_sub(rows.saturating_sub(1));
    let lines: Vec<Line> = models
        .iter()
        .enumerate()
        .skip(first)
        .take(rows)
        .map(|(i, model)| {
            let marker = if snap.directory.selected() == Some(i) { icons.selected } else { " " };
            let style = if hovered == Some(i) { Theme::selected_row() } else { Theme::text() };
            Line::from(vec![
                Span::styled(format!("{marker} "), Theme::accent()),
                Span::styled(model.clone(), style),
            ])
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Theme::border_focused())
        .title(Line::styled(" Models ", Theme::title()));
    Paragraph::new(lines).block(block).render(rect, buf);
}

fn draw_connecting(buf: &mut Buffer, area: Rect, status: ConnectStatus, snap: &Snapshot<'_>) {
    let width = (area.width / 2).max(30).min(area.width);
    let popup = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + area.height.saturating_sub(5) / 2,
        width,
        5.min(area.height),
    );
    Clear.render(popup, buf);

    let spinner = Spinner::frame(snap.anim_step());
    let line = match status {
        ConnectStatus::Connecting => Line::styled(format!("{spinner} Connecting..."), Theme::accent()),
        ConnectStatus::Fetching => Line::styled(format!("{spinner} Fetching models..."), Theme::accent()),
        ConnectStatus::Failed => Line::styled("Connection failed", Theme::error()),
        ConnectStatus::Done => Line::styled(
            format!("Found {} model(s)", snap.directory.models().len()),
            Theme::success(),
        ),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Theme::border_focused());
    Paragraph::new(vec![Line::default(), line.centered()])
        .block(block)
        .render(popup, buf);
}

pub(super) fn draw_sessions(
    f: &mut Frame,
    area: Rect,
    snap: &Snapshot<'_>,
    selection: SessionSelection,
    confirm: Option<DeleteChoice>,
    icons: &Icons,
) {
    let (title, body, help) = screen_chunks(area);
    let buf = f.buffer_mut();
    draw_title(buf, title, "Sessions");

    // Row 0 is "new chat", row i+1 is session i
    let selected_row = match selection {
        SessionSelection::NewChat => 0,
        SessionSelection::Existing(i) => i + 1,
    };
    let rows = body.height as usize;
    let first = selected_row.saturating_sub(rows.saturating_sub(1));
    let store = snap.store;
    for (offset, row) in (first..=store.len()).take(rows).enumerate() {
        let y = body.y + offset as u16;
        let selected = row == selected_row;
        let style = if selected { Theme::selected_row() } else { Theme::text() };
        let marker = if selected { "›" } else { " " };
        let line = if row == 0 {
            Line::from(vec![
                Span::styled(format!(" {marker} "), Theme::accent()),
                Span::styled("+ New chat", style.add_modifier(Modifier::BOLD)),
            ])
        } else {
            let index = row - 1;
            let current = if index == store.current_index() { icons.selected } else { " " };
            Line::from(vec![
                Span::styled(format!(" {marker} "), Theme::accent()),
                Span::styled(format!("{current} "), Theme::accent()),
                Span::styled(format!("{:>2}. ", index + 1), Theme::dim()),
                Span::styled(store.preview(index), style),
            ])
        };
        buf.set_line(body.x, y, &line, body.width);
    }

    let hints: &[(&str, &str)] = match confirm {
        Some(_) => &[("←→", "choose"), ("Enter", "confirm"), ("Esc", "cancel")],
        None => &[("↑↓", "select"), ("Enter", "open"), ("x", "delete"), ("Esc", "back")],
    };
    draw_help(buf, help, hints);

    if let Some(choice) = confirm {
        draw_delete_confirm(buf, area, choice);
    }
}

fn draw_delete_confirm(buf: &mut Buffer, area: Rect, choice: DeleteChoice) {
    let width = 34.min(area.width);
    let popup = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + area.height.saturating_sub(6) / 2,
        width,
        6.min(area.height),
    );
    Clear.render(popup, buf);

    let button = |label: &'static str, active: bool| {
        if active {
            Span::styled(format!("[ {label} ]"), Theme::pill(true))
        } else {
            Span::styled(format!("  {label}  "), Theme::muted())
        }
    };
    let lines = vec![
        Line::styled("Delete this session?", Theme::text()).centered(),
        Line::default(),
        Line::from(vec![
            button("Yes", choice == DeleteChoice::Yes),
            Span::raw("   "),
            button("No", choice == DeleteChoice::No),
        ])
        .centered(),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Theme::warning())
        .title(Line::styled(" Confirm ", Theme::warning()));
    Paragraph::new(lines).block(block).render(popup, buf);
}

/// Text entry box with a terminal cursor.
pub(super) fn draw_entry(f: &mut Frame, area: Rect, entry: &EntryView) {
    let width = (area.width * 7 / 10).max(20).min(area.width);
    let popup = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + area.height.saturating_sub(3) / 2,
        width,
        3.min(area.height),
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Theme::border_focused())
        .title(Line::styled(format!(" {} ", entry.title), Theme::title()))
        .title_bottom(Line::styled(" Enter ok · Esc cancel ", Theme::muted()));
    let inner = block.inner(popup);

    // Scroll horizontally so the cursor stays visible
    let visible = inner.width.saturating_sub(1) as usize;
    let skip = entry.cursor_col.saturating_sub(visible);
    let (text, skipped) = skip_columns(&entry.text, skip);

    let buf = f.buffer_mut();
    Clear.render(popup, buf);
    block.render(popup, buf);
    buf.set_stringn(inner.x, inner.y, text, inner.width as usize, Theme::text());

    let cursor_x = inner.x + entry.cursor_col.saturating_sub(skipped) as u16;
    f.set_cursor_position(Position::new(cursor_x.min(inner.right().saturating_sub(1)), inner.y));
}

/// Drop at least `columns` display columns from the front of `text`.
/// Returns the rest and the number of columns actually dropped.
fn skip_columns(text: &str, columns: usize) -> (&str, usize) {
    let mut dropped = 0;
    for (byte, ch) in text.char_indices() {
        if dropped >= columns {
            return (&text[byte..], dropped);
        }
        dropped += ch.width().unwrap_or(0);
    }
    ("", dropped)
}
