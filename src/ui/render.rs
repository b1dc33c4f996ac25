//! Chat screen and the overlays shared by every screen.

use super::effects::{shimmer_spans, ProgressBar, Spinner};
use super::panels;
use super::snapshot::Snapshot;
use super::theme::{faded, Icons, Theme};
use crate::anim::compose_alpha;
use crate::app::{CameraPhase, ChatModal, Focus, Screen};
use crate::layout::max_scroll;
use crate::pipeline::PipelinePhase;
use crate::store::{Message, Sender};
use image::{Rgba, RgbaImage};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget},
    Frame,
};

/// Draw one frame.
pub fn draw(f: &mut Frame, snap: &Snapshot<'_>, icons: &Icons) {
    let area = f.area();
    match snap.screen {
        Screen::Chat { modal } => draw_chat(f, area, snap, *modal, icons),
        Screen::Settings { field, modal } => panels::draw_settings(f, area, snap, *field, modal, icons),
        Screen::Sessions { selection, confirm } => {
            panels::draw_sessions(f, area, snap, *selection, *confirm, icons)
        }
    }
    if let Some(entry) = &snap.entry {
        panels::draw_entry(f, area, entry);
    }
    if snap.hold > 0.0 {
        draw_hold_bar(f.buffer_mut(), area, snap.hold);
    }
}

fn draw_chat(f: &mut Frame, area: Rect, snap: &Snapshot<'_>, modal: ChatModal, icons: &Icons) {
    // Rows outside the history add up to Metrics::TERMINAL.chrome_height
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(0),    // History
            Constraint::Length(1), // Spacer
            Constraint::Length(1), // Model pill
            Constraint::Length(3), // Input row
            Constraint::Length(1), // Help
        ])
        .split(area);

    let ui_alpha = snap.clock.ui_alpha;
    draw_header(f.buffer_mut(), chunks[0], snap, ui_alpha);
    draw_history(f.buffer_mut(), chunks[1], snap, icons, ui_alpha);
    draw_model_pill(f.buffer_mut(), chunks[3], snap, ui_alpha);
    draw_input_row(f.buffer_mut(), chunks[4], snap, icons, ui_alpha);
    draw_help(f.buffer_mut(), chunks[5], chat_hints(modal));

    if snap.clock.dropdown_visible() {
        let hovered = match modal {
            ChatModal::ModelDropdown { hovered } => Some(hovered),
            _ => None,
        };
        panels::draw_model_dropdown(f.buffer_mut(), chunks[3], snap, hovered, icons);
    }
    if let ChatModal::Camera(phase) = modal {
        draw_camera(f.buffer_mut(), chunks[1], snap, phase);
    }
}

fn draw_header(buf: &mut Buffer, area: Rect, snap: &Snapshot<'_>, alpha: u8) {
    let mut spans = vec![Span::styled("◆ ", faded(Theme::accent(), alpha))];
    match snap.pipeline {
        PipelinePhase::AwaitingReply => {
            spans.extend(shimmer_spans("Padchat", snap.seconds(), faded(Theme::title(), alpha)));
            spans.push(Span::styled(
                format!("  {} Thinking...", Spinner::frame(snap.anim_step())),
                faded(Theme::accent(), alpha),
            ));
        }
        _ => spans.push(Span::styled("Padchat", faded(Theme::title(), alpha))),
    }
    buf.set_line(area.x + 1, area.y, &Line::from(spans), area.width.saturating_sub(2));

    let session = format!(
        "Session {}/{} ",
        snap.store.current_index() + 1,
        snap.store.len()
    );
    let width = session.chars().count() as u16;
    let x = area.x + area.width.saturating_sub(width + 1);
    buf.set_span(x, area.y, &Span::styled(session, faded(Theme::muted(), alpha)), width + 1);
}

fn draw_history(buf: &mut Buffer, area: Rect, snap: &Snapshot<'_>, icons: &Icons, ui_alpha: u8) {
    let messages = snap.store.current();
    if messages.is_empty() {
        let text = if snap.directory.is_fetching() || !snap.directory.is_loaded() {
            Line::from(shimmer_spans("Connecting...", snap.seconds(), Theme::muted()))
        } else if snap.directory.is_empty() {
            Line::styled("No models available. Check the endpoint in settings.", Theme::warning())
        } else {
            Line::styled("Press Enter on the message box to start chatting.", Theme::muted())
        };
        let y = area.y + area.height / 2;
        let width = text.width() as u16;
        let x = area.x + area.width.saturating_sub(width) / 2;
        buf.set_line(x, y, &text, area.width);
        return;
    }

    let metrics = &snap.metrics;
    let bubble_width = (snap.widths.text as u16 + 4).min(area.width.saturating_sub(2));
    let scroll = snap.view.scroll_offset;
    let mut top = 0;
    for (index, msg) in messages.iter().enumerate() {
        let height = metrics.message_height(msg);
        let screen_top = area.y as i32 + top - scroll;
        top += height + metrics.message_gap;
        if screen_top + height <= area.y as i32 {
            continue;
        }
        if screen_top >= area.bottom() as i32 {
            break;
        }

        let alpha = compose_alpha(msg.alpha, ui_alpha);
        let hovered = snap.view.hovered == Some(index);
        let bubble = render_message(msg, snap, icons, bubble_width, height as u16, hovered, alpha);
        let x = match msg.sender {
            Sender::User => area.right().saturating_sub(bubble_width + 1),
            Sender::Assistant => area.x,
        };
        blit(&bubble, buf, x, screen_top, area);
    }

    let limit = max_scroll(metrics.content_height(messages), area.height as i32);
    let marker = faded(Theme::muted(), ui_alpha);
    if scroll > 0 {
        buf.set_string(area.right().saturating_sub(1), area.y, icons.more_above, marker);
    }
    if scroll < limit && area.height > 0 {
        buf.set_string(area.right().saturating_sub(1), area.bottom() - 1, icons.more_below, marker);
    }
}

/// Draw a message bubble into its own buffer, `height` rows tall.
fn render_message(
    msg: &Message,
    snap: &Snapshot<'_>,
    icons: &Icons,
    width: u16,
    height: u16,
    hovered: bool,
    alpha: u8,
) -> Buffer {
    let area = Rect::new(0, 0, width, height);
    let mut buf = Buffer::empty(area);

    let (border, title) = match msg.sender {
        Sender::User => (Theme::user_bubble(), " You "),
        Sender::Assistant => (Theme::assistant_bubble(), " Assistant "),
    };
    let border = if hovered { Theme::hovered_bubble() } else { border };
    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(faded(border, alpha))
        .title(Span::styled(title, faded(Theme::muted(), alpha)));
    if msg.has_reasoning() && !msg.show_reasoning {
        block = block.title_bottom(Line::styled(" t: reasoning ", faded(Theme::muted(), alpha)));
    }
    let inner = block.inner(area);
    block.render(area, &mut buf);
    let inner = Rect {
        x: inner.x + 1,
        width: inner.width.saturating_sub(2),
        ..inner
    };

    let metrics = &snap.metrics;
    let mut y = inner.y;
    if let Some(handle) = &msg.image {
        let rows = metrics.image_height as u16;
        let slot = Rect::new(inner.x, y, inner.width, rows).intersection(inner);
        match snap.images.get(handle.id()) {
            Some(image) => draw_image(&mut buf, fit_image(slot, image), image, alpha),
            None => put(&mut buf, inner, slot.x, slot.y, icons.photo, faded(Theme::muted(), alpha)),
        }
        let margin = match msg.sender {
            Sender::User => metrics.image_margin_user,
            Sender::Assistant => metrics.image_margin_assistant,
        };
        y += rows + margin as u16;
    }

    if msg.show_reasoning && !msg.wrapped_reasoning.is_empty() {
        let style = faded(Theme::thinking(), alpha);
        put(&mut buf, inner, inner.x, y, "Reasoning", style.add_modifier(Modifier::BOLD));
        y += 1;
        for line in &msg.wrapped_reasoning {
            put(&mut buf, inner, inner.x + 2, y, line, style);
            y += 1;
        }
        y += 1;
    }

    let style = faded(Theme::text(), alpha);
    for line in &msg.wrapped_text {
        put(&mut buf, inner, inner.x, y, line, style);
        y += 1;
    }
    buf
}

/// Write `text` at `(x, y)` if the row lies inside `clip`.
fn put(buf: &mut Buffer, clip: Rect, x: u16, y: u16, text: &str, style: Style) {
    if y < clip.y || y >= clip.bottom() || x >= clip.right() {
        return;
    }
    buf.set_stringn(x, y, text, (clip.right() - x) as usize, style);
}

/// Copy `src` onto `dst` with its top-left at `(x, top)`, keeping only
/// the rows and columns inside `clip`.
fn blit(src: &Buffer, dst: &mut Buffer, x: u16, top: i32, clip: Rect) {
    for row in 0..src.area.height {
        let y = top + row as i32;
        if y < clip.y as i32 || y >= clip.bottom() as i32 {
            continue;
        }
        for col in 0..src.area.width {
            let dx = x + col;
            if dx >= clip.right() {
                break;
            }
            if let (Some(cell), Some(target)) = (src.cell((col, row)), dst.cell_mut((dx, y as u16))) {
                *target = cell.clone();
            }
        }
    }
}

/// Largest area inside `slot` that keeps the image's aspect ratio, given
/// two pixel rows per cell.
pub(super) fn fit_image(slot: Rect, image: &RgbaImage) -> Rect {
    if image.height() == 0 || slot.height == 0 {
        return Rect::new(slot.x, slot.y, 0, 0);
    }
    let width = (image.width() as u64 * slot.height as u64 * 2 / image.height() as u64) as u16;
    if width <= slot.width {
        return Rect::new(slot.x, slot.y, width, slot.height);
    }
    let height = (image.height() as u64 * slot.width as u64 / (image.width() as u64 * 2)).max(1) as u16;
    Rect::new(slot.x, slot.y, slot.width, height.min(slot.height))
}

/// Draw an image with upper-half blocks, two pixels per cell. Colours
/// fade toward black with `alpha`.
pub(super) fn draw_image(buf: &mut Buffer, area: Rect, image: &RgbaImage, alpha: u8) {
    let (w, h) = image.dimensions();
    if area.is_empty() || w == 0 || h == 0 {
        return;
    }
    let px_w = area.width as u32;
    let px_h = area.height as u32 * 2;
    let sample = |col: u32, py: u32| -> Color {
        let x = (col * w / px_w).min(w - 1);
        let y = (py * h / px_h).min(h - 1);
        rgb(image.get_pixel(x, y), alpha)
    };
    for row in 0..area.height {
        for col in 0..area.width {
            let top = sample(col as u32, row as u32 * 2);
            let bottom = sample(col as u32, row as u32 * 2 + 1);
            if let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) {
                cell.set_symbol("▀").set_fg(top).set_bg(bottom);
            }
        }
    }
}

fn rgb(pixel: &Rgba<u8>, alpha: u8) -> Color {
    let scale = |c: u8| (c as u16 * alpha as u16 / 255) as u8;
    Color::Rgb(scale(pixel[0]), scale(pixel[1]), scale(pixel[2]))
}

fn draw_model_pill(buf: &mut Buffer, area: Rect, snap: &Snapshot<'_>, alpha: u8) {
    let directory = snap.directory;
    let label = if directory.is_fetching() {
        "Fetching models...".to_string()
    } else if directory.is_empty() {
        "No models available".to_string()
    } else {
        directory.selected_model().unwrap_or("No model selected").to_string()
    };
    let focused = snap.view.focus == Focus::ModelPill;
    let text = format!("  {label}  ");
    let width = (text.chars().count() as u16).min(area.width);
    let x = area.x + (area.width - width) / 2;
    buf.set_stringn(x, area.y, &text, width as usize, faded(Theme::pill(focused), alpha));
}

fn draw_input_row(buf: &mut Buffer, area: Rect, snap: &Snapshot<'_>, icons: &Icons, alpha: u8) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(7), // Sessions
            Constraint::Length(7), // Settings
            Constraint::Min(10),   // Input pill
            Constraint::Length(7), // Camera
        ])
        .split(area);
    let focus = snap.view.focus;

    draw_button(buf, chunks[0], icons.sessions, focus == Focus::Sessions, alpha);
    draw_button(buf, chunks[1], icons.settings, focus == Focus::Settings, alpha);
    draw_button(buf, chunks[3], icons.camera, focus == Focus::Camera, alpha);

    let border = if focus == Focus::InputPill {
        Theme::border_focused()
    } else {
        Theme::border()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(faded(border, alpha));
    let mut spans = Vec::new();
    if snap.staged_photo.is_some() {
        spans.push(Span::styled(format!("{} photo attached  ", icons.photo), faded(Theme::success(), alpha)));
    }
    if snap.directory.is_empty() {
        spans.push(Span::styled("Waiting for models", faded(Theme::muted(), alpha)));
    } else {
        spans.push(Span::styled("Ask anything...", faded(Theme::muted(), alpha)));
    }
    Paragraph::new(Line::from(spans)).block(block).render(chunks[2], buf);
}

fn draw_button(buf: &mut Buffer, area: Rect, icon: &str, focused: bool, alpha: u8) {
    let border = if focused {
        Theme::border_focused()
    } else {
        Theme::border()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(faded(border, alpha));
    let style = if focused { Theme::accent() } else { Theme::text() };
    Paragraph::new(Span::styled(icon.to_string(), faded(style, alpha)))
        .centered()
        .block(block)
        .render(area, buf);
}

fn chat_hints(modal: ChatModal) -> &'static [(&'static str, &'static str)] {
    match modal {
        ChatModal::None => &[
            ("←→↑↓", "focus"),
            ("Enter", "select"),
            ("j/k", "messages"),
            ("J/K", "scroll"),
            ("t", "reasoning"),
            ("hold q", "quit"),
        ],
        ChatModal::Keyboard => &[("Enter", "send"), ("Esc", "cancel")],
        ChatModal::Camera(CameraPhase::LiveView) => &[("c", "capture"), ("t", "switch camera"), ("Esc", "close")],
        ChatModal::Camera(CameraPhase::Review) => &[("z", "retake"), ("t", "switch camera"), ("Esc", "keep photo")],
        ChatModal::ModelDropdown { .. } => &[("↑↓", "choose"), ("Enter", "select"), ("Esc", "cancel")],
    }
}

pub(super) fn draw_help(buf: &mut Buffer, area: Rect, bindings: &[(&str, &str)]) {
    let mut spans = vec![Span::raw(" ")];
    for (i, (key, desc)) in bindings.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" │ ", Theme::muted()));
        }
        spans.push(Span::styled(*key, Theme::key()));
        spans.push(Span::styled(format!(" {}", desc), Theme::key_desc()));
    }
    buf.set_line(area.x, area.y, &Line::from(spans), area.width);
}

fn draw_camera(buf: &mut Buffer, area: Rect, snap: &Snapshot<'_>, phase: CameraPhase) {
    let overlay = ((snap.clock.camera_overlay as u16 * 255) / snap.overlay_target.max(1) as u16).min(255) as u8;
    let popup = centered(area, 80, 90);
    Clear.render(popup, buf);

    let title = match phase {
        CameraPhase::LiveView => format!(" Camera · {:?} ", snap.camera_device),
        CameraPhase::Review => " Review photo ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(faded(Theme::accent(), overlay))
        .title(Line::styled(title, faded(Theme::title(), overlay)));
    let inner = block.inner(popup);
    block.render(popup, buf);

    let image = match phase {
        CameraPhase::Review => snap.staged_photo.and_then(|id| snap.images.get(id)),
        CameraPhase::LiveView => snap.camera_frame,
    };
    match image {
        Some(image) => {
            let fit = fit_image(inner, image);
            let x = inner.x + (inner.width - fit.width) / 2;
            draw_image(buf, Rect { x, ..fit }, image, overlay);
        }
        None => {
            let line = Line::styled("No camera frame", Theme::muted());
            buf.set_line(inner.x + 1, inner.y, &line, inner.width.saturating_sub(1));
        }
    }
}

fn draw_hold_bar(buf: &mut Buffer, area: Rect, progress: f32) {
    if area.height == 0 {
        return;
    }
    let row = Rect::new(area.x, area.bottom() - 1, area.width, 1);
    Clear.render(row, buf);
    let width = (area.width as usize).saturating_sub(16).min(30);
    let line = Line::from(vec![
        Span::styled(" Hold to exit ", Theme::warning()),
        Span::styled(ProgressBar::render(progress, width), Theme::warning()),
    ]);
    buf.set_line(row.x, row.y, &line, row.width);
}

/// Rect of `percent_x`/`percent_y` of `area`, centred.
pub(super) fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let width = area.width * percent_x / 100;
    let height = area.height * percent_y / 100;
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}
