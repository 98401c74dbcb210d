//! Conversation screen: welcome area, message log, loading line, input.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};
use twin_core::welcome::WelcomePhase;
use twin_proto::protocol::{Message, Role};

use crate::theme::{
    style_default, style_fading, style_muted, style_secondary, style_title, C_ACCENT,
    C_ASSISTANT_BUBBLE, C_PROGRESS, C_USER_BUBBLE,
};
use crate::view_state::ViewState;
use crate::widgets::chat_input::ChatInput;

const WELCOME_TEXT: &str = "Hi, I'm your twin. Ask me anything.";
const SPINNER_FRAMES: &[&str] = &["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

pub fn draw(
    frame: &mut Frame,
    area: Rect,
    view: &ViewState,
    input: &ChatInput,
    input_focused: bool,
    input_locked: bool,
) {
    let welcome_h = welcome_height(view.welcome);
    let loading_h = u16::from(view.loading);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(welcome_h),
            Constraint::Min(0),
            Constraint::Length(loading_h),
            Constraint::Length(1),
        ])
        .split(area);

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("THE TWIN", style_title()),
            Span::styled("  ·  conversation", style_secondary()),
        ])),
        rows[0],
    );

    if welcome_h > 0 {
        draw_welcome(frame, rows[1], view);
    }
    draw_messages(frame, rows[2], &view.messages);
    if view.loading {
        draw_loading(frame, rows[3], view);
    }
    input.draw(frame, rows[4], input_focused, input_locked);
}

fn welcome_height(phase: WelcomePhase) -> u16 {
    match phase {
        WelcomePhase::Hidden => 0,
        _ => 3,
    }
}

fn draw_welcome(frame: &mut Frame, area: Rect, view: &ViewState) {
    // Squeezed out entirely on very short terminals.
    if area.height == 0 {
        return;
    }
    let lines = match view.welcome {
        WelcomePhase::Text => vec![Line::from(Span::styled(WELCOME_TEXT, style_fading(true)))],
        WelcomePhase::Fade => vec![Line::from(Span::styled(WELCOME_TEXT, style_fading(false)))],
        WelcomePhase::Video => vec![Line::from(vec![
            Span::styled("▶ ", Style::default().fg(C_PROGRESS)),
            Span::styled("your twin is saying hello…", style_secondary()),
        ])],
        WelcomePhase::Avatar => vec![avatar_line(view.has_avatar, true)],
        WelcomePhase::AvatarFadeOut => vec![avatar_line(view.has_avatar, false)],
        WelcomePhase::Hidden => Vec::new(),
    };
    let inner = Rect {
        y: area.y + area.height / 2,
        height: 1,
        ..area
    };
    frame.render_widget(Paragraph::new(lines), inner);
}

fn avatar_line(has_avatar: bool, visible: bool) -> Line<'static> {
    let style = if visible {
        Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD)
    } else {
        style_muted().add_modifier(Modifier::DIM)
    };
    Line::from(vec![
        Span::styled(avatar_glyph(has_avatar), style),
        Span::styled(" your twin", style_fading(visible)),
    ])
}

fn avatar_glyph(has_avatar: bool) -> &'static str {
    if has_avatar {
        "◉"
    } else {
        "[bot]"
    }
}

fn draw_messages(frame: &mut Frame, area: Rect, messages: &[Message]) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    let lines: Vec<Line> = messages.iter().map(message_line).collect();

    // Keep the newest message in view.
    let width = area.width as usize;
    let rendered: usize = lines
        .iter()
        .map(|l| l.width().max(1).div_ceil(width))
        .sum();
    let scroll = rendered.saturating_sub(area.height as usize) as u16;

    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0)),
        area,
    );
}

fn message_line(message: &Message) -> Line<'_> {
    let (who, bg) = match message.role {
        Role::User => ("you ", C_USER_BUBBLE),
        Role::Assistant => ("twin", C_ASSISTANT_BUBBLE),
    };
    Line::from(vec![
        Span::styled(format!("{} ", message.display_time()), style_muted()),
        Span::styled(format!("{} ", who), style_secondary()),
        Span::styled(message.content.as_str(), style_default().bg(bg)),
    ])
}

fn draw_loading(frame: &mut Frame, area: Rect, view: &ViewState) {
    let spinner = SPINNER_FRAMES[view.tick % SPINNER_FRAMES.len()];
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(avatar_glyph(view.has_avatar), Style::default().fg(C_ACCENT)),
            Span::raw(" "),
            Span::styled(spinner, Style::default().fg(C_PROGRESS)),
            Span::styled(" thinking", style_secondary()),
        ])),
        area,
    );
}
