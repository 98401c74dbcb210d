//! Color palette and style constants for the twin TUI.

use ratatui::style::{Color, Modifier, Style};

// ── Color palette ─────────────────────────────────────────────────────────────

pub const C_BG: Color = Color::Rgb(14, 14, 20);
pub const C_ACCENT: Color = Color::Rgb(150, 120, 255);
pub const C_PRIMARY: Color = Color::Rgb(214, 214, 228);
pub const C_SECONDARY: Color = Color::Rgb(118, 118, 142);
pub const C_MUTED: Color = Color::Rgb(70, 70, 88);
pub const C_SEPARATOR: Color = Color::Rgb(40, 40, 54);
pub const C_DOOR: Color = Color::Rgb(196, 150, 90);
pub const C_DOOR_GLOW: Color = Color::Rgb(255, 214, 140);
pub const C_PROGRESS: Color = Color::Rgb(120, 100, 200);
pub const C_USER_BUBBLE: Color = Color::Rgb(36, 32, 64);
pub const C_ASSISTANT_BUBBLE: Color = Color::Rgb(24, 24, 34);
pub const C_INPUT_BG: Color = Color::Rgb(20, 20, 32);
pub const C_INPUT_FG: Color = Color::Rgb(255, 210, 120);
pub const C_BADGE_LIVE: Color = Color::Rgb(80, 200, 120);
pub const C_BADGE_PENDING: Color = Color::Rgb(255, 184, 80);
pub const C_BADGE_OFF: Color = Color::Rgb(90, 90, 110);

// ── Predefined styles ─────────────────────────────────────────────────────────

pub fn style_default() -> Style {
    Style::default().fg(C_PRIMARY)
}

pub fn style_secondary() -> Style {
    Style::default().fg(C_SECONDARY)
}

pub fn style_muted() -> Style {
    Style::default().fg(C_MUTED)
}

pub fn style_title() -> Style {
    Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD)
}

pub fn style_button() -> Style {
    Style::default()
        .fg(C_BG)
        .bg(C_ACCENT)
        .add_modifier(Modifier::BOLD)
}

/// Fading text: full, dimmed, then gone.
pub fn style_fading(visible: bool) -> Style {
    if visible {
        style_default()
    } else {
        Style::default().fg(C_MUTED).add_modifier(Modifier::DIM)
    }
}
