//! Status bar: bottom line with the audio badge, key hints and last log.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use twin_core::audio::AudioGateState;
use twin_core::core::Route;

use crate::theme::{C_BADGE_LIVE, C_BADGE_OFF, C_BADGE_PENDING, C_MUTED, C_SECONDARY, C_SEPARATOR};
use crate::view_state::ViewState;

fn badge_color(state: AudioGateState) -> ratatui::style::Color {
    match state {
        AudioGateState::Active => C_BADGE_LIVE,
        AudioGateState::Unlocking | AudioGateState::Unlocked => C_BADGE_PENDING,
        AudioGateState::Locked | AudioGateState::Stopped => C_BADGE_OFF,
    }
}

fn key_hints(route: Route) -> &'static [(&'static str, &'static str)] {
    match route {
        Route::Landing => &[
            ("⏎", "door"),
            ("e", "enter now"),
            ("space", "pause"),
            ("←/→", "seek"),
            ("q", "quit"),
        ],
        Route::Twin => &[("⏎", "send"), ("esc", "clear / quit")],
    }
}

pub fn draw_status_bar(frame: &mut Frame, area: Rect, view: &ViewState) {
    let mut spans = vec![
        Span::styled("♪ ", Style::default().fg(badge_color(view.audio))),
        Span::styled(view.audio_label(), Style::default().fg(C_SECONDARY)),
        Span::styled(" │ ", Style::default().fg(C_SEPARATOR)),
    ];
    for (key, label) in key_hints(view.route) {
        spans.push(Span::styled(*key, Style::default().fg(C_SECONDARY)));
        spans.push(Span::styled(format!(" {}  ", label), Style::default().fg(C_MUTED)));
    }
    if let Some(log) = view.last_log.as_deref() {
        spans.push(Span::styled(" │ ", Style::default().fg(C_SEPARATOR)));
        spans.push(Span::styled(log, Style::default().fg(C_SECONDARY)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
