//! Landing screen — title, door, intro video progress, "Enter the Room".
//!
//! Not focusable; the App routes clicks by the areas recorded at draw time.

use std::time::Duration;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use twin_core::landing::Phase;

use crate::theme::{
    style_button, style_secondary, style_title, C_DOOR, C_DOOR_GLOW, C_MUTED,
};
use crate::view_state::ViewState;
use crate::widgets::progress_bar;

const DOOR_W: u16 = 18;
const DOOR_H: u16 = 9;
const ENTER_LABEL: &str = " Enter the Room ";

#[derive(Default)]
pub struct LandingScreen {
    pub door_area: Rect,
    pub enter_area: Rect,
}

impl LandingScreen {
    pub fn draw(&mut self, frame: &mut Frame, area: Rect, view: &ViewState, handoff: Duration) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(DOOR_H),
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        frame.render_widget(
            Paragraph::new(Line::from(Span::styled("THE TWIN", style_title())))
                .alignment(Alignment::Center),
            rows[1],
        );
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                "a conversation with someone who knows you",
                style_secondary(),
            )))
            .alignment(Alignment::Center),
            rows[2],
        );

        self.draw_door(frame, rows[4], view, handoff);

        if let Some(intro) = view.intro {
            let bar_area = centered(rows[6], rows[6].width.min(48));
            progress_bar::draw_progress(frame, bar_area, intro.position_now(), intro.duration);
        }

        if view.ui_revealed && view.landing_phase == Phase::Idle {
            let w = ENTER_LABEL.chars().count() as u16;
            self.enter_area = centered(rows[7], w);
            frame.render_widget(Paragraph::new(Span::styled(ENTER_LABEL, style_button())), self.enter_area);
        } else {
            self.enter_area = Rect::default();
        }
    }

    fn draw_door(&mut self, frame: &mut Frame, area: Rect, view: &ViewState, handoff: Duration) {
        let openness = view.door_openness(handoff);
        let width = ((DOOR_W as f64) * openness).round().max(2.0) as u16;
        let door = centered(area, width.min(area.width));
        self.door_area = if view.landing_phase == Phase::Idle {
            door
        } else {
            Rect::default()
        };

        let glow = view.landing_phase == Phase::Entering;
        let border = Style::default().fg(if glow { C_DOOR_GLOW } else { C_DOOR });
        let block = Block::default().borders(Borders::ALL).border_style(border);
        let inner = block.inner(door);
        frame.render_widget(block, door);

        if inner.width >= 7 && inner.height >= 1 {
            let label = if glow { "…" } else { "enter ⏎" };
            let mid = Rect {
                y: inner.y + inner.height / 2,
                height: 1,
                ..inner
            };
            frame.render_widget(
                Paragraph::new(Span::styled(label, Style::default().fg(C_MUTED)))
                    .alignment(Alignment::Center),
                mid,
            );
        }
    }
}

/// A `width`-wide slice horizontally centered in `area`.
fn centered(area: Rect, width: u16) -> Rect {
    let width = width.min(area.width);
    Rect {
        x: area.x + (area.width - width) / 2,
        width,
        ..area
    }
}
