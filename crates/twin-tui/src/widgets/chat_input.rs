//! ChatInput — wraps tui-input for the message line under the conversation.

use ratatui::crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};

use crate::theme::{C_INPUT_BG, C_INPUT_FG, C_MUTED, C_SECONDARY};

#[derive(Debug, PartialEq)]
pub enum InputAction {
    Changed(String),
    Submit,
    /// Esc on an empty line.
    Leave,
    None,
}

pub struct ChatInput {
    input: Input,
    placeholder: String,
}

impl ChatInput {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            input: Input::default(),
            placeholder: placeholder.into(),
        }
    }

    pub fn clear(&mut self) {
        self.input = Input::default();
    }

    pub fn text(&self) -> &str {
        self.input.value()
    }

    /// Handle a key event.  Keys are swallowed while `disabled` (a reply is
    /// pending), except Esc.
    ///
    /// Esc behaviour:
    ///   - If the input has text: clear it, emit `Changed("")`
    ///   - If the input is already empty: emit `Leave`
    pub fn handle_key(&mut self, key: KeyEvent, disabled: bool) -> InputAction {
        match key.code {
            KeyCode::Esc => {
                if self.input.value().is_empty() {
                    InputAction::Leave
                } else {
                    self.clear();
                    InputAction::Changed(String::new())
                }
            }
            _ if disabled => InputAction::None,
            KeyCode::Enter => InputAction::Submit,
            _ => {
                let before = self.input.value().len();
                let changed = self.input.handle_event(&Event::Key(key));
                if changed.is_some() || self.input.value().len() != before {
                    InputAction::Changed(self.input.value().to_string())
                } else {
                    InputAction::None
                }
            }
        }
    }

    /// Render the input line into `area`.
    pub fn draw(&self, frame: &mut Frame, area: Rect, focused: bool, disabled: bool) {
        let scroll = self
            .input
            .visual_scroll(area.width.saturating_sub(4) as usize);
        let value = self.input.value();
        let prompt_style = Style::default().fg(if disabled { C_MUTED } else { C_SECONDARY });
        let body = if value.is_empty() {
            Span::styled(self.placeholder.clone(), Style::default().fg(C_MUTED))
        } else {
            let fg = if disabled { C_MUTED } else { C_INPUT_FG };
            Span::styled(value.chars().skip(scroll).collect::<String>(), Style::default().fg(fg))
        };

        let paragraph = Paragraph::new(Line::from(vec![Span::styled("> ", prompt_style), body]))
            .style(Style::default().bg(C_INPUT_BG));
        frame.render_widget(paragraph, area);

        if focused && !disabled {
            let cursor_x = area.x + 2 + (self.input.visual_cursor() - scroll) as u16;
            frame.set_cursor_position((cursor_x.min(area.x + area.width.saturating_sub(1)), area.y));
        }
    }
}
