//! App — terminal event loop for the twin.
//!
//! Architecture:
//! - `App` owns the `ViewState` mirror and the input widget.
//! - A `tokio::mpsc` channel carries `AppMessage`s in from the terminal
//!   reader and the `CoreUpdate` broadcast.
//! - The event loop draws each frame, then awaits the next message.
//! - Everything the user does leaves as a `CoreEvent`; every key press and
//!   click is also forwarded as a gesture so audio can unlock.

use std::io;
use std::time::Duration;

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::Block,
    Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use twin_core::audio::Gesture;
use twin_core::core::{CoreEvent, CoreUpdate, Route};

use crate::components::conversation;
use crate::components::landing::LandingScreen;
use crate::theme::C_BG;
use crate::view_state::{ViewEffect, ViewState};
use crate::widgets::chat_input::{ChatInput, InputAction};
use crate::widgets::status_bar;

const SEEK_STEP: Duration = Duration::from_secs(1);

enum AppMessage {
    Event(Event),
    Update(CoreUpdate),
}

pub struct App {
    view: ViewState,
    input: ChatInput,
    input_focused: bool,
    /// A non-blank Submit left and its `Loading(true)` has not come back.
    /// Typing stays locked so nothing reaches the core after its input
    /// was taken.
    submitting: bool,
    landing: LandingScreen,
    handoff: Duration,
    core_tx: mpsc::UnboundedSender<CoreEvent>,
    should_quit: bool,
}

impl App {
    pub fn new(core_tx: mpsc::UnboundedSender<CoreEvent>, has_avatar: bool, handoff: Duration) -> Self {
        Self {
            view: ViewState::new(has_avatar),
            input: ChatInput::new("type a message…"),
            input_focused: true,
            submitting: false,
            landing: LandingScreen::default(),
            handoff,
            core_tx,
            should_quit: false,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(mut self, mut update_rx: broadcast::Receiver<CoreUpdate>) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);

        // ── Background task: keyboard/mouse events ────────────────────────────
        let event_tx = tx.clone();
        // Polls rather than blocking in read() so it notices the app closing.
        tokio::task::spawn_blocking(move || loop {
            if event_tx.is_closed() {
                break;
            }
            match event::poll(Duration::from_millis(100)) {
                Ok(true) => match event::read() {
                    Ok(ev) => {
                        if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                Ok(false) => {}
                Err(_) => break,
            }
        });

        // ── Background task: broadcast receiver (TwinCore → AppMessage) ───────
        let bc_tx = tx.clone();
        tokio::spawn(async move {
            loop {
                match update_rx.recv().await {
                    Ok(update) => {
                        if bc_tx.send(AppMessage::Update(update)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("update receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // Spinner, door collapse and progress interpolation.
        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        loop {
            terminal.draw(|f| self.draw(f))?;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    self.handle_message(msg);
                    while let Ok(next) = rx.try_recv() {
                        self.handle_message(next);
                    }
                }
                _ = ui_tick.tick() => {
                    self.view.tick = self.view.tick.wrapping_add(1);
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        Ok(())
    }

    fn handle_message(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::Event(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                self.send(CoreEvent::Gesture(Gesture::Key));
                self.handle_key(key);
            }
            AppMessage::Event(Event::Mouse(mouse)) => self.handle_mouse(mouse),
            AppMessage::Event(_) => {}
            AppMessage::Update(update) => {
                if matches!(update, CoreUpdate::Loading(_)) {
                    self.submitting = false;
                }
                self.apply_update(update);
            }
        }
    }

    fn apply_update(&mut self, update: CoreUpdate) {
        match self.view.apply(update) {
            ViewEffect::ClearInput => self.input.clear(),
            ViewEffect::FocusInput => self.input_focused = true,
            ViewEffect::None => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match self.view.route {
            Route::Landing => {
                if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    self.should_quit = true;
                    return;
                }
                let intro_pos = self.view.intro.map(|i| i.position_now());
                if let Some(event) = landing_key(key, self.view.ui_revealed, intro_pos) {
                    self.send(event);
                }
            }
            Route::Twin => {
                self.input_focused = true;
                match self.input.handle_key(key, self.input_locked()) {
                    InputAction::Changed(text) => self.send(CoreEvent::InputChanged(text)),
                    InputAction::Submit => {
                        // Focus returns once the reply has landed.
                        if !self.input.text().trim().is_empty() {
                            self.input_focused = false;
                            self.submitting = true;
                        }
                        self.send(CoreEvent::Submit);
                    }
                    InputAction::Leave => self.should_quit = true,
                    InputAction::None => {}
                }
            }
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if !matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left)) {
            return;
        }
        self.send(CoreEvent::Gesture(Gesture::Click));

        if self.view.route != Route::Landing {
            return;
        }
        if hit(self.landing.door_area, mouse.column, mouse.row) {
            self.send(CoreEvent::EnterDoor);
        } else if hit(self.landing.enter_area, mouse.column, mouse.row) {
            self.send(CoreEvent::EnterNow);
        }
    }

    fn input_locked(&self) -> bool {
        self.view.loading || self.submitting
    }

    fn send(&self, event: CoreEvent) {
        if self.core_tx.send(event).is_err() {
            warn!("core event loop is gone");
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        let area = frame.area();
        frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(area);

        match self.view.route {
            Route::Landing => self.landing.draw(frame, outer[0], &self.view, self.handoff),
            Route::Twin => {
                let locked = self.input_locked();
                conversation::draw(frame, outer[0], &self.view, &self.input, self.input_focused, locked)
            }
        }
        status_bar::draw_status_bar(frame, outer[1], &self.view);
    }
}

/// Landing-screen keys.  Quit is handled by the caller.
fn landing_key(key: KeyEvent, ui_revealed: bool, intro_pos: Option<Duration>) -> Option<CoreEvent> {
    match key.code {
        KeyCode::Enter | KeyCode::Char('d') => Some(CoreEvent::EnterDoor),
        KeyCode::Char('e') if ui_revealed => Some(CoreEvent::EnterNow),
        KeyCode::Char(' ') => Some(CoreEvent::IntroTogglePause),
        KeyCode::Left => intro_pos.map(|p| CoreEvent::IntroSeek(p.saturating_sub(SEEK_STEP))),
        KeyCode::Right => intro_pos.map(|p| CoreEvent::IntroSeek(p + SEEK_STEP)),
        _ => None,
    }
}

fn hit(r: Rect, col: u16, row: u16) -> bool {
    r.width > 0 && r.height > 0 && col >= r.x && col < r.x + r.width && row >= r.y && row < r.y + r.height
}
