//! ViewState: what the screens render, rebuilt from `CoreUpdate`s.
//!
//! The App event-loop is the only writer.  Nothing here decides anything;
//! it mirrors what TwinCore published.

use std::time::{Duration, Instant};

use twin_core::audio::AudioGateState;
use twin_core::core::{CoreUpdate, Route};
use twin_core::landing::Phase;
use twin_core::welcome::WelcomePhase;
use twin_proto::protocol::Message;

#[derive(Debug, Clone, Copy)]
pub struct IntroPlayback {
    pub position: Duration,
    pub duration: Duration,
    pub playing: bool,
    /// When `position` was reported, for interpolating between updates.
    pub reported_at: Instant,
}

impl IntroPlayback {
    pub fn position_now(&self) -> Duration {
        if self.playing {
            (self.position + self.reported_at.elapsed()).min(self.duration)
        } else {
            self.position
        }
    }
}

pub struct ViewState {
    pub route: Route,
    pub landing_phase: Phase,
    pub ui_revealed: bool,
    /// When the door started closing, for the collapse animation.
    pub entering_since: Option<Instant>,
    pub intro: Option<IntroPlayback>,
    pub audio: AudioGateState,
    pub welcome: WelcomePhase,
    pub messages: Vec<Message>,
    pub loading: bool,
    pub has_avatar: bool,
    pub last_log: Option<String>,
    /// Spinner frame, advanced by the UI tick.
    pub tick: usize,
}

/// What the App must do beyond redrawing.
#[derive(Debug, PartialEq)]
pub enum ViewEffect {
    ClearInput,
    FocusInput,
    None,
}

impl ViewState {
    pub fn new(has_avatar: bool) -> Self {
        Self {
            route: Route::Landing,
            landing_phase: Phase::Idle,
            ui_revealed: false,
            entering_since: None,
            intro: None,
            audio: AudioGateState::Locked,
            welcome: WelcomePhase::Text,
            messages: Vec::new(),
            loading: false,
            has_avatar,
            last_log: None,
            tick: 0,
        }
    }

    pub fn apply(&mut self, update: CoreUpdate) -> ViewEffect {
        match update {
            CoreUpdate::Navigated(route) => self.route = route,
            CoreUpdate::LandingPhase(phase) => {
                if phase == Phase::Entering && self.entering_since.is_none() {
                    self.entering_since = Some(Instant::now());
                }
                self.landing_phase = phase;
            }
            CoreUpdate::UiRevealed => self.ui_revealed = true,
            CoreUpdate::WelcomePhase(phase) => self.welcome = phase,
            CoreUpdate::IntroPlayback {
                position,
                duration,
                playing,
            } => {
                self.intro = Some(IntroPlayback {
                    position,
                    duration,
                    playing,
                    reported_at: Instant::now(),
                });
            }
            CoreUpdate::AudioGate(state) => self.audio = state,
            CoreUpdate::MessageAppended(message) => self.messages.push(message),
            CoreUpdate::InputCleared => return ViewEffect::ClearInput,
            CoreUpdate::Loading(loading) => self.loading = loading,
            CoreUpdate::FocusInput => return ViewEffect::FocusInput,
            CoreUpdate::Log(line) => self.last_log = Some(line),
        }
        ViewEffect::None
    }

    /// 1.0 while the door is open, shrinking to 0.0 over `handoff`.
    pub fn door_openness(&self, handoff: Duration) -> f64 {
        let Some(since) = self.entering_since else {
            return 1.0;
        };
        if handoff.is_zero() {
            return 0.0;
        }
        1.0 - (since.elapsed().as_secs_f64() / handoff.as_secs_f64()).min(1.0)
    }

    pub fn audio_label(&self) -> &'static str {
        match self.audio {
            AudioGateState::Locked => "press any key for sound",
            AudioGateState::Unlocking => "starting sound…",
            AudioGateState::Unlocked => "sound ready",
            AudioGateState::Active => "narration",
            AudioGateState::Stopped => "sound off",
        }
    }
}
