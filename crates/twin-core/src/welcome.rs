//! WelcomeController: the in-widget welcome sequence.
//!
//! ```text
//!  Text ──2000ms──▶ Fade ──700ms──▶ Video ──video ended──▶ Avatar
//!                                                            │ dismiss()
//!                                                            ▼
//!                                  Hidden ◀──700ms── AvatarFadeOut
//! ```
//!
//! `Fade` and `Video` are two independent timers armed from the same origin,
//! so the fade can be observed on its own.  `dismiss()` (the first chat
//! message) short-circuits from anywhere before `AvatarFadeOut` by jumping to
//! `Avatar` first, so the fade-out always animates from a rendered avatar.
//! Every transition method returns the phases entered, in order.

use std::time::Duration;

use tracing::debug;
use twin_proto::config::TimingsConfig;

use crate::timer::{PhaseTimer, TimerFired};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WelcomePhase {
    Text,
    Fade,
    Video,
    Avatar,
    AvatarFadeOut,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WelcomeTimer {
    Fade,
    Video,
    FadeOut,
}

#[derive(Debug, Clone, Copy)]
pub struct WelcomeTimings {
    pub text_dwell: Duration,
    pub fade: Duration,
    pub avatar_fade: Duration,
}

impl From<&TimingsConfig> for WelcomeTimings {
    fn from(t: &TimingsConfig) -> Self {
        Self {
            text_dwell: t.text_dwell(),
            fade: t.fade(),
            avatar_fade: t.avatar_fade(),
        }
    }
}

pub struct WelcomeController {
    phase: WelcomePhase,
    timings: WelcomeTimings,
    timer: PhaseTimer<WelcomeTimer>,
    started: bool,
}

impl WelcomeController {
    pub fn new(timings: WelcomeTimings, timer: PhaseTimer<WelcomeTimer>) -> Self {
        Self {
            phase: WelcomePhase::Text,
            timings,
            timer,
            started: false,
        }
    }

    pub fn phase(&self) -> WelcomePhase {
        self.phase
    }

    pub fn is_hidden(&self) -> bool {
        self.phase == WelcomePhase::Hidden
    }

    /// Arm the text → fade → video timers.  Only the first call does anything.
    pub fn start(&mut self) {
        if self.started || self.phase != WelcomePhase::Text {
            return;
        }
        self.started = true;
        self.timer.schedule(WelcomeTimer::Fade, self.timings.text_dwell);
        self.timer
            .schedule(WelcomeTimer::Video, self.timings.text_dwell + self.timings.fade);
    }

    pub fn on_timer(&mut self, fired: TimerFired<WelcomeTimer>) -> Vec<WelcomePhase> {
        let mut entered = Vec::new();
        let Some(slot) = self.timer.accept(fired) else {
            return entered;
        };

        match slot {
            WelcomeTimer::Fade => {
                if self.phase == WelcomePhase::Text {
                    self.enter(WelcomePhase::Fade, &mut entered);
                }
            }
            WelcomeTimer::Video => {
                if self.phase < WelcomePhase::Video {
                    self.enter(WelcomePhase::Video, &mut entered);
                }
            }
            WelcomeTimer::FadeOut => {
                if self.phase == WelcomePhase::AvatarFadeOut {
                    self.enter(WelcomePhase::Hidden, &mut entered);
                }
            }
        }
        entered
    }

    /// The welcome clip reached its natural end.
    pub fn on_video_ended(&mut self) -> Vec<WelcomePhase> {
        let mut entered = Vec::new();
        if self.phase == WelcomePhase::Video {
            self.enter(WelcomePhase::Avatar, &mut entered);
        }
        entered
    }

    /// Fade the welcome area out, wherever the sequence currently is.
    pub fn dismiss(&mut self) -> Vec<WelcomePhase> {
        let mut entered = Vec::new();
        match self.phase {
            WelcomePhase::AvatarFadeOut | WelcomePhase::Hidden => return entered,
            WelcomePhase::Text | WelcomePhase::Fade | WelcomePhase::Video => {
                self.timer.cancel_slot(WelcomeTimer::Fade);
                self.timer.cancel_slot(WelcomeTimer::Video);
                self.enter(WelcomePhase::Avatar, &mut entered);
            }
            WelcomePhase::Avatar => {}
        }

        self.enter(WelcomePhase::AvatarFadeOut, &mut entered);
        self.timer
            .schedule(WelcomeTimer::FadeOut, self.timings.avatar_fade);
        entered
    }

    pub fn teardown(&mut self) {
        self.timer.cancel_all();
    }

    fn enter(&mut self, next: WelcomePhase, entered: &mut Vec<WelcomePhase>) {
        debug!("welcome: {:?} -> {:?}", self.phase, next);
        self.phase = next;
        entered.push(next);
    }
}
