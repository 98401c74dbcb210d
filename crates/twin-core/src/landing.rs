//! LandingController: door entry and the landing UI reveal.
//!
//! Two independent concerns share one timer owner:
//! - `Idle → Entering` on the door; `Entering` arms a fixed handoff delay
//!   after which the core stops the audio and navigates away.  `Entering` is
//!   never left except by teardown.
//! - The landing UI is revealed by the intro video's natural end or by a
//!   fallback timer, whichever comes first.  The loser is a no-op.

use std::time::Duration;

use tracing::debug;
use twin_proto::config::TimingsConfig;

use crate::timer::{PhaseTimer, TimerFired};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Entering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandingTimer {
    Handoff,
    RevealFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandingEvent {
    UiRevealed,
    /// The door animation finished: stop audio and navigate.
    Handoff,
}

#[derive(Debug, Clone, Copy)]
pub struct LandingTimings {
    pub handoff: Duration,
    pub reveal_fallback: Duration,
}

impl From<&TimingsConfig> for LandingTimings {
    fn from(t: &TimingsConfig) -> Self {
        Self {
            handoff: t.handoff(),
            reveal_fallback: t.reveal_fallback(),
        }
    }
}

pub struct LandingController {
    phase: Phase,
    ui_revealed: bool,
    timings: LandingTimings,
    timer: PhaseTimer<LandingTimer>,
}

impl LandingController {
    pub fn new(timings: LandingTimings, timer: PhaseTimer<LandingTimer>) -> Self {
        Self {
            phase: Phase::Idle,
            ui_revealed: false,
            timings,
            timer,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ui_revealed(&self) -> bool {
        self.ui_revealed
    }

    pub fn start(&mut self) {
        if !self.ui_revealed {
            self.timer
                .schedule(LandingTimer::RevealFallback, self.timings.reveal_fallback);
        }
    }

    pub fn on_intro_ended(&mut self) -> Option<LandingEvent> {
        self.reveal()
    }

    /// Door clicked.  Returns false if already entering.
    pub fn enter(&mut self) -> bool {
        if self.phase == Phase::Entering {
            return false;
        }
        debug!("landing: Idle -> Entering");
        self.phase = Phase::Entering;
        self.timer
            .schedule(LandingTimer::Handoff, self.timings.handoff);
        true
    }

    pub fn on_timer(&mut self, fired: TimerFired<LandingTimer>) -> Option<LandingEvent> {
        match self.timer.accept(fired)? {
            LandingTimer::RevealFallback => {
                debug!("landing: reveal fallback fired");
                self.reveal()
            }
            LandingTimer::Handoff => {
                (self.phase == Phase::Entering).then_some(LandingEvent::Handoff)
            }
        }
    }

    pub fn teardown(&mut self) {
        self.timer.cancel_all();
    }

    fn reveal(&mut self) -> Option<LandingEvent> {
        if self.ui_revealed {
            return None;
        }
        self.ui_revealed = true;
        self.timer.cancel_slot(LandingTimer::RevealFallback);
        Some(LandingEvent::UiRevealed)
    }
}
