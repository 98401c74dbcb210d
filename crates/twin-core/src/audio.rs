//! AmbientAudioGate — gesture-gated narration kept in sync with a video.
//!
//! # States
//! ```text
//!  Locked ──gesture──▶ Unlocking ──resume ok──▶ Unlocked ──play ok──▶ Active
//!    ▲                     │                        ▲                   │
//!    └────resume failed────┘                        └──video paused─────┘
//!
//!  any ──stop()──▶ Stopped
//! ```
//!
//! Nothing is ever played while `Locked` or `Unlocking`: the backend only
//! sees `seek`/`play` after a successful `resume`.  The resume itself runs
//! off the owner's loop, which picks the outcome up through `resumed()`.
//! Every play of the paired video forces the narration to the video's
//! position first.  Playback and drift failures are swallowed; the worst
//! case is a silent video.

use std::future::Future;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::timer::{PhaseTimer, TimerFired};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioGateState {
    Locked,
    Unlocking,
    Unlocked,
    Active,
    Stopped,
}

/// User interactions that satisfy the autoplay rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    Click,
    Touch,
    Key,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftStep {
    pub gain: f32,
    pub cutoff_hz: f32,
}

/// The audio context plus the narration element it drives.
///
/// Implementations may write these as `async fn`; the futures must be `Send`
/// so the owning event loop can run on a spawned task.  `resume` runs on a
/// task of its own, and dropping a backend must release it like `close`.
pub trait AudioBackend: Send + 'static {
    /// Activate the output context.  Fails when the platform refuses.
    fn resume(&mut self) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn seek(&mut self, position: Duration) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn play(&mut self) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn pause(&mut self) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn apply_drift(&mut self, step: DriftStep) -> impl Future<Output = anyhow::Result<()>> + Send;
    /// Silence everything and release the context.  Must not block and must
    /// tolerate repeated calls.
    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioTimer {
    Drift,
}

const MIN_CUTOFF_HZ: f32 = 800.0;
const MAX_CUTOFF_HZ: f32 = 8000.0;

/// Slow random walk of gain and low-pass cutoff.
pub struct Drift {
    rng: StdRng,
    base_gain: f32,
    cutoff_hz: f32,
}

impl Drift {
    pub fn new(base_gain: f32) -> Self {
        Self::with_rng(base_gain, StdRng::from_entropy())
    }

    pub fn with_seed(base_gain: f32, seed: u64) -> Self {
        Self::with_rng(base_gain, StdRng::seed_from_u64(seed))
    }

    fn with_rng(base_gain: f32, rng: StdRng) -> Self {
        Self {
            rng,
            base_gain: base_gain.clamp(0.0, 1.0),
            cutoff_hz: MAX_CUTOFF_HZ / 2.0,
        }
    }

    pub fn next_step(&mut self) -> DriftStep {
        let gain = self.base_gain * self.rng.gen_range(0.6..=1.0);
        let delta: f32 = self.rng.gen_range(-600.0..=600.0);
        self.cutoff_hz = (self.cutoff_hz + delta).clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_HZ);
        DriftStep {
            gain,
            cutoff_hz: self.cutoff_hz,
        }
    }
}

pub struct AmbientAudioGate<B> {
    state: AudioGateState,
    armed: bool,
    /// Lent to the resume task while `Unlocking`.
    backend: Option<B>,
    unlocking: Option<JoinHandle<(B, anyhow::Result<()>)>>,
    drift: Option<(Drift, Duration)>,
    timer: PhaseTimer<AudioTimer>,
}

/// A finished resume, handing the backend back to the gate.
pub struct Resumed<B>(Result<(B, anyhow::Result<()>), JoinError>);

impl<B: AudioBackend> AmbientAudioGate<B> {
    pub fn new(backend: B, timer: PhaseTimer<AudioTimer>) -> Self {
        Self {
            state: AudioGateState::Locked,
            armed: false,
            backend: Some(backend),
            unlocking: None,
            drift: None,
            timer,
        }
    }

    pub fn with_drift(mut self, drift: Drift, interval: Duration) -> Self {
        self.drift = Some((drift, interval));
        self
    }

    pub fn state(&self) -> AudioGateState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_unlocking(&self) -> bool {
        self.unlocking.is_some()
    }

    /// Start listening for the next gesture.  Returns false when already
    /// listening or past the point where listening makes sense.
    pub fn arm(&mut self) -> bool {
        if self.armed || self.state != AudioGateState::Locked {
            return false;
        }
        debug!("audio: armed, waiting for a gesture");
        self.armed = true;
        true
    }

    /// A qualifying gesture happened.  Moves to `Unlocking` and resumes the
    /// backend on its own task; the caller collects the outcome through
    /// `resumed()` and hands it to `on_resumed()`.
    pub fn on_gesture(&mut self, gesture: Gesture) -> AudioGateState {
        if !self.armed || self.state != AudioGateState::Locked {
            return self.state;
        }
        let Some(mut backend) = self.backend.take() else {
            return self.state;
        };

        // Listener is consumed by the gesture; a failed unlock re-arms it.
        self.armed = false;
        self.state = AudioGateState::Unlocking;
        debug!("audio: unlocking on {:?}", gesture);

        self.unlocking = Some(tokio::spawn(async move {
            let outcome = backend.resume().await;
            (backend, outcome)
        }));
        self.state
    }

    /// Wait for the in-flight resume.  Never resolves when there is none.
    /// Cancel safe: dropping the future leaves the resume running.
    pub async fn resumed(&mut self) -> Resumed<B> {
        let Some(task) = self.unlocking.as_mut() else {
            return std::future::pending().await;
        };
        let joined = task.await;
        self.unlocking = None;
        Resumed(joined)
    }

    /// Finish `Unlocking`.  `video` is the paired video's position when it is
    /// playing at this moment; narration only starts alongside a playing
    /// video.
    pub async fn on_resumed(&mut self, resumed: Resumed<B>, video: Option<Duration>) -> AudioGateState {
        let (mut backend, outcome) = match resumed.0 {
            Ok(pair) => pair,
            Err(e) => {
                warn!("audio: resume task lost: {}", e);
                self.armed = false;
                self.timer.cancel_all();
                self.state = AudioGateState::Stopped;
                return self.state;
            }
        };

        if self.state != AudioGateState::Unlocking {
            debug!("audio: resume finished after {:?}; releasing", self.state);
            backend.close();
            return self.state;
        }
        self.backend = Some(backend);

        match outcome {
            Ok(()) => {
                info!("audio: unlocked");
                self.state = AudioGateState::Unlocked;
                if let Some(position) = video {
                    self.start_playback(position).await;
                }
            }
            Err(e) => {
                debug!("audio: resume refused ({:#}); waiting for another gesture", e);
                self.state = AudioGateState::Locked;
                self.armed = true;
            }
        }
        self.state
    }

    /// The paired video fired "play" at `position`.
    pub async fn on_video_play(&mut self, position: Duration) {
        if matches!(
            self.state,
            AudioGateState::Unlocked | AudioGateState::Active
        ) {
            self.start_playback(position).await;
        }
    }

    pub async fn on_video_pause(&mut self) {
        if self.state != AudioGateState::Active {
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            if let Err(e) = backend.pause().await {
                debug!("audio: pause failed: {:#}", e);
            }
        }
        self.timer.cancel_slot(AudioTimer::Drift);
        self.state = AudioGateState::Unlocked;
    }

    pub async fn on_video_ended(&mut self) {
        self.on_video_pause().await;
    }

    pub async fn on_timer(&mut self, fired: TimerFired<AudioTimer>) {
        if self.timer.accept(fired).is_none() || self.state != AudioGateState::Active {
            return;
        }
        let (Some((drift, interval)), Some(backend)) = (self.drift.as_mut(), self.backend.as_mut()) else {
            return;
        };
        let step = drift.next_step();
        let interval = *interval;
        if let Err(e) = backend.apply_drift(step).await {
            debug!("audio: drift step failed: {:#}", e);
        }
        self.timer.schedule(AudioTimer::Drift, interval);
    }

    /// Silence and release everything.  Safe from any state, any number of
    /// times.
    pub fn stop(&mut self) {
        if self.state == AudioGateState::Stopped {
            return;
        }
        self.armed = false;
        self.timer.cancel_all();
        // An aborted resume drops the lent backend, which releases it.
        if let Some(task) = self.unlocking.take() {
            task.abort();
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.close();
        }
        info!("audio: stopped (was {:?})", self.state);
        self.state = AudioGateState::Stopped;
    }

    async fn start_playback(&mut self, position: Duration) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        if let Err(e) = backend.seek(position).await {
            debug!("audio: sync to {:?} failed: {:#}", position, e);
            return;
        }
        match backend.play().await {
            Ok(()) => {
                if self.state != AudioGateState::Active {
                    debug!("audio: narration playing from {:?}", position);
                }
                self.state = AudioGateState::Active;
                self.arm_drift();
            }
            Err(e) => debug!("audio: play failed: {:#}", e),
        }
    }

    fn arm_drift(&mut self) {
        if let Some((_, interval)) = self.drift.as_ref() {
            if !self.timer.is_pending(AudioTimer::Drift) {
                self.timer.schedule(AudioTimer::Drift, *interval);
            }
        }
    }
}

impl<B> Drop for AmbientAudioGate<B> {
    fn drop(&mut self) {
        if let Some(task) = self.unlocking.take() {
            task.abort();
        }
    }
}
