/// TwinCore: single-owner event loop for the whole onboarding flow.
///
/// The view, the timer tasks and the chat request task only ever send
/// `CoreEvent`s into this loop.  TwinCore owns every controller, the audio
/// gate and the chat session exclusively; no other task touches them.
///
/// After each event that changes something the view shows, TwinCore
/// broadcasts a `CoreUpdate` to all listeners via a `tokio::sync::broadcast`
/// channel.
///
/// The chat request and the audio unlock are the awaits that could take
/// long, so each runs on its own task.  The chat reply re-enters as
/// `CoreEvent::ChatCompleted`; the unlock is picked up next to the event
/// channel in `run`.  Other awaits on the audio backend stay inline; they are
/// local IPC round-trips.
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};
use twin_proto::config::Config;
use twin_proto::protocol::{ChatResponse, Message};

use crate::audio::{
    AmbientAudioGate, AudioBackend, AudioGateState, AudioTimer, Drift, Gesture, Resumed,
};
use crate::chat::{ChatSession, ChatTimer};
use crate::client::{ChatClient, ChatError};
use crate::landing::{LandingController, LandingEvent, LandingTimer, Phase};
use crate::media::{MediaClock, MediaTimer};
use crate::timer::{PhaseTimer, TimerFired};
use crate::welcome::{WelcomeController, WelcomePhase, WelcomeTimer};

// ── CoreEvent ─────────────────────────────────────────────────────────────────

/// All inputs into the TwinCore loop.
#[derive(Debug)]
pub enum CoreEvent {
    /// Any key press or click; may unlock audio.
    Gesture(Gesture),
    /// The door on the landing screen.
    EnterDoor,
    /// "Enter the Room": skip the door animation.
    EnterNow,
    IntroTogglePause,
    IntroSeek(Duration),
    InputChanged(String),
    Submit,
    ChatCompleted(Result<ChatResponse, ChatError>),
    LandingTimer(TimerFired<LandingTimer>),
    WelcomeTimer(TimerFired<WelcomeTimer>),
    IntroVideo(TimerFired<MediaTimer>),
    WelcomeVideo(TimerFired<MediaTimer>),
    AudioTimer(TimerFired<AudioTimer>),
    ChatTimer(TimerFired<ChatTimer>),
    Shutdown,
}

// ── CoreUpdate ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Landing,
    Twin,
}

/// Everything the view needs to redraw, pushed as it changes.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreUpdate {
    Navigated(Route),
    LandingPhase(Phase),
    UiRevealed,
    WelcomePhase(WelcomePhase),
    IntroPlayback {
        position: Duration,
        duration: Duration,
        playing: bool,
    },
    AudioGate(AudioGateState),
    MessageAppended(Message),
    InputCleared,
    Loading(bool),
    FocusInput,
    Log(String),
}

// ── TwinCore ──────────────────────────────────────────────────────────────────

pub struct TwinCore<B> {
    route: Route,
    landing: LandingController,
    intro: MediaClock,
    welcome: WelcomeController,
    welcome_clip: MediaClock,
    gate: AmbientAudioGate<B>,
    chat: ChatSession,
    client: ChatClient,
    audio_enabled: bool,
    event_tx: mpsc::UnboundedSender<CoreEvent>,
    update_tx: broadcast::Sender<CoreUpdate>,
}

impl<B: AudioBackend> TwinCore<B> {
    pub fn new(
        config: &Config,
        backend: B,
        client: ChatClient,
        event_tx: mpsc::UnboundedSender<CoreEvent>,
        update_tx: broadcast::Sender<CoreUpdate>,
    ) -> Self {
        let timings = &config.timings;

        let mut gate = AmbientAudioGate::new(
            backend,
            PhaseTimer::forward(event_tx.clone(), CoreEvent::AudioTimer),
        );
        if config.audio.drift {
            gate = gate.with_drift(Drift::new(config.audio.volume), timings.drift_interval());
        }

        Self {
            route: Route::Landing,
            landing: LandingController::new(
                timings.into(),
                PhaseTimer::forward(event_tx.clone(), CoreEvent::LandingTimer),
            ),
            intro: MediaClock::new(
                timings.intro_video(),
                PhaseTimer::forward(event_tx.clone(), CoreEvent::IntroVideo),
            ),
            welcome: WelcomeController::new(
                timings.into(),
                PhaseTimer::forward(event_tx.clone(), CoreEvent::WelcomeTimer),
            ),
            welcome_clip: MediaClock::new(
                timings.welcome_video(),
                PhaseTimer::forward(event_tx.clone(), CoreEvent::WelcomeVideo),
            ),
            gate,
            chat: ChatSession::new(
                timings.refocus(),
                PhaseTimer::forward(event_tx.clone(), CoreEvent::ChatTimer),
            ),
            client,
            audio_enabled: config.audio.enabled,
            event_tx,
            update_tx,
        }
    }

    pub fn route(&self) -> Route {
        self.route
    }

    /// Run the core event loop.  Returns when a `Shutdown` event is received.
    /// The core holds senders of its own (timers, chat task), so the channel
    /// never closes underneath it.
    pub async fn run(mut self, mut event_rx: mpsc::UnboundedReceiver<CoreEvent>) -> anyhow::Result<()> {
        info!("TwinCore: starting event loop");
        self.mount_landing();

        loop {
            tokio::select! {
                event = event_rx.recv() => match event {
                    Some(CoreEvent::Shutdown) => {
                        info!("TwinCore: shutdown requested");
                        break;
                    }
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                resumed = self.gate.resumed(), if self.gate.is_unlocking() => {
                    self.finish_unlock(resumed).await;
                }
            }
        }

        self.teardown();
        info!("TwinCore: event loop stopped");
        Ok(())
    }

    async fn handle_event(&mut self, event: CoreEvent) {
        match event {
            CoreEvent::Gesture(gesture) => self.handle_gesture(gesture),
            CoreEvent::EnterDoor => {
                if self.route == Route::Landing && self.landing.enter() {
                    self.publish(CoreUpdate::LandingPhase(Phase::Entering));
                }
            }
            CoreEvent::EnterNow => {
                if self.route == Route::Landing && self.landing.ui_revealed() {
                    info!("TwinCore: entering without the door");
                    self.hand_off();
                }
            }
            CoreEvent::IntroTogglePause => self.toggle_intro().await,
            CoreEvent::IntroSeek(position) => {
                if self.route != Route::Landing {
                    return;
                }
                self.intro.seek(position);
                if self.intro.is_playing() {
                    self.gate.on_video_play(self.intro.position()).await;
                }
                self.publish_intro();
                self.publish_gate();
            }
            CoreEvent::InputChanged(text) => self.chat.set_input(text),
            CoreEvent::Submit => self.submit(),
            CoreEvent::ChatCompleted(outcome) => {
                let reply = self.chat.complete(outcome).clone();
                self.publish(CoreUpdate::MessageAppended(reply));
                self.publish(CoreUpdate::Loading(false));
            }
            CoreEvent::LandingTimer(fired) => match self.landing.on_timer(fired) {
                Some(LandingEvent::UiRevealed) => self.publish(CoreUpdate::UiRevealed),
                Some(LandingEvent::Handoff) => self.hand_off(),
                None => {}
            },
            CoreEvent::WelcomeTimer(fired) => {
                let entered = self.welcome.on_timer(fired);
                self.publish_welcome(entered);
            }
            CoreEvent::IntroVideo(fired) => {
                if self.intro.on_timer(fired) {
                    debug!("TwinCore: intro video ended");
                    self.gate.on_video_ended().await;
                    self.publish_intro();
                    self.publish_gate();
                    if self.landing.on_intro_ended() == Some(LandingEvent::UiRevealed) {
                        self.publish(CoreUpdate::UiRevealed);
                    }
                }
            }
            CoreEvent::WelcomeVideo(fired) => {
                if self.welcome_clip.on_timer(fired) {
                    let entered = self.welcome.on_video_ended();
                    self.publish_welcome(entered);
                }
            }
            CoreEvent::AudioTimer(fired) => self.gate.on_timer(fired).await,
            CoreEvent::ChatTimer(fired) => {
                if self.chat.on_timer(fired) {
                    self.publish(CoreUpdate::FocusInput);
                }
            }
            CoreEvent::Shutdown => {}
        }
    }

    fn mount_landing(&mut self) {
        self.publish(CoreUpdate::Navigated(Route::Landing));
        if self.audio_enabled {
            self.gate.arm();
        }
        // Autoplays muted; the gate is still locked so nothing is heard.
        self.intro.play();
        self.landing.start();
        self.publish_intro();
        self.publish_gate();
    }

    fn handle_gesture(&mut self, gesture: Gesture) {
        if !self.gate.is_armed() {
            return;
        }
        self.gate.on_gesture(gesture);
        self.publish_gate();
    }

    async fn finish_unlock(&mut self, resumed: Resumed<B>) {
        let video = (self.route == Route::Landing && self.intro.is_playing())
            .then(|| self.intro.position());
        if self.gate.on_resumed(resumed, video).await == AudioGateState::Locked {
            self.publish(CoreUpdate::Log("audio unavailable".to_string()));
        }
        self.publish_gate();
    }

    async fn toggle_intro(&mut self) {
        if self.route != Route::Landing {
            return;
        }
        if self.intro.is_playing() {
            self.intro.pause();
            self.gate.on_video_pause().await;
        } else if self.intro.play() {
            self.gate.on_video_play(self.intro.position()).await;
        }
        self.publish_intro();
        self.publish_gate();
    }

    /// Stop the audio, unmount the landing screen and show the chat.
    fn hand_off(&mut self) {
        if self.route != Route::Landing {
            return;
        }
        self.gate.stop();
        self.publish_gate();
        self.landing.teardown();
        self.intro.stop();

        self.route = Route::Twin;
        info!("TwinCore: navigated to the twin");
        self.publish(CoreUpdate::Navigated(Route::Twin));
        self.publish(CoreUpdate::WelcomePhase(self.welcome.phase()));
        self.welcome.start();
    }

    fn submit(&mut self) {
        if self.route != Route::Twin {
            return;
        }
        let Some(request) = self.chat.begin_send() else {
            return;
        };

        if let Some(sent) = self.chat.messages().last().cloned() {
            self.publish(CoreUpdate::MessageAppended(sent));
        }
        self.publish(CoreUpdate::InputCleared);
        self.publish(CoreUpdate::Loading(true));

        let entered = self.welcome.dismiss();
        self.publish_welcome(entered);

        let client = self.client.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let outcome = client.send(&request).await;
            // Receiver gone means the core is shutting down.
            let _ = tx.send(CoreEvent::ChatCompleted(outcome));
        });
    }

    fn publish_welcome(&mut self, entered: Vec<WelcomePhase>) {
        for phase in entered {
            match phase {
                WelcomePhase::Video => {
                    self.welcome_clip.play();
                }
                WelcomePhase::Avatar => self.welcome_clip.stop(),
                _ => {}
            }
            self.publish(CoreUpdate::WelcomePhase(phase));
        }
    }

    fn publish_intro(&self) {
        self.publish(CoreUpdate::IntroPlayback {
            position: self.intro.position(),
            duration: self.intro.duration(),
            playing: self.intro.is_playing(),
        });
    }

    fn publish_gate(&self) {
        self.publish(CoreUpdate::AudioGate(self.gate.state()));
    }

    fn publish(&self, update: CoreUpdate) {
        // No subscribers is fine; the view may not be attached yet.
        let _ = self.update_tx.send(update);
    }

    fn teardown(&mut self) {
        self.gate.stop();
        self.landing.teardown();
        self.intro.stop();
        self.welcome.teardown();
        self.welcome_clip.stop();
        self.chat.teardown();
    }
}
