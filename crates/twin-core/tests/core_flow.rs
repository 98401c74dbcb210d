//! End-to-end runs of the TwinCore loop with shortened timings, a mock chat
//! endpoint and a recording audio backend.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use common::{spawn_mock_chat, Reply};
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;
use twin_core::audio::{AudioBackend, AudioGateState, DriftStep, Gesture};
use twin_core::client::ChatClient;
use twin_core::core::{CoreEvent, CoreUpdate, Route, TwinCore};
use twin_core::landing::Phase;
use twin_core::welcome::WelcomePhase;
use twin_proto::config::Config;
use twin_proto::protocol::{Role, CHAT_ERROR_REPLY};

#[derive(Clone, Default)]
struct Recorder {
    calls: Arc<Mutex<Vec<&'static str>>>,
    /// When set, `resume` waits for a permit.
    hold: Option<Arc<Notify>>,
}

impl Recorder {
    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

impl AudioBackend for Recorder {
    async fn resume(&mut self) -> anyhow::Result<()> {
        self.push("resume");
        if let Some(hold) = self.hold.clone() {
            hold.notified().await;
        }
        Ok(())
    }

    async fn seek(&mut self, _position: Duration) -> anyhow::Result<()> {
        self.push("seek");
        Ok(())
    }

    async fn play(&mut self) -> anyhow::Result<()> {
        self.push("play");
        Ok(())
    }

    async fn pause(&mut self) -> anyhow::Result<()> {
        self.push("pause");
        Ok(())
    }

    async fn apply_drift(&mut self, _step: DriftStep) -> anyhow::Result<()> {
        self.push("drift");
        Ok(())
    }

    fn close(&mut self) {
        self.push("close");
    }
}

fn fast_config(endpoint: &str) -> Config {
    let mut config = Config::default();
    config.chat.endpoint = endpoint.to_string();
    let t = &mut config.timings;
    t.text_dwell_ms = 40;
    t.fade_ms = 20;
    t.welcome_video_ms = 40;
    t.avatar_fade_ms = 20;
    t.intro_video_ms = 60;
    t.reveal_fallback_ms = 2000;
    t.handoff_ms = 20;
    t.refocus_ms = 10;
    t.drift_interval_ms = 15;
    config
}

struct Harness {
    events: mpsc::UnboundedSender<CoreEvent>,
    updates: broadcast::Receiver<CoreUpdate>,
    backend: Recorder,
    task: JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    fn start(config: &Config) -> Self {
        Self::start_with(config, Recorder::default())
    }

    fn start_with(config: &Config, backend: Recorder) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (update_tx, updates) = broadcast::channel(512);
        let client = ChatClient::new(&config.chat.endpoint, Duration::from_secs(5)).unwrap();
        let core = TwinCore::new(config, backend.clone(), client, event_tx.clone(), update_tx);
        let task = tokio::spawn(core.run(event_rx));
        Self {
            events: event_tx,
            updates,
            backend,
            task,
        }
    }

    fn send(&self, event: CoreEvent) {
        self.events.send(event).unwrap();
    }

    /// Drain updates until one matches, returning everything seen on the way.
    async fn wait_for(&mut self, pred: impl Fn(&CoreUpdate) -> bool) -> Vec<CoreUpdate> {
        let mut seen = Vec::new();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let update = tokio::time::timeout_at(deadline, self.updates.recv())
                .await
                .unwrap_or_else(|_| panic!("timed out; saw {:?}", seen))
                .unwrap();
            let done = pred(&update);
            seen.push(update);
            if done {
                return seen;
            }
        }
    }

    async fn enter_twin(&mut self) {
        self.wait_for(|u| *u == CoreUpdate::UiRevealed).await;
        self.send(CoreEvent::EnterNow);
        self.wait_for(|u| *u == CoreUpdate::Navigated(Route::Twin)).await;
    }
}

fn welcome_phases(updates: &[CoreUpdate]) -> Vec<WelcomePhase> {
    updates
        .iter()
        .filter_map(|u| match u {
            CoreUpdate::WelcomePhase(p) => Some(*p),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn full_onboarding_flow() {
    let mock = spawn_mock_chat(Reply::Echo).await;
    let mut h = Harness::start(&fast_config(&mock.base_url));

    h.wait_for(|u| *u == CoreUpdate::Navigated(Route::Landing)).await;
    h.send(CoreEvent::Gesture(Gesture::Key));
    h.wait_for(|u| *u == CoreUpdate::AudioGate(AudioGateState::Active)).await;

    // Intro ends at 60ms: narration pauses and the UI is revealed.
    h.wait_for(|u| *u == CoreUpdate::UiRevealed).await;
    h.send(CoreEvent::EnterDoor);
    h.wait_for(|u| *u == CoreUpdate::LandingPhase(Phase::Entering)).await;
    let seen = h.wait_for(|u| *u == CoreUpdate::Navigated(Route::Twin)).await;
    assert!(seen.contains(&CoreUpdate::AudioGate(AudioGateState::Stopped)));

    let calls = h.backend.calls();
    assert_eq!(&calls[..3], &["resume", "seek", "play"]);
    assert_eq!(calls.last(), Some(&"close"));
    assert!(calls.contains(&"pause"));

    // Welcome runs to Avatar on its own.
    let seen = h
        .wait_for(|u| *u == CoreUpdate::WelcomePhase(WelcomePhase::Avatar))
        .await;
    assert_eq!(
        welcome_phases(&seen),
        vec![
            WelcomePhase::Text,
            WelcomePhase::Fade,
            WelcomePhase::Video,
            WelcomePhase::Avatar
        ]
    );

    h.send(CoreEvent::InputChanged("Hello".to_string()));
    h.send(CoreEvent::Submit);
    let seen = h
        .wait_for(|u| matches!(u, CoreUpdate::MessageAppended(m) if m.role == Role::Assistant))
        .await;
    assert!(seen.contains(&CoreUpdate::InputCleared));
    assert!(seen.contains(&CoreUpdate::Loading(true)));
    assert!(seen
        .iter()
        .any(|u| matches!(u, CoreUpdate::MessageAppended(m) if m.content == "Hello")));
    match seen.last() {
        Some(CoreUpdate::MessageAppended(m)) => assert_eq!(m.content, "echo: Hello"),
        other => panic!("unexpected {:?}", other),
    }

    // The fade-out and the refocus race each other; both must arrive.
    let mut rest = seen;
    rest.extend(h.wait_for(|u| *u == CoreUpdate::FocusInput).await);
    if !rest.contains(&CoreUpdate::WelcomePhase(WelcomePhase::Hidden)) {
        h.wait_for(|u| *u == CoreUpdate::WelcomePhase(WelcomePhase::Hidden))
            .await;
    }

    h.send(CoreEvent::Shutdown);
    h.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn early_submit_jumps_through_avatar() {
    let mock = spawn_mock_chat(Reply::Echo).await;
    let mut h = Harness::start(&fast_config(&mock.base_url));
    h.enter_twin().await;

    h.send(CoreEvent::InputChanged("quick".to_string()));
    h.send(CoreEvent::Submit);
    let seen = h
        .wait_for(|u| *u == CoreUpdate::WelcomePhase(WelcomePhase::Hidden))
        .await;

    let phases = welcome_phases(&seen);
    let jump = phases
        .iter()
        .position(|p| *p == WelcomePhase::AvatarFadeOut)
        .unwrap();
    assert_eq!(phases[jump - 1], WelcomePhase::Avatar);
    assert!(phases.windows(2).all(|w| w[0] < w[1]), "{:?}", phases);
}

#[tokio::test]
async fn double_submit_sends_one_request() {
    let mock = spawn_mock_chat(Reply::Slow(Duration::from_millis(100))).await;
    let mut h = Harness::start(&fast_config(&mock.base_url));
    h.enter_twin().await;

    h.send(CoreEvent::InputChanged("Hello".to_string()));
    h.send(CoreEvent::Submit);
    h.send(CoreEvent::Submit);
    h.wait_for(|u| *u == CoreUpdate::Loading(false)).await;

    assert_eq!(mock.requests().len(), 1);
}

#[tokio::test]
async fn endpoint_failure_appends_apology() {
    let mock = spawn_mock_chat(Reply::Status(StatusCode::INTERNAL_SERVER_ERROR)).await;
    let mut h = Harness::start(&fast_config(&mock.base_url));
    h.enter_twin().await;

    h.send(CoreEvent::InputChanged("Hello".to_string()));
    h.send(CoreEvent::Submit);
    let seen = h.wait_for(|u| *u == CoreUpdate::Loading(false)).await;

    let appended: Vec<_> = seen
        .iter()
        .filter_map(|u| match u {
            CoreUpdate::MessageAppended(m) => Some((m.role, m.content.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        appended,
        vec![
            (Role::User, "Hello".to_string()),
            (Role::Assistant, CHAT_ERROR_REPLY.to_string()),
        ]
    );
}

#[tokio::test]
async fn no_sound_without_a_gesture() {
    let mock = spawn_mock_chat(Reply::Echo).await;
    let mut h = Harness::start(&fast_config(&mock.base_url));
    h.enter_twin().await;

    // The gate was stopped on the way out without ever resuming.
    assert_eq!(h.backend.calls(), vec!["close"]);

    h.send(CoreEvent::Gesture(Gesture::Click));
    h.send(CoreEvent::Shutdown);
    h.task.await.unwrap().unwrap();
    assert_eq!(h.backend.calls(), vec!["close"]);
}

#[tokio::test]
async fn shutdown_on_landing_silences_audio() {
    let mock = spawn_mock_chat(Reply::Echo).await;
    let mut h = Harness::start(&fast_config(&mock.base_url));
    h.send(CoreEvent::Gesture(Gesture::Touch));
    h.wait_for(|u| *u == CoreUpdate::AudioGate(AudioGateState::Active)).await;

    h.send(CoreEvent::Shutdown);
    h.task.await.unwrap().unwrap();
    assert_eq!(h.backend.calls().last(), Some(&"close"));
}

#[tokio::test]
async fn slow_audio_start_does_not_hold_up_the_door() {
    let mock = spawn_mock_chat(Reply::Echo).await;
    let hold = Arc::new(Notify::new());
    let backend = Recorder {
        hold: Some(hold.clone()),
        ..Default::default()
    };
    let mut h = Harness::start_with(&fast_config(&mock.base_url), backend);
    h.wait_for(|u| *u == CoreUpdate::Navigated(Route::Landing)).await;

    h.send(CoreEvent::Gesture(Gesture::Click));
    h.send(CoreEvent::EnterDoor);
    let seen = tokio::time::timeout(
        Duration::from_millis(500),
        h.wait_for(|u| *u == CoreUpdate::LandingPhase(Phase::Entering)),
    )
    .await
    .expect("door click waited for the audio to start");
    assert!(seen.contains(&CoreUpdate::AudioGate(AudioGateState::Unlocking)));

    // The hand-off stops the gate while the resume is still pending.
    let seen = h.wait_for(|u| *u == CoreUpdate::Navigated(Route::Twin)).await;
    assert!(seen.contains(&CoreUpdate::AudioGate(AudioGateState::Stopped)));
    hold.notify_one();

    h.send(CoreEvent::Shutdown);
    h.task.await.unwrap().unwrap();
    let calls = h.backend.calls();
    assert!(!calls.contains(&"seek") && !calls.contains(&"play"), "{:?}", calls);
}
