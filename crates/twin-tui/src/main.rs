mod app;
mod components;
mod theme;
mod view_state;
mod widgets;

use tokio::sync::{broadcast, mpsc};
use twin_core::client::ChatClient;
use twin_core::core::{CoreEvent, CoreUpdate, TwinCore};
use twin_core::mpv::MpvNarration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = twin_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("twin.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; default to debug for app code but suppress noisy
    // connection-level DEBUG from HTTP client internals (hyper_util, reqwest).
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("twin log: {}", log_path.display());

    tracing::info!("twin starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = twin_proto::config::Config::load().unwrap_or_else(|e| {
        tracing::warn!("config unreadable ({}), using defaults", e);
        Default::default()
    });
    let endpoint = config.chat_endpoint();
    tracing::info!("chat endpoint: {}", endpoint);

    // The view only needs to know whether to show the avatar or a placeholder.
    let has_avatar = config.media.avatar_image.exists();

    // ── Update channel (TwinCore → TUI) ──────────────────────────────────────
    let (update_tx, update_rx) = broadcast::channel::<CoreUpdate>(1024);

    // ── CoreEvent channel (TUI/timers/chat → TwinCore) ───────────────────────
    let (event_tx, event_rx) = mpsc::unbounded_channel::<CoreEvent>();

    // ── Build TwinCore ───────────────────────────────────────────────────────
    let client = ChatClient::new(&endpoint, config.request_timeout())?;
    let narration = MpvNarration::new(config.audio.narration.clone(), config.audio.volume);
    let core = TwinCore::new(&config, narration, client, event_tx.clone(), update_tx);

    // ── Spawn TwinCore event loop ────────────────────────────────────────────
    let core_task = tokio::spawn(async move {
        if let Err(e) = core.run(event_rx).await {
            tracing::error!("TwinCore exited with error: {}", e);
        }
    });

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(event_tx.clone(), has_avatar, config.timings.handoff());
    let result = app.run(update_rx).await;

    // Stop the core so the narration player is killed before we exit.
    let _ = event_tx.send(CoreEvent::Shutdown);
    let _ = core_task.await;

    result
}
