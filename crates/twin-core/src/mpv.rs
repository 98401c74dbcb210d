/// mpv-backed narration for the audio gate.
///
/// ```text
///   MpvNarration::resume()
///         │  spawn `mpv --idle --pause --no-video`, connect IPC, loadfile
///         ├── writer_task   ← PendingRequest via mpsc, serialised → socket
///         └── reader_task   ← JSON lines from socket
///                                ├── response (has request_id) → matched oneshot
///                                └── event                      → event channel
/// ```
///
/// The player is started paused, so loading the track is silent; only the
/// gate's `play()` unpauses it.  `close()` kills the process synchronously,
/// which is what guarantees silence the moment the gate stops.
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::audio::{AudioBackend, DriftStep};

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

/// Label of the low-pass filter the drift modulates.
const DRIFT_FILTER: &str = "drift";
const IPC_TIMEOUT: Duration = Duration::from_secs(5);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line (already has '\n')
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An unsolicited mpv event (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// e.g. "file-loaded", "end-file", "pause".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }
}

/// Cloneable handle to the writer task.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(IPC_TIMEOUT, reply_rx)
            .await
            .map_err(|_| anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    pub async fn set_property(&self, name: &str, value: Value) -> anyhow::Result<()> {
        self.send(json!(["set_property", name, value])).await?;
        Ok(())
    }
}

pub struct MpvNarration {
    track: PathBuf,
    volume: f32,
    socket_name: String,
    process: Option<tokio::process::Child>,
    handle: Option<MpvHandle>,
}

impl MpvNarration {
    pub fn new(track: PathBuf, volume: f32) -> Self {
        Self {
            track,
            volume: volume.clamp(0.0, 1.0),
            socket_name: twin_proto::platform::mpv_socket_name(),
            process: None,
            handle: None,
        }
    }

    fn handle(&self) -> anyhow::Result<&MpvHandle> {
        self.handle
            .as_ref()
            .ok_or_else(|| anyhow!("narration player not running"))
    }

    fn spawn_player(&mut self) -> anyhow::Result<()> {
        let mpv_binary =
            twin_proto::platform::find_mpv_binary().ok_or_else(|| anyhow!("mpv binary not found"))?;

        let child = tokio::process::Command::new(&mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg("--pause=yes")
            .arg("--quiet")
            .arg(format!("--volume={}", (self.volume * 100.0).round() as i64))
            .arg(format!("--af=@{}:lowpass=f=20000", DRIFT_FILTER))
            .arg(twin_proto::platform::mpv_socket_arg(&self.socket_name))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {}", mpv_binary.display()))?;
        info!("mpv: spawned narration player pid={:?}", child.id());
        self.process = Some(child);
        Ok(())
    }

    #[cfg(unix)]
    async fn connect(&mut self) -> anyhow::Result<(MpvHandle, mpsc::Receiver<MpvEvent>)> {
        let socket_path = PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;
        self.spawn_player()?;

        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            bail!("mpv IPC socket did not appear");
        }

        // The socket file can exist a moment before mpv accepts on it.
        let mut last_err = None;
        for _ in 0..10 {
            match tokio::net::UnixStream::connect(&socket_path).await {
                Ok(stream) => {
                    info!("mpv: connected to IPC socket");
                    return Ok(start_io_tasks(stream));
                }
                Err(e) => {
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
        Err(anyhow!("mpv IPC connect failed: {:?}", last_err))
    }

    #[cfg(windows)]
    async fn connect(&mut self) -> anyhow::Result<(MpvHandle, mpsc::Receiver<MpvEvent>)> {
        use tokio::net::windows::named_pipe::ClientOptions;

        self.spawn_player()?;
        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                return Ok(start_io_tasks(client));
            }
        }
        bail!("mpv named pipe did not appear")
    }
}

impl AudioBackend for MpvNarration {
    async fn resume(&mut self) -> anyhow::Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        if !self.track.exists() {
            bail!("narration track {} not found", self.track.display());
        }

        let (handle, mut events) = match self.connect().await {
            Ok(pair) => pair,
            Err(e) => {
                self.close();
                return Err(e);
            }
        };

        let track = self.track.to_string_lossy().to_string();
        if let Err(e) = handle.send(json!(["loadfile", track])).await {
            self.close();
            return Err(e.context("loading narration track"));
        }

        // time-pos is only writable once the file is loaded.
        let loaded = tokio::time::timeout(IPC_TIMEOUT, async {
            while let Some(evt) = events.recv().await {
                if evt.event_name() == Some("file-loaded") {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);
        if !loaded {
            self.close();
            bail!("narration track never finished loading");
        }

        // Keep draining so the reader never blocks on a full channel.
        tokio::spawn(async move {
            while let Some(evt) = events.recv().await {
                debug!("mpv: event {:?}", evt.event_name());
            }
        });

        self.handle = Some(handle);
        Ok(())
    }

    async fn seek(&mut self, position: Duration) -> anyhow::Result<()> {
        self.handle()?
            .set_property("time-pos", json!(position.as_secs_f64()))
            .await
    }

    async fn play(&mut self) -> anyhow::Result<()> {
        self.handle()?.set_property("pause", json!(false)).await
    }

    async fn pause(&mut self) -> anyhow::Result<()> {
        self.handle()?.set_property("pause", json!(true)).await
    }

    async fn apply_drift(&mut self, step: DriftStep) -> anyhow::Result<()> {
        let handle = self.handle()?;
        let volume = (step.gain * 100.0).clamp(0.0, 100.0);
        handle.set_property("volume", json!(volume)).await?;
        handle
            .send(json!([
                "af-command",
                DRIFT_FILTER,
                "f",
                format!("{:.0}", step.cutoff_hz)
            ]))
            .await?;
        Ok(())
    }

    fn close(&mut self) {
        // Dropping the handle ends the writer task.
        self.handle = None;
        if let Some(mut child) = self.process.take() {
            if let Err(e) = child.start_kill() {
                warn!("mpv: kill failed: {}", e);
            }
            info!("mpv: narration player stopped");
        }
        #[cfg(unix)]
        {
            let _ = std::fs::remove_file(&self.socket_name);
        }
    }
}

impl Drop for MpvNarration {
    fn drop(&mut self) {
        self.close();
    }
}

fn start_io_tasks<S>(stream: S) -> (MpvHandle, mpsc::Receiver<MpvEvent>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);
    let (event_tx, event_rx) = mpsc::channel::<MpvEvent>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    (MpvHandle { tx: cmd_tx }, event_rx)
}

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, event_tx: mpsc::Sender<MpvEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let closed_reason = match reader.read_line(&mut line).await {
            Ok(0) => "connection closed".to_string(),
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    if let Some(tx) = pending.lock().await.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error");
                            Err(anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    }
                } else {
                    let _ = event_tx.send(MpvEvent { raw: val }).await;
                }
                continue;
            }
            Err(e) => format!("read error: {}", e),
        };

        debug!("mpv reader: {}", closed_reason);
        for (_, tx) in pending.lock().await.drain() {
            let _ = tx.send(Err(anyhow!("mpv IPC {}", closed_reason)));
        }
        break;
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can always match the reply.
        pending.lock().await.insert(req.req_id, req.reply);
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_track_refuses_to_resume() {
        let mut narration = MpvNarration::new(PathBuf::from("/nonexistent/narration.mp3"), 0.5);
        let err = narration.resume().await.unwrap_err();
        assert!(err.to_string().contains("not found"));

        // Still silent, and closing twice is harmless.
        assert!(narration.play().await.is_err());
        narration.close();
        narration.close();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn handle_matches_replies_by_request_id() {
        let (client, server) = tokio::net::UnixStream::pair().unwrap();
        let (handle, mut events) = start_io_tasks(client);

        // Minimal fake mpv: answer every command, then push one event.
        tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(server);
            let mut lines = BufReader::new(read_half).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let req: Value = serde_json::from_str(&line).unwrap();
                let reply = json!({ "request_id": req["request_id"], "error": "success", "data": null });
                let event = json!({ "event": "file-loaded" });
                let out = format!("{}\n{}\n", event, reply);
                write_half.write_all(out.as_bytes()).await.unwrap();
            }
        });

        handle.set_property("pause", json!(false)).await.unwrap();
        let evt = events.recv().await.unwrap();
        assert_eq!(evt.event_name(), Some("file-loaded"));
    }
}
