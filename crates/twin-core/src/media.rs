//! MediaClock: playback position and natural-end event of a video.
//!
//! The landing intro video and the welcome avatar clip have no decoder
//! behind them in the terminal; what the state machines need from a video is
//! its position, its play events and its terminal "ended" event, and that is
//! what this clock provides.

use std::time::Duration;

use tokio::time::Instant;

use crate::timer::{PhaseTimer, TimerFired};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaTimer {
    End,
}

pub struct MediaClock {
    duration: Duration,
    /// Position at the last pause/seek.
    offset: Duration,
    playing_since: Option<Instant>,
    ended: bool,
    timer: PhaseTimer<MediaTimer>,
}

impl MediaClock {
    pub fn new(duration: Duration, timer: PhaseTimer<MediaTimer>) -> Self {
        Self {
            duration,
            offset: Duration::ZERO,
            playing_since: None,
            ended: false,
            timer,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn position(&self) -> Duration {
        match self.playing_since {
            Some(since) => (self.offset + since.elapsed()).min(self.duration),
            None => self.offset,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing_since.is_some()
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Start or resume playback.  Returns true when this produced a "play"
    /// event (false if already playing).  Playing an ended clip restarts it.
    pub fn play(&mut self) -> bool {
        if self.is_playing() {
            return false;
        }
        if self.ended {
            self.ended = false;
            self.offset = Duration::ZERO;
        }
        self.playing_since = Some(Instant::now());
        self.arm_end();
        true
    }

    pub fn pause(&mut self) -> bool {
        if !self.is_playing() {
            return false;
        }
        self.offset = self.position();
        self.playing_since = None;
        self.timer.cancel_slot(MediaTimer::End);
        true
    }

    pub fn seek(&mut self, position: Duration) {
        self.offset = position.min(self.duration);
        self.ended = false;
        if self.is_playing() {
            self.playing_since = Some(Instant::now());
            self.arm_end();
        }
    }

    /// True exactly once per natural end.
    pub fn on_timer(&mut self, fired: TimerFired<MediaTimer>) -> bool {
        if self.timer.accept(fired).is_none() {
            return false;
        }
        self.offset = self.duration;
        self.playing_since = None;
        self.ended = true;
        true
    }

    /// Unmount: freeze the position and drop the pending end event.
    pub fn stop(&mut self) {
        if self.is_playing() {
            self.offset = self.position();
            self.playing_since = None;
        }
        self.timer.cancel_all();
    }

    fn arm_end(&mut self) {
        let remaining = self.duration.saturating_sub(self.offset);
        self.timer.schedule(MediaTimer::End, remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{self, unbounded_channel};
    use tokio::time::timeout;

    fn clock(ms: u64) -> (MediaClock, mpsc::UnboundedReceiver<TimerFired<MediaTimer>>) {
        let (tx, rx) = unbounded_channel();
        (
            MediaClock::new(Duration::from_millis(ms), PhaseTimer::forward(tx, |f| f)),
            rx,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn ends_after_its_duration() {
        let (mut video, mut rx) = clock(4000);
        let start = Instant::now();
        assert!(video.play());
        assert!(!video.play());

        let fired = rx.recv().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(4000));
        assert!(video.on_timer(fired));
        assert!(video.has_ended());
        assert_eq!(video.position(), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_position_and_end() {
        let (mut video, mut rx) = clock(4000);
        video.play();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(video.pause());

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(video.position(), Duration::from_millis(1500));
        assert!(timeout(Duration::from_millis(1), rx.recv()).await.is_err());

        let resumed = Instant::now();
        video.play();
        rx.recv().await.unwrap();
        let elapsed = resumed.elapsed();
        assert!(elapsed >= Duration::from_millis(2500) && elapsed < Duration::from_millis(2600));
    }

    #[tokio::test(start_paused = true)]
    async fn seek_while_playing_rearms_the_end() {
        let (mut video, mut rx) = clock(4000);
        video.play();
        tokio::time::sleep(Duration::from_millis(500)).await;
        video.seek(Duration::from_millis(3500));

        let seeked = Instant::now();
        let fired = rx.recv().await.unwrap();
        assert!(seeked.elapsed() < Duration::from_millis(600));
        assert!(video.on_timer(fired));
    }

    #[tokio::test(start_paused = true)]
    async fn play_after_end_restarts() {
        let (mut video, mut rx) = clock(1000);
        video.play();
        let fired = rx.recv().await.unwrap();
        video.on_timer(fired);

        assert!(video.play());
        assert!(!video.has_ended());
        assert!(video.position() < Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_drops_the_end_event() {
        let (mut video, mut rx) = clock(1000);
        video.play();
        video.stop();
        assert!(!video.is_playing());
        assert!(timeout(Duration::from_secs(5), rx.recv()).await.is_err());
    }
}
