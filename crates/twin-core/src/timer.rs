//! PhaseTimer — one pending timer per logical slot.
//!
//! Each slot holds at most one pending timer.  Scheduling into an occupied
//! slot cancels the old timer first, so stacked timers can never double-fire.
//!
//! Firings are delivered to a sink (normally a channel into the owner's event
//! loop) as `TimerFired` values.  The owner hands each one back through
//! [`PhaseTimer::accept`] before acting on it: a firing that was already in
//! flight when its timer was cancelled or superseded carries a stale
//! generation and is rejected there.  Cancelled timers therefore never reach
//! their handler, even when the abort loses the race with the sleep.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::trace;

// Global so that a firing routed to the wrong timer can never match.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// A timer firing on its way back to the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired<K> {
    pub slot: K,
    generation: u64,
}

/// Identifies one scheduled timer.  Goes stale once the slot is rescheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle<K> {
    slot: K,
    generation: u64,
}

impl<K: Copy> TimerHandle<K> {
    pub fn slot(&self) -> K {
        self.slot
    }
}

type Sink<K> = Arc<dyn Fn(TimerFired<K>) + Send + Sync>;

struct Pending {
    generation: u64,
    task: AbortHandle,
}

pub struct PhaseTimer<K> {
    sink: Sink<K>,
    pending: HashMap<K, Pending>,
}

impl<K> PhaseTimer<K>
where
    K: Copy + Eq + Hash + Debug + Send + Sync + 'static,
{
    pub fn new(sink: impl Fn(TimerFired<K>) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
            pending: HashMap::new(),
        }
    }

    /// Deliver firings into an event channel, wrapped by `wrap`.
    pub fn forward<E: Send + 'static>(
        tx: mpsc::UnboundedSender<E>,
        wrap: fn(TimerFired<K>) -> E,
    ) -> Self {
        Self::new(move |fired| {
            // Receiver gone means the owner is shutting down.
            let _ = tx.send(wrap(fired));
        })
    }

    pub fn schedule(&mut self, slot: K, delay: Duration) -> TimerHandle<K> {
        self.cancel_slot(slot);

        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        let sink = Arc::clone(&self.sink);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            (sink)(TimerFired { slot, generation });
        });
        trace!("timer: scheduled {:?} gen={} in {:?}", slot, generation, delay);

        self.pending.insert(
            slot,
            Pending {
                generation,
                task: task.abort_handle(),
            },
        );
        TimerHandle { slot, generation }
    }

    /// Cancel the timer behind `handle` if it is still the slot's current one.
    pub fn cancel(&mut self, handle: TimerHandle<K>) -> bool {
        match self.pending.get(&handle.slot) {
            Some(p) if p.generation == handle.generation => self.cancel_slot(handle.slot),
            _ => false,
        }
    }

    pub fn cancel_slot(&mut self, slot: K) -> bool {
        match self.pending.remove(&slot) {
            Some(p) => {
                p.task.abort();
                trace!("timer: cancelled {:?} gen={}", slot, p.generation);
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, p) in self.pending.drain() {
            p.task.abort();
        }
    }

    pub fn is_pending(&self, slot: K) -> bool {
        self.pending.contains_key(&slot)
    }

    /// Claim a delivered firing.  Returns the slot only if the firing belongs
    /// to the slot's current timer; the slot is free again afterwards.
    pub fn accept(&mut self, fired: TimerFired<K>) -> Option<K> {
        match self.pending.get(&fired.slot) {
            Some(p) if p.generation == fired.generation => {
                self.pending.remove(&fired.slot);
                Some(fired.slot)
            }
            _ => {
                trace!(
                    "timer: dropping stale firing {:?} gen={}",
                    fired.slot,
                    fired.generation
                );
                None
            }
        }
    }
}

impl<K> Drop for PhaseTimer<K> {
    fn drop(&mut self) {
        for (_, p) in self.pending.drain() {
            p.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio::time::{timeout, Instant};

    fn assert_elapsed(since: Instant, ms: u64) {
        let elapsed = since.elapsed();
        let expected = Duration::from_millis(ms);
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(5),
            "expected ~{:?}, got {:?}",
            expected,
            elapsed
        );
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Slot {
        A,
        B,
    }

    fn timer() -> (PhaseTimer<Slot>, mpsc::UnboundedReceiver<TimerFired<Slot>>) {
        let (tx, rx) = unbounded_channel();
        (PhaseTimer::forward(tx, |f| f), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let (mut timers, mut rx) = timer();
        let start = Instant::now();
        timers.schedule(Slot::A, Duration::from_millis(2000));

        let fired = rx.recv().await.unwrap();
        assert_elapsed(start, 2000);
        assert_eq!(timers.accept(fired), Some(Slot::A));
        assert!(!timers.is_pending(Slot::A));
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_a_slot_replaces_the_old_timer() {
        let (mut timers, mut rx) = timer();
        let start = Instant::now();
        timers.schedule(Slot::A, Duration::from_millis(100));
        timers.schedule(Slot::A, Duration::from_millis(300));

        let fired = rx.recv().await.unwrap();
        assert_elapsed(start, 300);
        assert_eq!(timers.accept(fired), Some(Slot::A));
        assert!(timeout(Duration::from_secs(5), rx.recv()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_handle_never_fires() {
        let (mut timers, mut rx) = timer();
        let handle = timers.schedule(Slot::A, Duration::from_millis(100));
        timers.schedule(Slot::B, Duration::from_millis(200));
        assert!(timers.cancel(handle));

        let fired = rx.recv().await.unwrap();
        assert_eq!(timers.accept(fired), Some(Slot::B));
        assert!(timeout(Duration::from_secs(5), rx.recv()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn firing_queued_before_cancel_is_rejected() {
        let (mut timers, mut rx) = timer();
        timers.schedule(Slot::A, Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(150)).await;

        // Already sitting in the channel when the owner cancels.
        assert!(timers.cancel_slot(Slot::A));
        let fired = rx.recv().await.unwrap();
        assert_eq!(timers.accept(fired), None);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_handle_does_not_cancel_successor() {
        let (mut timers, _rx) = timer();
        let old = timers.schedule(Slot::A, Duration::from_millis(100));
        let new = timers.schedule(Slot::A, Duration::from_millis(200));
        assert!(!timers.cancel(old));
        assert!(timers.is_pending(Slot::A));
        assert_eq!(new.slot(), Slot::A);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_timer_cancels_everything() {
        let (mut timers, mut rx) = timer();
        timers.schedule(Slot::A, Duration::from_millis(100));
        timers.schedule(Slot::B, Duration::from_millis(100));
        drop(timers);
        // Either the channel closes (all senders dropped) or nothing arrives.
        assert!(!matches!(
            timeout(Duration::from_secs(5), rx.recv()).await,
            Ok(Some(_))
        ));
    }
}
