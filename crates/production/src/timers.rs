//! Timer management for production runner.
//!
//! Each timer is a tokio task that sleeps and then reports its expiry to the
//! runner. Expiry only enqueues; the runner processes the event on its
//! serialized loop.
//!
//! Aborting a task cannot recall an expiry that is already queued, so every
//! arm gets a fresh generation. The runner asks [`TimerManager::take_fired`]
//! before acting on an expiry, and anything from an older arm is dropped.

use ibft_core::TimerId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Expiry notice sent by a timer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub id: TimerId,
    pub generation: u64,
}

struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Manages the consensus timers of one node.
pub struct TimerManager {
    timers: HashMap<TimerId, ArmedTimer>,
    next_generation: u64,
    fired_tx: mpsc::Sender<TimerFired>,
}

impl TimerManager {
    pub fn new(fired_tx: mpsc::Sender<TimerFired>) -> Self {
        Self {
            timers: HashMap::new(),
            next_generation: 0,
            fired_tx,
        }
    }

    /// Arm `id`, replacing any pending timer with the same id.
    pub fn set_timer(&mut self, id: TimerId, duration: Duration) {
        self.cancel_timer(id);

        let generation = self.next_generation;
        self.next_generation += 1;

        let fired_tx = self.fired_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            trace!(?id, generation, "Timer fired");
            // The runner is gone if the channel is closed.
            let _ = fired_tx.send(TimerFired { id, generation }).await;
        });

        self.timers.insert(id, ArmedTimer { generation, handle });
        debug!(?id, generation, ?duration, "Timer set");
    }

    /// Cancel `id`. No-op if it is not pending.
    pub fn cancel_timer(&mut self, id: TimerId) {
        if let Some(timer) = self.timers.remove(&id) {
            timer.handle.abort();
            debug!(?id, generation = timer.generation, "Timer cancelled");
        }
    }

    pub fn cancel_all(&mut self) {
        for (id, timer) in self.timers.drain() {
            timer.handle.abort();
            trace!(?id, "Timer cancelled (shutdown)");
        }
    }

    /// Claim an expiry. Returns `true` only if `fired` belongs to the arm
    /// that is still current for its id, which is then disarmed.
    pub fn take_fired(&mut self, fired: TimerFired) -> bool {
        match self.timers.get(&fired.id) {
            Some(timer) if timer.generation == fired.generation => {
                self.timers.remove(&fired.id);
                true
            }
            _ => {
                trace!(
                    id = ?fired.id,
                    generation = fired.generation,
                    "Dropping stale timer expiry"
                );
                false
            }
        }
    }

    /// Number of armed timers whose expiry has not been claimed.
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn next_fired(rx: &mut mpsc::Receiver<TimerFired>) -> TimerFired {
        tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_timer_fires() {
        let (fired_tx, mut fired_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(fired_tx);

        manager.set_timer(TimerId::RoundChange, Duration::from_millis(10));

        let fired = next_fired(&mut fired_rx).await;
        assert_eq!(fired.id, TimerId::RoundChange);
        assert!(manager.take_fired(fired));
        assert_eq!(manager.active_count(), 0);

        // Claimed once only.
        assert!(!manager.take_fired(fired));
    }

    #[tokio::test]
    async fn test_timer_cancel() {
        let (fired_tx, mut fired_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(fired_tx);

        manager.set_timer(TimerId::FuturePreprepare, Duration::from_millis(50));
        manager.cancel_timer(TimerId::FuturePreprepare);
        assert_eq!(manager.active_count(), 0);

        let result = tokio::time::timeout(Duration::from_millis(150), fired_rx.recv()).await;
        assert!(result.is_err(), "Timer should have been cancelled");
    }

    #[tokio::test]
    async fn test_timer_replace() {
        let (fired_tx, mut fired_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(fired_tx);

        manager.set_timer(TimerId::RoundChange, Duration::from_secs(5));
        manager.set_timer(TimerId::RoundChange, Duration::from_millis(10));
        assert_eq!(manager.active_count(), 1);

        let fired = next_fired(&mut fired_rx).await;
        assert_eq!(fired.id, TimerId::RoundChange);
        assert!(manager.take_fired(fired));
    }

    #[tokio::test]
    async fn test_expiry_queued_before_rearm_is_stale() {
        let (fired_tx, mut fired_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(fired_tx);

        manager.set_timer(TimerId::RoundChange, Duration::from_millis(10));
        // Let the first arm expire into the channel without draining it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.set_timer(TimerId::RoundChange, Duration::from_secs(10));

        let fired = next_fired(&mut fired_rx).await;
        assert!(!manager.take_fired(fired));
        assert_eq!(manager.active_count(), 1);
    }

    #[tokio::test]
    async fn test_expiry_queued_before_cancel_is_stale() {
        let (fired_tx, mut fired_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(fired_tx);

        manager.set_timer(TimerId::FuturePreprepare, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.cancel_timer(TimerId::FuturePreprepare);

        let fired = next_fired(&mut fired_rx).await;
        assert!(!manager.take_fired(fired));
    }

    #[tokio::test]
    async fn test_independent_ids() {
        let (fired_tx, mut fired_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(fired_tx);

        manager.set_timer(TimerId::RoundChange, Duration::from_millis(30));
        manager.set_timer(TimerId::FuturePreprepare, Duration::from_millis(10));
        assert_eq!(manager.active_count(), 2);

        let first = next_fired(&mut fired_rx).await;
        let second = next_fired(&mut fired_rx).await;
        assert_eq!(first.id, TimerId::FuturePreprepare);
        assert_eq!(second.id, TimerId::RoundChange);
        assert!(manager.take_fired(first));
        assert!(manager.take_fired(second));
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let (fired_tx, mut fired_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(fired_tx);

        manager.set_timer(TimerId::RoundChange, Duration::from_millis(50));
        manager.set_timer(TimerId::FuturePreprepare, Duration::from_millis(50));
        manager.cancel_all();
        assert_eq!(manager.active_count(), 0);

        let result = tokio::time::timeout(Duration::from_millis(150), fired_rx.recv()).await;
        assert!(result.is_err(), "No timers should have fired");
    }
}
