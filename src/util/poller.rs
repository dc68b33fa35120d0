//! Cancelable repeating-timer driver.
//!
//! [`Poller`] invokes a caller-supplied async probe on a fixed interval until
//! told to stop. Probes never overlap: the next tick is scheduled only after
//! the current probe resolves and its outcome is delivered, so outcomes reach
//! the callback strictly in issue order. The first probe fires only after the
//! first interval elapses, matching the RFC 8628 "wait `interval` seconds
//! before the first poll" contract.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::ClientError;

/// Handed to the outcome callback on every delivery.
///
/// Lets the callback stop the poller *before* it applies a terminal state
/// transition, and reschedule the interval (slow-down backoff).
pub struct PollControl {
    live: Arc<AtomicBool>,
    interval: Duration,
    stopped: bool,
}

impl PollControl {
    /// Stop the poller. No further probe will be issued; the liveness flag is
    /// cleared immediately, so the stop is visible before the callback returns.
    pub fn stop(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        self.stopped = true;
    }

    /// Use `interval` for every subsequent tick.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// The interval the next tick will be scheduled with.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Generic repeating-timer driver with start/stop.
///
/// One tokio task per `start()`; a fresh liveness flag is minted each start so
/// a probe left in flight by `stop()` can never deliver into a later run.
#[derive(Default)]
pub struct Poller {
    live: Option<Arc<AtomicBool>>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a poll loop is currently live.
    pub fn is_running(&self) -> bool {
        self.live
            .as_ref()
            .is_some_and(|live| live.load(Ordering::SeqCst))
    }

    /// Begin issuing `probe()` every `interval`, feeding each outcome to
    /// `on_outcome` in call order.
    ///
    /// Fails with [`ClientError::AlreadyRunning`] if a loop is already live;
    /// callers must `stop()` first.
    pub fn start<T, P, Fut, F>(
        &mut self,
        interval: Duration,
        mut probe: P,
        mut on_outcome: F,
    ) -> Result<(), ClientError>
    where
        T: Send + 'static,
        P: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        F: FnMut(T, &mut PollControl) + Send + 'static,
    {
        if self.is_running() {
            return Err(ClientError::AlreadyRunning);
        }

        let live = Arc::new(AtomicBool::new(true));
        let task_live = live.clone();
        let handle = tokio::spawn(async move {
            let mut interval = interval;
            loop {
                tokio::time::sleep(interval).await;
                if !task_live.load(Ordering::SeqCst) {
                    break;
                }
                let outcome = probe().await;
                // stop() may have raced the in-flight probe; discard its result.
                if !task_live.load(Ordering::SeqCst) {
                    break;
                }
                let mut control = PollControl {
                    live: task_live.clone(),
                    interval,
                    stopped: false,
                };
                on_outcome(outcome, &mut control);
                if control.stopped {
                    break;
                }
                interval = control.interval;
            }
        });

        self.live = Some(live);
        self.handle = Some(handle);
        Ok(())
    }

    /// Cancel the poll loop. Idempotent; guarantees no further probe
    /// invocation and no delivery from a probe already in flight.
    pub fn stop(&mut self) {
        if let Some(live) = self.live.take() {
            live.store(false, Ordering::SeqCst);
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}
