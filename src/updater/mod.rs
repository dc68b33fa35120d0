//! Background update-check state machine.
//!
//! Mirrors the device flow's shape: a single active remote check, a
//! cancelable background timer, and state owned exclusively by the client
//! instance. `Downloading` is reachable only from `Available`, which pins the
//! exact release the check produced.

pub mod source;

pub use source::{
    CurrentExeRelauncher, DownloadEvent, HttpUpdateSource, PendingUpdate, Relauncher,
    UpdateInfo, UpdateSource,
};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::ClientError;
use crate::sink::UiSink;

const DEFAULT_QUIESCENT_DELAY: Duration = Duration::from_secs(3);

/// Update-check lifecycle. `UpToDate` is transient: it reverts to `Idle`
/// after a quiescent delay so the UI does not permanently show it.
#[derive(Debug, Clone)]
pub enum UpdateState {
    Idle,
    Checking,
    UpToDate,
    Available(UpdateInfo),
    Downloading { percent: u8 },
    Error(String),
}

impl UpdateState {
    /// Short status label for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::UpToDate => "up_to_date",
            Self::Available(_) => "available",
            Self::Downloading { .. } => "downloading",
            Self::Error(_) => "error",
        }
    }
}

/// Client driving check → available/up-to-date → download → install-relaunch.
pub struct UpdateClient {
    source: Arc<dyn UpdateSource>,
    relauncher: Arc<dyn Relauncher>,
    sink: Arc<dyn UiSink>,
    state: Arc<Mutex<UpdateState>>,
    pending: Mutex<Option<Box<dyn PendingUpdate>>>,
    /// Bumped on every check and on teardown; a stale revert timer compares
    /// its captured value and discards itself instead of touching state.
    generation: Arc<AtomicU64>,
    revert_task: Mutex<Option<JoinHandle<()>>>,
    quiescent_delay: Duration,
}

impl UpdateClient {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        relauncher: Arc<dyn Relauncher>,
        sink: Arc<dyn UiSink>,
    ) -> Self {
        Self {
            source,
            relauncher,
            sink,
            state: Arc::new(Mutex::new(UpdateState::Idle)),
            pending: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
            revert_task: Mutex::new(None),
            quiescent_delay: DEFAULT_QUIESCENT_DELAY,
        }
    }

    /// How long `UpToDate` is shown before reverting to `Idle`.
    pub fn with_quiescent_delay(mut self, delay: Duration) -> Self {
        self.quiescent_delay = delay;
        self
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> UpdateState {
        lock(&self.state).clone()
    }

    /// Query the release endpoint for a newer version.
    ///
    /// A call while a check or download is in flight is logged and ignored
    /// (single active remote check). Failures surface as an `Error` state
    /// and are also returned.
    pub async fn check_for_updates(&self) -> Result<(), ClientError> {
        {
            let guard = lock(&self.state);
            if matches!(*guard, UpdateState::Checking | UpdateState::Downloading { .. }) {
                tracing::debug!(state = guard.name(), "update check already in flight, ignoring");
                return Ok(());
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.cancel_revert();
        self.transition(UpdateState::Checking);
        tracing::info!("checking for updates");

        let outcome = self.source.check().await;
        // close() (or a newer check) bumped the counter while we were in
        // flight; the outcome must not reach state or the sink.
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("update check superseded, discarding outcome");
            return Ok(());
        }

        match outcome {
            Ok(Some(pending)) => {
                let info = pending.info().clone();
                *lock(&self.pending) = Some(pending);
                tracing::info!(version = %info.version, "update available");
                self.transition(UpdateState::Available(info));
                Ok(())
            }
            Ok(None) => {
                tracing::info!("no update available");
                self.transition(UpdateState::UpToDate);
                self.schedule_revert(generation);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "update check failed");
                self.transition(UpdateState::Error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Download the release retained by the last check, then relaunch.
    ///
    /// Valid only from `Available`; anything else is
    /// [`ClientError::NoPendingUpdate`] and performs no network call. A
    /// failed relaunch surfaces as `Error` — the update must not look
    /// silently successful while the running process is stale.
    pub async fn download_and_install(&self) -> Result<(), ClientError> {
        let pending = {
            let guard = lock(&self.state);
            if !matches!(*guard, UpdateState::Available(_)) {
                return Err(ClientError::NoPendingUpdate);
            }
            lock(&self.pending)
                .take()
                .ok_or(ClientError::NoPendingUpdate)?
        };

        self.transition(UpdateState::Downloading { percent: 0 });

        let state = self.state.clone();
        let sink = self.sink.clone();
        let mut downloaded: u64 = 0;
        let mut content_length: u64 = 0;
        let mut last_percent: Option<u8> = None;

        let result = pending
            .download_and_install(&mut |event| match event {
                DownloadEvent::Started { content_length: total } => {
                    content_length = total;
                }
                DownloadEvent::Progress { chunk_length } => {
                    downloaded += chunk_length;
                    // No percentage until the total is known and nonzero.
                    if content_length > 0 {
                        let ratio = downloaded as f64 / content_length as f64;
                        let percent = (ratio * 100.0).round().min(100.0) as u8;
                        if last_percent != Some(percent) {
                            last_percent = Some(percent);
                            apply(&state, sink.as_ref(), UpdateState::Downloading { percent });
                        }
                    }
                }
                DownloadEvent::Finished => {
                    if last_percent != Some(100) {
                        last_percent = Some(100);
                        apply(&state, sink.as_ref(), UpdateState::Downloading { percent: 100 });
                    }
                }
            })
            .await;

        match result {
            Ok(()) => {
                tracing::info!("update installed, relaunching");
                if let Err(err) = self.relauncher.relaunch() {
                    tracing::warn!(error = %err, "relaunch failed");
                    self.transition(UpdateState::Error(err.to_string()));
                    return Err(err);
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "update download failed");
                self.transition(UpdateState::Error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Tear down (owning surface unmounted): cancels the revert timer and
    /// discards the outcome of any check still in flight. Idempotent.
    pub fn close(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cancel_revert();
    }

    fn schedule_revert(&self, generation: u64) {
        let state = self.state.clone();
        let sink = self.sink.clone();
        let counter = self.generation.clone();
        let delay = self.quiescent_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Superseded by a newer check, or torn down.
            if counter.load(Ordering::SeqCst) != generation {
                return;
            }
            let mut guard = lock(&state);
            if matches!(*guard, UpdateState::UpToDate) {
                *guard = UpdateState::Idle;
                drop(guard);
                sink.update_changed(&UpdateState::Idle);
            }
        });
        if let Some(previous) = lock(&self.revert_task).replace(handle) {
            previous.abort();
        }
    }

    fn cancel_revert(&self) {
        if let Some(handle) = lock(&self.revert_task).take() {
            handle.abort();
        }
    }

    fn transition(&self, next: UpdateState) {
        apply(&self.state, self.sink.as_ref(), next);
    }
}

impl Drop for UpdateClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn apply(state: &Mutex<UpdateState>, sink: &dyn UiSink, next: UpdateState) {
    {
        let mut guard = lock(state);
        *guard = next.clone();
    }
    sink.update_changed(&next);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
