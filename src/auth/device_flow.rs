//! Device authorization grant state machine.
//!
//! Orchestrates: mint a device code, hand the verification URL to the UI
//! sink, poll the token endpoint on the advertised interval, and resolve to
//! success, expired, denied, or error. Built on [`Poller`], which guarantees
//! sequential poll delivery and discards results that arrive after teardown.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::device_code::{DeviceCode, PollOutcome, User};
use super::identity::IdentityClient;
use super::session::{Session, SessionStore};
use crate::error::ClientError;
use crate::sink::UiSink;
use crate::util::poller::{PollControl, Poller};

/// Exactly one variant is live at a time, each holding only the data relevant
/// to that state. `Polling` implies an owned, running poller; every exit from
/// `Polling` stops that poller before the new state becomes observable.
#[derive(Debug, Clone)]
pub enum FlowState {
    Idle,
    Loading,
    CodeReady(DeviceCode),
    Polling(DeviceCode),
    Success(User),
    Expired,
    Denied,
    Error(String),
}

impl FlowState {
    /// Short status label for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::CodeReady(_) => "code_ready",
            Self::Polling(_) => "polling",
            Self::Success(_) => "success",
            Self::Expired => "expired",
            Self::Denied => "denied",
            Self::Error(_) => "error",
        }
    }

    /// Whether this state ends the attempt (only an explicit retry restarts).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success(_) | Self::Expired | Self::Denied | Self::Error(_)
        )
    }
}

/// What to do when the service answers `slow_down`.
///
/// The deployed BallCam agent ignores it and keeps the advertised interval;
/// RFC 8628 intends the interval to grow. Left as a policy so callers can
/// pick either without forking the flow.
#[derive(Debug, Clone, Copy, Default)]
pub enum SlowDownPolicy {
    /// Keep the current interval.
    #[default]
    Ignore,
    /// Add this much to the interval on every `slow_down`.
    Extend(Duration),
}

/// Client side of the device authorization grant.
///
/// One instance per logical attempt surface; dropping it (or calling
/// [`close`](Self::close)) stops any background polling, and late poll
/// responses are discarded rather than applied to state.
pub struct DeviceFlowClient {
    identity: Arc<IdentityClient>,
    store: Arc<dyn SessionStore>,
    sink: Arc<dyn UiSink>,
    state: Arc<Mutex<FlowState>>,
    poller: Poller,
    slow_down: SlowDownPolicy,
}

impl DeviceFlowClient {
    pub fn new(
        identity: Arc<IdentityClient>,
        store: Arc<dyn SessionStore>,
        sink: Arc<dyn UiSink>,
    ) -> Self {
        Self {
            identity,
            store,
            sink,
            state: Arc::new(Mutex::new(FlowState::Idle)),
            poller: Poller::new(),
            slow_down: SlowDownPolicy::default(),
        }
    }

    pub fn with_slow_down_policy(mut self, policy: SlowDownPolicy) -> Self {
        self.slow_down = policy;
        self
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> FlowState {
        lock_state(&self.state).clone()
    }

    /// Begin a fresh attempt: mint a new device code.
    ///
    /// Always stops any previous poller first, so a retry from `Expired`,
    /// `Denied`, or `Error` can never resume stale polling. On success the
    /// state is `CodeReady` and the minted code is returned for display.
    pub async fn start(&mut self) -> Result<DeviceCode, ClientError> {
        self.poller.stop();
        self.transition(FlowState::Loading);
        match self.identity.request_device_code().await {
            Ok(code) => {
                self.transition(FlowState::CodeReady(code.clone()));
                Ok(code)
            }
            Err(err) => {
                self.transition(FlowState::Error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Open the verification URL (best effort) and start polling for the
    /// token at the interval the service advertised.
    pub fn begin_polling(&mut self, code: DeviceCode) -> Result<(), ClientError> {
        self.poller.stop();
        if let Err(err) = self.sink.open_url(&code.verification_url) {
            tracing::warn!(error = %err, url = %code.verification_url, "failed to open verification url");
        }

        let interval = Duration::from_secs(code.interval.max(1));
        self.transition(FlowState::Polling(code.clone()));

        let identity = self.identity.clone();
        let device_code = code.device_code;
        let state = self.state.clone();
        let sink = self.sink.clone();
        let store = self.store.clone();
        let policy = self.slow_down;

        self.poller.start(
            interval,
            move || {
                let identity = identity.clone();
                let device_code = device_code.clone();
                async move { identity.poll_token(&device_code).await }
            },
            move |outcome, control| {
                handle_outcome(outcome, control, &state, sink.as_ref(), store.as_ref(), policy);
            },
        )
    }

    /// Tear down mid-flow (owning surface unmounted). Idempotent.
    pub fn close(&mut self) {
        self.poller.stop();
    }

    fn transition(&self, next: FlowState) {
        apply_transition(&self.state, self.sink.as_ref(), next);
    }
}

fn handle_outcome(
    outcome: Result<PollOutcome, ClientError>,
    control: &mut PollControl,
    state: &Mutex<FlowState>,
    sink: &dyn UiSink,
    store: &dyn SessionStore,
    policy: SlowDownPolicy,
) {
    match outcome {
        Ok(PollOutcome::Pending) => {}
        Ok(PollOutcome::SlowDown) => match policy {
            SlowDownPolicy::Ignore => {}
            SlowDownPolicy::Extend(extra) => {
                let next = control.interval() + extra;
                tracing::debug!(
                    interval_secs = next.as_secs(),
                    "slow_down received, extending poll interval"
                );
                control.set_interval(next);
            }
        },
        Ok(PollOutcome::Success(bundle)) => {
            control.stop();
            let bundle = *bundle;
            if let Err(err) = store.save(&Session::from_bundle(&bundle)) {
                tracing::warn!(error = %err, "failed to persist session");
            }
            apply_transition(state, sink, FlowState::Success(bundle.user));
        }
        Ok(PollOutcome::Expired) => {
            control.stop();
            apply_transition(state, sink, FlowState::Expired);
        }
        Ok(PollOutcome::Denied) => {
            control.stop();
            apply_transition(state, sink, FlowState::Denied);
        }
        // A single failed tick must not kill an otherwise healthy flow.
        Err(err) => {
            tracing::warn!(error = %err, "device token poll failed, will retry next tick");
        }
    }
}

fn apply_transition(state: &Mutex<FlowState>, sink: &dyn UiSink, next: FlowState) {
    {
        let mut guard = lock_state(state);
        *guard = next.clone();
    }
    sink.flow_changed(&next);
}

fn lock_state(state: &Mutex<FlowState>) -> std::sync::MutexGuard<'_, FlowState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
