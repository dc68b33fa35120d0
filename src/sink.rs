//! Notification sink for UI collaborators.

use crate::auth::device_flow::FlowState;
use crate::error::ClientError;
use crate::updater::UpdateState;

/// Receives every state transition for rendering, plus requests to open the
/// verification URL in an external browser.
///
/// Implementations must be cheap and non-blocking; they are invoked from the
/// poll task between probes.
pub trait UiSink: Send + Sync {
    fn flow_changed(&self, state: &FlowState);
    fn update_changed(&self, state: &UpdateState);
    /// Best-effort. Callers log a failure and carry on.
    fn open_url(&self, url: &str) -> Result<(), ClientError>;
}

/// Headless sink: logs transitions via `tracing`, never opens a browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl UiSink for LogSink {
    fn flow_changed(&self, state: &FlowState) {
        tracing::debug!(state = state.name(), "device flow transition");
    }

    fn update_changed(&self, state: &UpdateState) {
        tracing::debug!(state = state.name(), "update check transition");
    }

    fn open_url(&self, url: &str) -> Result<(), ClientError> {
        tracing::info!(%url, "verification url ready (headless sink, not opened)");
        Ok(())
    }
}
