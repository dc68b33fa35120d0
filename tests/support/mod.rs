#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ballcam_client::auth::{FlowState, Session, SessionStore, User};
use ballcam_client::error::ClientError;
use ballcam_client::sink::UiSink;
use ballcam_client::updater::{
    DownloadEvent, PendingUpdate, Relauncher, UpdateInfo, UpdateSource, UpdateState,
};

pub fn sample_user(username: &str) -> User {
    User {
        id: "user-1".to_string(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        email_verified: true,
        avatar_url: None,
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    session: Mutex<Option<Session>>,
    saves: AtomicU32,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Session> {
        self.session.lock().expect("store lock poisoned").clone()
    }

    pub fn save_count(&self) -> u32 {
        self.saves.load(Ordering::SeqCst)
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self) -> Result<Option<Session>, ClientError> {
        Ok(self.get())
    }

    fn save(&self, session: &Session) -> Result<(), ClientError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.session.lock().expect("store lock poisoned") = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.session.lock().expect("store lock poisoned") = None;
        Ok(())
    }
}

/// Records every transition and URL-open request for assertions.
#[derive(Default)]
pub struct RecordingSink {
    flow: Mutex<Vec<FlowState>>,
    updates: Mutex<Vec<UpdateState>>,
    opened: Mutex<Vec<String>>,
    fail_open: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `open_url` always fails (no browser available).
    pub fn without_browser() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn flow_states(&self) -> Vec<FlowState> {
        self.flow.lock().expect("sink lock poisoned").clone()
    }

    pub fn flow_names(&self) -> Vec<&'static str> {
        self.flow_states().iter().map(FlowState::name).collect()
    }

    pub fn update_names(&self) -> Vec<&'static str> {
        self.updates
            .lock()
            .expect("sink lock poisoned")
            .iter()
            .map(UpdateState::name)
            .collect()
    }

    /// Percentages reported through `Downloading` transitions, in order.
    pub fn download_percents(&self) -> Vec<u8> {
        self.updates
            .lock()
            .expect("sink lock poisoned")
            .iter()
            .filter_map(|state| match state {
                UpdateState::Downloading { percent } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.lock().expect("sink lock poisoned").clone()
    }
}

impl UiSink for RecordingSink {
    fn flow_changed(&self, state: &FlowState) {
        self.flow
            .lock()
            .expect("sink lock poisoned")
            .push(state.clone());
    }

    fn update_changed(&self, state: &UpdateState) {
        self.updates
            .lock()
            .expect("sink lock poisoned")
            .push(state.clone());
    }

    fn open_url(&self, url: &str) -> Result<(), ClientError> {
        self.opened
            .lock()
            .expect("sink lock poisoned")
            .push(url.to_string());
        if self.fail_open {
            return Err(ClientError::Io("no browser available".to_string()));
        }
        Ok(())
    }
}

/// One scripted answer per `check()` call.
pub enum CheckScript {
    UpToDate,
    Fail(String),
    Available {
        info: UpdateInfo,
        events: Vec<DownloadEvent>,
        install: Result<(), String>,
    },
    /// Sleep before answering up-to-date; used to hold a check in flight.
    Slow(Duration),
}

#[derive(Default)]
pub struct ScriptedUpdateSource {
    script: Mutex<VecDeque<CheckScript>>,
    checks: AtomicU32,
}

impl ScriptedUpdateSource {
    pub fn new(script: Vec<CheckScript>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            checks: AtomicU32::new(0),
        }
    }

    pub fn check_count(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpdateSource for ScriptedUpdateSource {
    async fn check(&self) -> Result<Option<Box<dyn PendingUpdate>>, ClientError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or(CheckScript::UpToDate);
        match next {
            CheckScript::UpToDate => Ok(None),
            CheckScript::Fail(message) => Err(ClientError::Network(message)),
            CheckScript::Available {
                info,
                events,
                install,
            } => Ok(Some(Box::new(ScriptedPending {
                info,
                events,
                install,
            }))),
            CheckScript::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(None)
            }
        }
    }
}

struct ScriptedPending {
    info: UpdateInfo,
    events: Vec<DownloadEvent>,
    install: Result<(), String>,
}

#[async_trait]
impl PendingUpdate for ScriptedPending {
    fn info(&self) -> &UpdateInfo {
        &self.info
    }

    async fn download_and_install(
        self: Box<Self>,
        on_event: &mut (dyn FnMut(DownloadEvent) + Send),
    ) -> Result<(), ClientError> {
        for event in self.events {
            on_event(event);
        }
        self.install.map_err(ClientError::Network)
    }
}

pub fn release(version: &str) -> UpdateInfo {
    UpdateInfo {
        version: version.to_string(),
        date: Some("2026-08-01T00:00:00Z".to_string()),
        body: Some("Bug fixes".to_string()),
    }
}

pub struct ScriptedRelauncher {
    fail: bool,
    calls: AtomicU32,
}

impl ScriptedRelauncher {
    pub fn ok() -> Self {
        Self {
            fail: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Relauncher for ScriptedRelauncher {
    fn relaunch(&self) -> Result<(), ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ClientError::Io("relaunch binary missing".to_string()));
        }
        Ok(())
    }
}
