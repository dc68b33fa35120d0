use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::device_code::{TokenBundle, User};
use crate::error::ClientError;

/// Authenticated session persisted between runs (`session.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub access_token_expiry: DateTime<Utc>,
    pub refresh_token_expiry: Option<DateTime<Utc>>,
    pub user: User,
    pub device_id: Option<String>,
}

impl Session {
    /// Build a session from the token bundle delivered by an approved device
    /// flow. Device-flow sessions carry no refresh token.
    pub fn from_bundle(bundle: &TokenBundle) -> Self {
        Self {
            access_token: bundle.access_token.clone(),
            refresh_token: None,
            access_token_expiry: Utc::now() + Duration::seconds(bundle.expires_in as i64),
            refresh_token_expiry: None,
            user: bundle.user.clone(),
            device_id: Some(bundle.device_id.clone()),
        }
    }
}

/// Storage abstraction for the persisted session.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Session>, ClientError>;
    fn save(&self, session: &Session) -> Result<(), ClientError>;
    fn clear(&self) -> Result<(), ClientError>;
}

/// File-backed session store using a JSON file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at `~/.ballcam/session.json`.
    pub fn new_default() -> Self {
        Self {
            path: default_ballcam_dir().join("session.json"),
        }
    }

    fn ensure_parent(path: &Path) -> Result<(), ClientError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, ClientError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ClientError::Io(err.to_string())),
        };
        let session: Session = serde_json::from_str(&raw)?;
        Ok(Some(session))
    }

    fn save(&self, session: &Session) -> Result<(), ClientError> {
        Self::ensure_parent(&self.path)?;
        let serialized = serde_json::to_string_pretty(session)?;
        // Owner-only from the moment the file exists; a chmod after the
        // write would leave the token world-readable in between.
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        file.write_all(serialized.as_bytes())?;
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ClientError::Io(err.to_string())),
        }
    }
}

fn default_ballcam_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".ballcam"))
        .unwrap_or_else(|| PathBuf::from(".ballcam"))
}
