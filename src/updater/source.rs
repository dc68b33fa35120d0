use std::path::PathBuf;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::error::ClientError;

/// Metadata for a release offered to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInfo {
    pub version: String,
    pub date: Option<String>,
    pub body: Option<String>,
}

/// Byte-count events emitted while downloading an update artifact.
#[derive(Debug, Clone, Copy)]
pub enum DownloadEvent {
    Started { content_length: u64 },
    Progress { chunk_length: u64 },
    Finished,
}

/// Where update checks come from.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// `None` means the running version is current. `Some` hands back a
    /// handle pinned to the exact release that was checked, so a later
    /// install operates on what the user was shown even if a newer release
    /// appears in the meantime.
    async fn check(&self) -> Result<Option<Box<dyn PendingUpdate>>, ClientError>;
}

/// A specific checked release, ready to fetch and install.
#[async_trait]
pub trait PendingUpdate: Send + Sync {
    fn info(&self) -> &UpdateInfo;

    /// Download and stage the release, reporting progress through `on_event`.
    async fn download_and_install(
        self: Box<Self>,
        on_event: &mut (dyn FnMut(DownloadEvent) + Send),
    ) -> Result<(), ClientError>;
}

/// Restarts the process after a successful install.
pub trait Relauncher: Send + Sync {
    fn relaunch(&self) -> Result<(), ClientError>;
}

/// Spawns a fresh copy of the current executable. The caller is expected to
/// exit once the spawn succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct CurrentExeRelauncher;

impl Relauncher for CurrentExeRelauncher {
    fn relaunch(&self) -> Result<(), ClientError> {
        let exe = std::env::current_exe()?;
        std::process::Command::new(exe).spawn()?;
        Ok(())
    }
}

/// Release-manifest update source.
///
/// `GET {endpoint}` answers 204 when the running version is current, or 200
/// with `{version, pub_date?, notes?, url}` pointing at the artifact.
pub struct HttpUpdateSource {
    client: reqwest::Client,
    endpoint: String,
    download_dir: PathBuf,
}

impl HttpUpdateSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            download_dir: std::env::temp_dir(),
        }
    }

    /// Where downloaded artifacts are staged.
    pub fn with_download_dir(mut self, dir: PathBuf) -> Self {
        self.download_dir = dir;
        self
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseManifest {
    version: String,
    pub_date: Option<String>,
    notes: Option<String>,
    url: String,
}

#[async_trait]
impl UpdateSource for HttpUpdateSource {
    async fn check(&self) -> Result<Option<Box<dyn PendingUpdate>>, ClientError> {
        let resp = self.client.get(&self.endpoint).send().await?;
        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ClientError::service(status.as_u16(), body));
        }
        // Some deployments answer 200 with a bare "no update" body instead
        // of 204.
        let body = body.trim();
        if body.is_empty() || body.eq_ignore_ascii_case("no update") {
            return Ok(None);
        }

        let manifest: ReleaseManifest = serde_json::from_str(body)?;
        let info = UpdateInfo {
            version: manifest.version,
            date: manifest.pub_date,
            body: manifest.notes,
        };
        let target = self.download_dir.join(artifact_name(&manifest.url, &info.version));
        Ok(Some(Box::new(HttpPendingUpdate {
            client: self.client.clone(),
            url: manifest.url,
            target,
            info,
        })))
    }
}

struct HttpPendingUpdate {
    client: reqwest::Client,
    url: String,
    target: PathBuf,
    info: UpdateInfo,
}

#[async_trait]
impl PendingUpdate for HttpPendingUpdate {
    fn info(&self) -> &UpdateInfo {
        &self.info
    }

    /// Streams the artifact into the staging directory. Platform-specific
    /// installation is left to the installer the artifact ships as; the
    /// relauncher picks it up from there.
    async fn download_and_install(
        self: Box<Self>,
        on_event: &mut (dyn FnMut(DownloadEvent) + Send),
    ) -> Result<(), ClientError> {
        let resp = self.client.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::service(status.as_u16(), body));
        }

        let content_length = resp.content_length().unwrap_or(0);
        on_event(DownloadEvent::Started { content_length });

        if let Some(parent) = self.target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(&self.target).await?;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            on_event(DownloadEvent::Progress {
                chunk_length: chunk.len() as u64,
            });
        }
        file.flush().await?;
        on_event(DownloadEvent::Finished);

        tracing::info!(
            version = %self.info.version,
            path = %self.target.display(),
            "update artifact staged"
        );
        Ok(())
    }
}

fn artifact_name(url: &str, version: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("ballcam-{version}.bin"))
}
