use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::device_code::{DeviceCode, PollOutcome, TokenBundle, User};
use super::session::Session;
use crate::error::ClientError;

const DEFAULT_BASE_URL: &str = "https://ballcam.tv";
const DEFAULT_CLIENT_ID: &str = "ballcam-agent";

/// HTTP client for the BallCam Identity Service.
///
/// Covers the device authorization grant (`request_device_code` /
/// `poll_token`), password login, and device token refresh. All endpoints are
/// relative to `base_url`, overridable for tests.
///
/// # Example
/// ```no_run
/// use ballcam_client::auth::IdentityClient;
///
/// let identity = IdentityClient::new().with_device_name("BallCam Agent - CI");
/// ```
pub struct IdentityClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    device_name: String,
}

impl Default for IdentityClient {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            device_name: default_device_name(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_device_name(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = device_name.into();
        self
    }

    /// Mint a fresh device code to start a flow attempt.
    pub async fn request_device_code(&self) -> Result<DeviceCode, ClientError> {
        tracing::info!("requesting device code");
        let resp = self
            .client
            .post(format!("{}/api/auth/device/code", self.base_url))
            .json(&json!({
                "client_id": self.client_id,
                "device_name": self.device_name,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::service(status.as_u16(), body));
        }

        let code: DeviceCode = resp.json().await?;
        tracing::info!(user_code = %code.user_code, "device code received");
        Ok(code)
    }

    /// One poll of the token endpoint for the given device code.
    ///
    /// Non-terminal answers arrive as HTTP 400 with an RFC 8628 error code;
    /// approval arrives as a 2xx token bundle.
    pub async fn poll_token(&self, device_code: &str) -> Result<PollOutcome, ClientError> {
        let resp = self
            .client
            .post(format!("{}/api/auth/device/token", self.base_url))
            .json(&json!({
                "device_code": device_code,
                "client_id": self.client_id,
            }))
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::BAD_REQUEST {
            let payload: serde_json::Value = resp.json().await?;
            let code = payload
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown");
            return match code {
                "authorization_pending" => Ok(PollOutcome::Pending),
                "slow_down" => Ok(PollOutcome::SlowDown),
                "expired_token" => Ok(PollOutcome::Expired),
                "access_denied" => Ok(PollOutcome::Denied),
                other => Err(ClientError::MalformedResponse(format!(
                    "unknown device poll error: {other}"
                ))),
            };
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::service(status.as_u16(), body));
        }

        let bundle: TokenBundle = resp.json().await?;
        tracing::info!(username = %bundle.user.username, "device authorized");
        Ok(PollOutcome::Success(Box::new(bundle)))
    }

    /// Password login. Tokens arrive as `access_token` / `refresh_token`
    /// Set-Cookie headers; the body carries the user.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        tracing::info!(%email, "attempting login");
        let resp = self
            .client
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                400 => ClientError::service(400, "Invalid email or password format"),
                401 => ClientError::service(401, "Invalid email or password"),
                other => ClientError::service(other, body),
            });
        }

        let mut access_token = String::new();
        let mut refresh_token = String::new();
        for value in resp.headers().get_all(reqwest::header::SET_COOKIE) {
            let Ok(cookie) = value.to_str() else { continue };
            if let Some(token) = cookie_value(cookie, "access_token") {
                access_token = token;
            } else if let Some(token) = cookie_value(cookie, "refresh_token") {
                refresh_token = token;
            }
        }
        if access_token.is_empty() || refresh_token.is_empty() {
            return Err(ClientError::MalformedResponse(
                "login response missing token cookies".to_string(),
            ));
        }

        let body: serde_json::Value = resp.json().await?;
        let user_value = body.get("user").cloned().ok_or_else(|| {
            ClientError::MalformedResponse("login response missing user".to_string())
        })?;
        let user: User = serde_json::from_value(user_value)?;

        let now = Utc::now();
        let session = Session {
            access_token,
            refresh_token: Some(refresh_token),
            access_token_expiry: now + Duration::minutes(30),
            refresh_token_expiry: Some(now + Duration::days(7)),
            user,
            device_id: None,
        };
        tracing::info!(username = %session.user.username, "login successful");
        Ok(session)
    }

    /// Refresh a device-flow access token. A 401 means the device was
    /// revoked; the caller should clear the stored session and re-authorize.
    pub async fn refresh_device_token(&self, session: &Session) -> Result<Session, ClientError> {
        let device_id = session.device_id.as_deref().ok_or_else(|| {
            ClientError::InvalidState("session has no device id".to_string())
        })?;

        let resp = self
            .client
            .post(format!("{}/api/auth/device/refresh", self.base_url))
            .json(&json!({
                "access_token": session.access_token,
                "device_id": device_id,
            }))
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::service(
                401,
                "Device has been revoked. Please re-authorize.",
            ));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::service(status.as_u16(), body));
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RefreshResponse {
            access_token: String,
            expires_in: u64,
        }

        let refreshed: RefreshResponse = resp.json().await?;
        let mut updated = session.clone();
        updated.access_token = refreshed.access_token;
        updated.access_token_expiry = Utc::now() + Duration::seconds(refreshed.expires_in as i64);
        tracing::info!("device token refreshed");
        Ok(updated)
    }
}

fn default_device_name() -> String {
    let os = match std::env::consts::OS {
        "windows" => "Windows",
        "macos" => "macOS",
        "linux" => "Linux",
        other => other,
    };
    format!("BallCam Agent - {os}")
}

fn cookie_value(cookie: &str, name: &str) -> Option<String> {
    let rest = cookie.strip_prefix(name)?.strip_prefix('=')?;
    Some(rest.split(';').next().unwrap_or(rest).to_string())
}
