use serde::{Deserialize, Serialize};

/// BallCam account information, as returned by the Identity Service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub email_verified: bool,
    pub avatar_url: Option<String>,
}

/// Device authorization details minted by `POST /api/auth/device/code`.
///
/// One per flow attempt. `device_code` is opaque and single-use; `user_code`
/// is the short human-readable code the user types on the verification page.
/// Field names are snake_case on the wire, per RFC 8628.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_url: String,
    /// Seconds until the service considers the code expired.
    pub expires_in: u64,
    /// Seconds to wait between polls.
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_interval() -> u64 {
    5
}

/// Token payload delivered when the user approves the device.
///
/// Ownership moves to the session store on the success transition; the flow
/// client does not retain it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub device_id: String,
    pub user: User,
}

/// Outcome of a single `POST /api/auth/device/token` poll.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// User has not decided yet; keep polling.
    Pending,
    /// Service asked us to poll less often.
    SlowDown,
    /// User approved; token is ready.
    Success(Box<TokenBundle>),
    /// The device code expired before the user approved.
    Expired,
    /// The user rejected the request.
    Denied,
}
