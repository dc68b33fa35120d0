//! BallCam client — device authorization and update flows.
//!
//! Client-side implementation of the BallCam device authorization grant
//! (RFC 8628-style device-code login) and the background update checker the
//! desktop agent runs. UI rendering, the server side of the grant, and
//! credential security belong to collaborators: a [`auth::SessionStore`]
//! persists tokens, the remote Identity Service answers the HTTP endpoints,
//! and a [`sink::UiSink`] renders state to a human.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ballcam_client::auth::{DeviceFlowClient, FileSessionStore, IdentityClient};
//! use ballcam_client::sink::LogSink;
//!
//! # async fn example() -> ballcam_client::error::Result<()> {
//! let mut flow = DeviceFlowClient::new(
//!     Arc::new(IdentityClient::new()),
//!     Arc::new(FileSessionStore::new_default()),
//!     Arc::new(LogSink),
//! );
//! let code = flow.start().await?;
//! println!("enter {} at {}", code.user_code, code.verification_url);
//! flow.begin_polling(code)?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod error;
pub mod sink;
pub mod updater;
pub mod util;
