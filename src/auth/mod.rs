//! Device authorization flow, identity endpoints, and session storage.

pub mod device_code;
pub mod device_flow;
pub mod identity;
pub mod session;

pub use device_code::{DeviceCode, PollOutcome, TokenBundle, User};
pub use device_flow::{DeviceFlowClient, FlowState, SlowDownPolicy};
pub use identity::IdentityClient;
pub use session::{FileSessionStore, Session, SessionStore};
