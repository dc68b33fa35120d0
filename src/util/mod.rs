//! Shared utilities.

pub mod poller;

pub use poller::{PollControl, Poller};
