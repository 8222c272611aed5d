//! Action dispatch for the Verdant engine.
//!
//! Builds outbound command messages from action records, publishes them
//! best-effort on the command channel, and tracks in-flight dispatches.

pub mod dispatcher;
pub mod error;

pub use dispatcher::{ActionDispatcher, DispatchRecord, DispatchResult, DispatchStatus};
pub use error::{DispatchError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
