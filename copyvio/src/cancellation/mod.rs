//! Cooperative cancellation for checks.
//!
//! The scheduler's deadline timer and external callers (for example a bot
//! shutting down) both stop a check through a [`CancellationToken`].

mod token;

pub use token::{CancelCallback, CancellationToken};
