//! Identifier, timestamp and URL helpers.

pub mod urls;

use chrono::Utc;
use uuid::Uuid;

pub use urls::{domain_of, normalize_url, strip_scheme};

/// Returns the current UTC time as an RFC3339 string with microseconds.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Generates an identifier for one check.
#[must_use]
pub fn generate_check_id() -> Uuid {
    Uuid::new_v4()
}
