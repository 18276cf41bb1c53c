//! ---
//! rda_section: "01-core-functionality"
//! rda_subsection: "module"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Shared primitives and utilities for the dashboard access runtime."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Capture the current wall-clock time.
pub fn wall_now() -> DateTime<Utc> {
    Utc::now()
}

/// Number of whole half-lifetimes elapsed since the epoch at `at`.
///
/// Tokens are bound to a tick, so a token stays valid for between one half and
/// one full lifetime depending on where in the tick it was issued.
pub fn half_life_tick(at: DateTime<Utc>, lifetime: Duration) -> u64 {
    let half = (lifetime.as_secs() / 2).max(1);
    let seconds = u64::try_from(at.timestamp()).unwrap_or(0);
    seconds / half
}
