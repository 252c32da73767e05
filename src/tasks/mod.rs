//! Background Tasks Module
//!
//! Recurring work that runs for the lifetime of the service.
//!
//! # Tasks
//! - Heartbeat: Refreshes the liveness record before it expires
//! - Drain: Moves queued records from the cache into Postgres in batches

mod drain;
mod heartbeat;
mod ticker;

use std::time::Duration;

pub use drain::{DrainCycle, DrainOutcome, DrainScheduler};
pub use heartbeat::Heartbeat;
pub use ticker::Ticker;

/// Time an in-flight tick gets to finish when its task is stopped.
pub const STOP_GRACE: Duration = Duration::from_secs(10);
