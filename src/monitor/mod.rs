//! Health history and auto-refresh scheduling.

pub mod history;
pub mod scheduler;

pub use history::{HISTORY_CAPACITY, HealthHistory, HealthProbeResult, HealthSlot, ProbeOutcome};
pub use scheduler::{PollError, PollHandle, PollState, PollingScheduler, ResourceKind};
