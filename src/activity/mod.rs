/// Operator activity log.
///
/// Every dashboard action appends one JSONL entry describing what was done
/// and how it ended. The log is tooling for the operator, not session state:
/// it never holds tokens, passwords or key material, and failing to write it
/// never fails the action.
pub mod logger;

pub use logger::{ActivityEntry, ActivityLog, Outcome};
