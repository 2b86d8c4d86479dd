//! Wire types for `POST /api/v1/strategies` and the validation notices
//! produced while building them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::StrategyId;

/// Execution budget used when the form's value is not a positive integer.
pub const DEFAULT_EXECUTION_TIME_NS: u64 = 20_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorPayload {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyPayload {
    pub priority: bool,
    pub execution_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_regex: Option<String>,
    pub selectors: Vec<SelectorPayload>,
}

/// Request body: `{ "strategies": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitPayload {
    pub strategies: Vec<StrategyPayload>,
}

/// Input problems found during serialization. Each one was recovered
/// locally; the notice tells the operator what was sent instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(
        "strategy {strategy}: execution time '{input}' is not a positive integer, using {default}",
        default = DEFAULT_EXECUTION_TIME_NS
    )]
    ExecutionTime { strategy: StrategyId, input: String },
    #[error("strategy {strategy}: PID '{input}' is not a valid process id, omitted")]
    Pid { strategy: StrategyId, input: String },
    #[error("strategy {strategy}: command regex '{input}' does not compile ({reason}), sent as-is")]
    CommandRegex {
        strategy: StrategyId,
        input: String,
        reason: String,
    },
}

/// Result of projecting the form onto the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedForm {
    pub payload: SubmitPayload,
    pub substitutions: Vec<ValidationError>,
}

impl SerializedForm {
    pub fn is_clean(&self) -> bool {
        self.substitutions.is_empty()
    }
}
