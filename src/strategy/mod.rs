/// Strategy form model.
///
/// An editable, ordered collection of scheduling strategies, each with its
/// own list of label selectors. Records are addressed by a small integer
/// [`StrategyId`] handed out from a monotonic counter, so a presentation
/// layer can render a snapshot and send id-qualified commands back without
/// the model ever looking at presentation state.
///
/// Two structural invariants hold after every operation:
///
/// - the collection holds at least one strategy, and
/// - every strategy holds at least one selector (possibly blank).
///
/// Field values are kept exactly as typed. Parsing happens in
/// [`StrategyForm::serialize`], which recovers from bad input by substituting
/// documented defaults and reporting each substitution.
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::api::envelope::failure_reason;
use crate::api::{ApiClient, ApiError, RequestOptions, STRATEGIES_PATH, Service};

pub mod payload;

pub use payload::{
    DEFAULT_EXECUTION_TIME_NS, SelectorPayload, SerializedForm, StrategyPayload, SubmitPayload,
    ValidationError,
};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Stable identifier of a strategy within one form session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrategyId(u32);

impl StrategyId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StrategyId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().trim_start_matches('#').parse().map(Self)
    }
}

/// A key/value label constraint as typed into the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub key: String,
    pub value: String,
}

impl Selector {
    /// Trimmed pair, if both halves are filled in.
    fn to_payload(&self) -> Option<SelectorPayload> {
        let key = self.key.trim();
        let value = self.value.trim();
        (!key.is_empty() && !value.is_empty()).then(|| SelectorPayload {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// One strategy as it sits in the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyRecord {
    id: StrategyId,
    pub priority: bool,
    /// Execution budget in nanoseconds, as typed.
    pub execution_time: String,
    /// Target process id, as typed. Empty means "any".
    pub pid: String,
    /// Command-line pattern, as typed. Empty means "any".
    pub command_regex: String,
    selectors: Vec<Selector>,
}

impl StrategyRecord {
    fn new(id: StrategyId) -> Self {
        Self {
            id,
            priority: false,
            execution_time: DEFAULT_EXECUTION_TIME_NS.to_string(),
            pid: String::new(),
            command_regex: String::new(),
            selectors: vec![Selector::default()],
        }
    }

    pub fn id(&self) -> StrategyId {
        self.id
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    fn to_payload(&self, notices: &mut Vec<ValidationError>) -> StrategyPayload {
        let execution_time = match self.execution_time.trim().parse::<u64>() {
            Ok(ns) if ns > 0 => ns,
            _ => {
                notices.push(ValidationError::ExecutionTime {
                    strategy: self.id,
                    input: self.execution_time.clone(),
                });
                DEFAULT_EXECUTION_TIME_NS
            }
        };

        let pid = match self.pid.trim() {
            "" => None,
            raw => match raw.parse::<u32>() {
                Ok(pid) if pid > 0 => Some(pid),
                _ => {
                    notices.push(ValidationError::Pid {
                        strategy: self.id,
                        input: self.pid.clone(),
                    });
                    None
                }
            },
        };

        let command_regex = (!self.command_regex.is_empty()).then(|| {
            if let Err(e) = Regex::new(&self.command_regex) {
                notices.push(ValidationError::CommandRegex {
                    strategy: self.id,
                    input: self.command_regex.clone(),
                    reason: e.to_string(),
                });
            }
            self.command_regex.clone()
        });

        StrategyPayload {
            priority: self.priority,
            execution_time,
            pid,
            command_regex,
            selectors: self
                .selectors
                .iter()
                .filter_map(Selector::to_payload)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("no strategy #{0}")]
    UnknownStrategy(StrategyId),
    #[error("strategy #{strategy} has no selector {index}")]
    UnknownSelector { strategy: StrategyId, index: usize },
}

// ---------------------------------------------------------------------------
// Submission outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Nothing to send; the network was not touched.
    NothingToSave,
    Saved {
        count: usize,
        response: Value,
        substitutions: Vec<ValidationError>,
    },
    Rejected {
        reason: String,
        substitutions: Vec<ValidationError>,
    },
}

// ---------------------------------------------------------------------------
// Form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StrategyForm {
    strategies: Vec<StrategyRecord>,
    counter: u32,
}

impl Default for StrategyForm {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyForm {
    /// A form holding one default strategy (id 1).
    pub fn new() -> Self {
        let mut form = Self {
            strategies: Vec::new(),
            counter: 0,
        };
        form.add_strategy();
        form
    }

    pub fn strategies(&self) -> &[StrategyRecord] {
        &self.strategies
    }

    pub fn get(&self, id: StrategyId) -> Option<&StrategyRecord> {
        self.strategies.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: StrategyId) -> Result<&mut StrategyRecord, FormError> {
        self.strategies
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(FormError::UnknownStrategy(id))
    }

    // -- Structure --

    /// Append a default strategy and return its id.
    pub fn add_strategy(&mut self) -> StrategyId {
        self.counter += 1;
        let id = StrategyId(self.counter);
        self.strategies.push(StrategyRecord::new(id));
        id
    }

    /// Remove a strategy. Unknown ids are ignored. If the form empties, a
    /// fresh default strategy takes its place.
    pub fn remove_strategy(&mut self, id: StrategyId) -> bool {
        let before = self.strategies.len();
        self.strategies.retain(|s| s.id != id);
        let removed = self.strategies.len() != before;
        if self.strategies.is_empty() {
            self.add_strategy();
        }
        removed
    }

    /// Drop everything and restart numbering with a single default strategy.
    pub fn clear_all(&mut self) {
        self.strategies.clear();
        self.counter = 0;
        self.add_strategy();
    }

    /// Append a blank selector; returns its index.
    pub fn add_selector(&mut self, id: StrategyId) -> Result<usize, FormError> {
        let record = self.get_mut(id)?;
        record.selectors.push(Selector::default());
        Ok(record.selectors.len() - 1)
    }

    /// Remove a selector. Removing the last one leaves a blank selector.
    pub fn remove_selector(&mut self, id: StrategyId, index: usize) -> Result<(), FormError> {
        let record = self.get_mut(id)?;
        if index >= record.selectors.len() {
            return Err(FormError::UnknownSelector {
                strategy: id,
                index,
            });
        }
        record.selectors.remove(index);
        if record.selectors.is_empty() {
            record.selectors.push(Selector::default());
        }
        Ok(())
    }

    // -- Fields --

    pub fn set_priority(&mut self, id: StrategyId, priority: bool) -> Result<(), FormError> {
        self.get_mut(id)?.priority = priority;
        Ok(())
    }

    pub fn set_execution_time(&mut self, id: StrategyId, raw: &str) -> Result<(), FormError> {
        self.get_mut(id)?.execution_time = raw.to_string();
        Ok(())
    }

    pub fn set_pid(&mut self, id: StrategyId, raw: &str) -> Result<(), FormError> {
        self.get_mut(id)?.pid = raw.to_string();
        Ok(())
    }

    pub fn set_command_regex(&mut self, id: StrategyId, raw: &str) -> Result<(), FormError> {
        self.get_mut(id)?.command_regex = raw.to_string();
        Ok(())
    }

    pub fn set_selector(
        &mut self,
        id: StrategyId,
        index: usize,
        key: &str,
        value: &str,
    ) -> Result<(), FormError> {
        let selector = self
            .get_mut(id)?
            .selectors
            .get_mut(index)
            .ok_or(FormError::UnknownSelector {
                strategy: id,
                index,
            })?;
        selector.key = key.to_string();
        selector.value = value.to_string();
        Ok(())
    }

    // -- Serialization --

    /// Project the form onto the request body.
    ///
    /// Ids are dropped; `pid` and `command_regex` appear only when filled in;
    /// selectors only when both key and value are non-blank. Bad input is
    /// replaced (execution time) or omitted (pid) and reported in
    /// `substitutions`. Never mutates the form.
    pub fn serialize(&self) -> SerializedForm {
        let mut substitutions = Vec::new();
        let strategies = self
            .strategies
            .iter()
            .map(|s| s.to_payload(&mut substitutions))
            .collect();
        SerializedForm {
            payload: SubmitPayload { strategies },
            substitutions,
        }
    }

    /// Serialize and `POST` the form to the strategies endpoint.
    pub fn submit(
        &self,
        client: &ApiClient,
        token: Option<&str>,
    ) -> Result<SubmitOutcome, ApiError> {
        let SerializedForm {
            payload,
            substitutions,
        } = self.serialize();

        if payload.strategies.is_empty() {
            return Ok(SubmitOutcome::NothingToSave);
        }

        let response = client.post(
            STRATEGIES_PATH,
            &payload,
            RequestOptions::authenticated(Service::Primary),
            token,
        )?;

        if response.succeeded() {
            Ok(SubmitOutcome::Saved {
                count: payload.strategies.len(),
                response: response.body,
                substitutions,
            })
        } else {
            Ok(SubmitOutcome::Rejected {
                reason: failure_reason(&response.body, "Unknown error"),
                substitutions,
            })
        }
    }
}
