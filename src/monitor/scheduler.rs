//! Auto-refresh scheduling for the health and metrics probes.
//!
//! The scheduler is a cooperative timer table, not a thread: it owns at most
//! one [`PollHandle`] per [`ResourceKind`] and answers "which probes are due
//! at `now`?". The dashboard's run loop performs the probes and sleeps until
//! [`PollingScheduler::next_wakeup`]. Passing `now` in keeps every transition
//! deterministic under test.
//!
//! Probes are not serialized against each other: a slow probe may still be
//! running when the next one falls due. Results are appended to history in
//! completion order, which is safe because appends do not depend on prior
//! state.

use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::schema::MIN_POLL_INTERVAL_MS;

/// A polled resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// `/health` on the primary service. Public.
    Health,
    /// Runtime metrics on the decision service. Requires a session.
    Metrics,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Health, ResourceKind::Metrics];

    pub fn requires_auth(self) -> bool {
        matches!(self, Self::Metrics)
    }

    fn index(self) -> usize {
        match self {
            Self::Health => 0,
            Self::Metrics => 1,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Health => write!(f, "health"),
            Self::Metrics => write!(f, "metrics"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("Interval must be at least 1 second (got {requested_ms} ms)")]
    IntervalTooShort { requested_ms: u64 },
    #[error("Authentication required for {0} auto-refresh")]
    AuthRequired(ResourceKind),
}

/// Externally visible state of one resource's auto-refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Active { interval_ms: u64 },
}

impl PollState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// A live recurring timer. Dropping it from the table cancels it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollHandle {
    pub kind: ResourceKind,
    pub interval_ms: u64,
    /// Distinguishes a replacement handle from the one it replaced.
    pub generation: u64,
    next_due: Instant,
}

impl PollHandle {
    fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Default)]
pub struct PollingScheduler {
    handles: [Option<PollHandle>; 2],
    authenticated: bool,
    next_generation: u64,
}

impl PollingScheduler {
    /// `authenticated` is the session status at construction time; later
    /// changes arrive through [`apply_session`](Self::apply_session).
    pub fn new(authenticated: bool) -> Self {
        Self {
            handles: [None, None],
            authenticated,
            next_generation: 0,
        }
    }

    /// Begin auto-refresh for `kind`.
    ///
    /// Replaces any active handle for the same kind. The first probe is due
    /// immediately, later ones every `interval_ms`.
    pub fn start(
        &mut self,
        kind: ResourceKind,
        interval_ms: u64,
        now: Instant,
    ) -> Result<&PollHandle, PollError> {
        if interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(PollError::IntervalTooShort {
                requested_ms: interval_ms,
            });
        }
        if kind.requires_auth() && !self.authenticated {
            return Err(PollError::AuthRequired(kind));
        }

        self.stop(kind);
        self.next_generation += 1;
        let slot = &mut self.handles[kind.index()];
        Ok(slot.insert(PollHandle {
            kind,
            interval_ms,
            generation: self.next_generation,
            next_due: now,
        }))
    }

    /// Cancel auto-refresh for `kind`. Returns whether a handle was active.
    pub fn stop(&mut self, kind: ResourceKind) -> bool {
        self.handles[kind.index()].take().is_some()
    }

    /// Stop if active, otherwise start. Returns the resulting state.
    pub fn toggle(
        &mut self,
        kind: ResourceKind,
        interval_ms: u64,
        now: Instant,
    ) -> Result<PollState, PollError> {
        if self.stop(kind) {
            return Ok(PollState::Idle);
        }
        let handle = self.start(kind, interval_ms, now)?;
        Ok(PollState::Active {
            interval_ms: handle.interval_ms,
        })
    }

    /// Record the session status. Losing authentication cancels every
    /// privileged poll; the cancelled kinds are returned so the caller can
    /// reset the matching controls.
    pub fn apply_session(&mut self, authenticated: bool) -> Vec<ResourceKind> {
        self.authenticated = authenticated;
        if authenticated {
            return Vec::new();
        }
        ResourceKind::ALL
            .into_iter()
            .filter(|kind| kind.requires_auth() && self.stop(*kind))
            .collect()
    }

    pub fn state(&self, kind: ResourceKind) -> PollState {
        match &self.handles[kind.index()] {
            Some(handle) => PollState::Active {
                interval_ms: handle.interval_ms,
            },
            None => PollState::Idle,
        }
    }

    pub fn handle(&self, kind: ResourceKind) -> Option<&PollHandle> {
        self.handles[kind.index()].as_ref()
    }

    pub fn any_active(&self) -> bool {
        self.handles.iter().any(Option::is_some)
    }

    /// Kinds whose probe is due at `now`, in [`ResourceKind::ALL`] order.
    ///
    /// Each returned handle is rescheduled one interval ahead. A loop that
    /// woke late fires once rather than replaying every missed tick.
    pub fn due(&mut self, now: Instant) -> Vec<ResourceKind> {
        let mut fired = Vec::new();
        for handle in self.handles.iter_mut().flatten() {
            if handle.next_due > now {
                continue;
            }
            let next = handle.next_due + handle.interval();
            handle.next_due = if next > now {
                next
            } else {
                now + handle.interval()
            };
            fired.push(handle.kind);
        }
        fired
    }

    /// Earliest pending probe time across all active handles.
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.handles.iter().flatten().map(|h| h.next_due).min()
    }
}
