/// Dashboard controller.
///
/// [`Dashboard`] is the single root context of the client. It owns the
/// session, the HTTP client, the health history, the polling scheduler, the
/// strategy form and the activity log, and exposes every operator action as a
/// method returning an [`ActionResult`]. Nothing an action does escapes to the
/// process as an error: transport failures, business failures and local
/// validation problems all come back as a result the presentation layer can
/// show.
///
/// Session changes are forwarded to the scheduler after every login and
/// logout, so privileged polling never outlives the session that allowed it.
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::Value;

use crate::activity::{ActivityLog, Outcome};
use crate::api::envelope::{self, MetricsReport};
use crate::api::{
    ApiClient, ApiError, HEALTH_PATH, METRICS_PATH, OWN_STRATEGIES_PATH, POD_PIDS_PATH,
    RequestOptions, Service,
};
use crate::config::schema::DashConfig;
use crate::monitor::{
    HealthHistory, HealthProbeResult, PollError, PollState, PollingScheduler, ResourceKind,
};
use crate::session::storage::{FileTokenStore, TokenStore};
use crate::session::{Credentials, SessionStore, SessionTransition};
use crate::strategy::{StrategyForm, SubmitOutcome, ValidationError};

pub mod editor;
pub mod render;

// ---------------------------------------------------------------------------
// Action results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Success,
    Error,
    Info,
}

impl From<ResultKind> for Outcome {
    fn from(kind: ResultKind) -> Self {
        match kind {
            ResultKind::Success => Outcome::Success,
            ResultKind::Error => Outcome::Error,
            ResultKind::Info => Outcome::Info,
        }
    }
}

/// What an action produced, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub kind: ResultKind,
    pub message: String,
    /// Labelled values shown under the message (metrics, notices).
    pub details: Vec<(String, String)>,
    /// Response body for actions that fetch something.
    pub data: Option<Value>,
}

impl ActionResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ResultKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ResultKind::Error, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ResultKind::Info, message)
    }

    fn new(kind: ResultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Vec::new(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_detail(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((label.into(), value.into()));
        self
    }

    pub fn is_error(&self) -> bool {
        self.kind == ResultKind::Error
    }
}

/// Map an API error onto the operator-facing result.
fn api_failure(error: ApiError) -> ActionResult {
    match error {
        ApiError::AuthRequired => ActionResult::error(error.to_string()),
        other => ActionResult::error(format!("Request failed: {other}")),
    }
}

fn with_notices(mut result: ActionResult, notices: &[ValidationError]) -> ActionResult {
    if !notices.is_empty() {
        result.message = format!(
            "{} ({} value(s) substituted)",
            result.message,
            notices.len()
        );
        for notice in notices {
            result = result.with_detail("Notice", notice.to_string());
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Root context
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Dashboard {
    config: DashConfig,
    session: SessionStore,
    client: ApiClient,
    history: HealthHistory,
    scheduler: PollingScheduler,
    form: StrategyForm,
    activity: ActivityLog,
}

impl Dashboard {
    /// Assemble the dashboard from explicit parts.
    pub fn new(
        config: DashConfig,
        storage: Box<dyn TokenStore>,
        activity: ActivityLog,
    ) -> Result<Self, ApiError> {
        let client = ApiClient::from_config(&config.service)?;
        let session = SessionStore::initialize(storage);
        let scheduler = PollingScheduler::new(session.is_authenticated());
        Ok(Self {
            config,
            session,
            client,
            history: HealthHistory::new(),
            scheduler,
            form: StrategyForm::new(),
            activity,
        })
    }

    /// Assemble the dashboard with file-backed token storage and the
    /// configured activity log.
    pub fn from_config(config: DashConfig) -> Result<Self> {
        let token_path = config
            .session
            .resolved_token_path()
            .context("could not determine home directory for the token file")?;
        let activity = ActivityLog::from_config(&config.logging);
        Self::new(config, Box::new(FileTokenStore::new(token_path)), activity)
            .context("invalid service configuration")
    }

    pub fn config(&self) -> &DashConfig {
        &self.config
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn history(&self) -> &HealthHistory {
        &self.history
    }

    pub fn scheduler(&self) -> &PollingScheduler {
        &self.scheduler
    }

    pub fn form(&self) -> &StrategyForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut StrategyForm {
        &mut self.form
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Default auto-refresh interval for `kind`, from config.
    pub fn default_interval_ms(&self, kind: ResourceKind) -> u64 {
        match kind {
            ResourceKind::Health => self.config.polling.health_interval_ms,
            ResourceKind::Metrics => self.config.polling.metrics_interval_ms,
        }
    }

    fn finish(&self, action: &str, result: ActionResult) -> ActionResult {
        self.activity
            .record(action, result.kind.into(), &result.message);
        result
    }

    fn apply_transition(&mut self, transition: SessionTransition) -> Vec<ResourceKind> {
        match transition {
            SessionTransition::Unchanged => Vec::new(),
            _ => self.scheduler.apply_session(self.session.is_authenticated()),
        }
    }

    // -- Session --

    pub fn login(&mut self, credentials: &Credentials) -> ActionResult {
        let result = match self.session.login(&self.client, credentials) {
            Ok(outcome) => {
                self.apply_transition(outcome.transition);
                ActionResult::success(outcome.message)
            }
            Err(e) => ActionResult::error(e.to_string()),
        };
        self.finish("login", result)
    }

    pub fn logout(&mut self) -> ActionResult {
        let outcome = self.session.logout();
        let stopped = self.apply_transition(outcome.transition);
        let mut result = match outcome.storage_error {
            None => ActionResult::success("Authentication token cleared"),
            Some(e) => ActionResult::error(format!(
                "Logged out of this session, but the saved token could not be removed: {e}"
            )),
        };
        for kind in stopped {
            result = result.with_detail("Stopped", format!("{kind} auto-refresh"));
        }
        self.finish("logout", result)
    }

    // -- Probes and fetches --

    /// Probe `/health` and record the outcome in the history.
    pub fn check_health(&mut self) -> ActionResult {
        let result = match self.client.get(
            HEALTH_PATH,
            RequestOptions::public(Service::Primary),
            None,
        ) {
            Ok(response) => {
                let healthy = envelope::is_healthy(&response);
                self.history
                    .record(HealthProbeResult::responded(healthy, response.body.clone()));
                let result = if healthy {
                    ActionResult::success("Service is healthy")
                } else {
                    ActionResult::error(format!("Service is unhealthy (HTTP {})", response.status))
                };
                result.with_data(response.body)
            }
            Err(e) => {
                let message = e.to_string();
                self.history.record(HealthProbeResult::failed(&message));
                ActionResult::error(format!("Request failed: {message}"))
            }
        };
        self.finish("check_health", result)
    }

    pub fn fetch_metrics(&mut self) -> ActionResult {
        let result = match self.client.get(
            METRICS_PATH,
            RequestOptions::authenticated(Service::Secondary),
            self.session.token(),
        ) {
            Ok(response) => match envelope::metrics_report(&response) {
                MetricsReport::Available { timestamp, metrics } => {
                    let mut result = ActionResult::success("Metrics updated").with_detail(
                        "Last Update",
                        timestamp.unwrap_or_else(|| "-".to_string()),
                    );
                    for (label, value) in metrics.labelled() {
                        result = result.with_detail(label, value.to_string());
                    }
                    result
                }
                MetricsReport::Pending(message) => ActionResult::info(message),
                MetricsReport::Failed(reason) => ActionResult::error(format!("Failed: {reason}")),
            },
            Err(e) => api_failure(e),
        };
        self.finish("fetch_metrics", result)
    }

    pub fn fetch_pod_pids(&mut self) -> ActionResult {
        let result = self.fetch_json(POD_PIDS_PATH, Service::Secondary, "Pod PIDs retrieved");
        self.finish("fetch_pod_pids", result)
    }

    pub fn fetch_strategies(&mut self) -> ActionResult {
        let result = self.fetch_json(
            OWN_STRATEGIES_PATH,
            Service::Primary,
            "Strategies retrieved",
        );
        self.finish("fetch_strategies", result)
    }

    fn fetch_json(&self, path: &str, target: Service, success: &str) -> ActionResult {
        match self.client.get(
            path,
            RequestOptions::authenticated(target),
            self.session.token(),
        ) {
            Ok(response) if response.succeeded() => {
                ActionResult::success(success).with_data(response.body)
            }
            Ok(response) => ActionResult::error(format!(
                "Failed: {}",
                envelope::failure_reason(&response.body, "Unknown error")
            )),
            Err(e) => api_failure(e),
        }
    }

    // -- Strategies --

    pub fn submit_strategies(&mut self) -> ActionResult {
        let result = match self.form.submit(&self.client, self.session.token()) {
            Ok(SubmitOutcome::NothingToSave) => ActionResult::info("No strategies to save"),
            Ok(SubmitOutcome::Saved {
                count,
                response,
                substitutions,
            }) => with_notices(
                ActionResult::success(format!("Successfully saved {count} strategies"))
                    .with_data(response),
                &substitutions,
            ),
            Ok(SubmitOutcome::Rejected {
                reason,
                substitutions,
            }) => with_notices(
                ActionResult::error(format!("Save failed: {reason}")),
                &substitutions,
            ),
            Err(e) => api_failure(e),
        };
        self.finish("submit_strategies", result)
    }

    pub fn clear_strategies(&mut self) -> ActionResult {
        self.form.clear_all();
        self.finish("clear_strategies", ActionResult::info("All strategies cleared"))
    }

    // -- Auto-refresh --

    pub fn start_auto_refresh(
        &mut self,
        kind: ResourceKind,
        interval_ms: u64,
        now: Instant,
    ) -> ActionResult {
        let result = match self.scheduler.start(kind, interval_ms, now) {
            Ok(handle) => ActionResult::info(format!(
                "Auto-refresh for {kind} every {}s",
                handle.interval_ms / 1000
            )),
            Err(e) => poll_failure(e),
        };
        self.finish("start_auto_refresh", result)
    }

    pub fn stop_auto_refresh(&mut self, kind: ResourceKind) -> ActionResult {
        let result = if self.scheduler.stop(kind) {
            ActionResult::info(format!("Auto-refresh for {kind} stopped"))
        } else {
            ActionResult::info(format!("Auto-refresh for {kind} was not running"))
        };
        self.finish("stop_auto_refresh", result)
    }

    pub fn toggle_auto_refresh(
        &mut self,
        kind: ResourceKind,
        interval_ms: u64,
        now: Instant,
    ) -> ActionResult {
        let result = match self.scheduler.toggle(kind, interval_ms, now) {
            Ok(PollState::Active { interval_ms }) => ActionResult::info(format!(
                "Auto-refresh for {kind} every {}s",
                interval_ms / 1000
            )),
            Ok(PollState::Idle) => ActionResult::info(format!("Auto-refresh for {kind} stopped")),
            Err(e) => poll_failure(e),
        };
        self.finish("toggle_auto_refresh", result)
    }

    /// Perform every probe due at `now`, in [`ResourceKind::ALL`] order.
    pub fn run_due_probes(&mut self, now: Instant) -> Vec<(ResourceKind, ActionResult)> {
        self.scheduler
            .due(now)
            .into_iter()
            .map(|kind| {
                let result = match kind {
                    ResourceKind::Health => self.check_health(),
                    ResourceKind::Metrics => self.fetch_metrics(),
                };
                (kind, result)
            })
            .collect()
    }

    /// Poll the requested kinds until no handle remains or `rounds` probe
    /// rounds have run. `report` sees every start failure and probe result.
    pub fn watch(
        &mut self,
        requests: &[(ResourceKind, u64)],
        rounds: Option<usize>,
        mut report: impl FnMut(&Dashboard, Option<ResourceKind>, &ActionResult),
    ) {
        let started = Instant::now();
        for &(kind, interval_ms) in requests {
            let result = self.start_auto_refresh(kind, interval_ms, started);
            if result.is_error() {
                report(self, Some(kind), &result);
            }
        }

        let mut completed = 0;
        while self.scheduler.any_active() {
            let fired = self.run_due_probes(Instant::now());
            if !fired.is_empty() {
                completed += 1;
                for (kind, result) in &fired {
                    report(self, Some(*kind), result);
                }
            }

            if let Some(limit) = rounds
                && completed >= limit
            {
                break;
            }

            match self.scheduler.next_wakeup() {
                Some(wakeup) => {
                    let wait = wakeup.saturating_duration_since(Instant::now());
                    if !wait.is_zero() {
                        thread::sleep(wait.min(Duration::from_secs(60)));
                    }
                }
                None => break,
            }
        }

        for kind in ResourceKind::ALL {
            self.scheduler.stop(kind);
        }
    }
}

fn poll_failure(error: PollError) -> ActionResult {
    match error {
        PollError::IntervalTooShort { .. } => {
            ActionResult::error("Interval must be at least 1 second")
        }
        PollError::AuthRequired(_) => ActionResult::error(error.to_string()),
    }
}
