/// HTTP client for the scheduling service.
///
/// The service is split across two co-located processes:
///
/// - **Primary**: the manager API (login, strategies, `/health`), served from
///   the configured origin.
/// - **Secondary**: the decision service (public-key tokens, metrics,
///   pod/PID mappings). It listens on the same host; when the origin uses the
///   well-known dashboard port the decision port is substituted, otherwise the
///   origin's own port is reused.
///
/// Uses the synchronous `ureq` client. Calls never retry, and any response
/// with a JSON body is handed back to the caller regardless of status: the
/// backend reports business failures inside 2xx bodies as often as through
/// status codes, so callers judge success from both.
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::config::schema::ServiceConfig;

pub mod envelope;
pub mod error;

pub use error::ApiError;

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

pub const LOGIN_PATH: &str = "/api/v1/auth/login";
pub const TOKEN_PATH: &str = "/api/v1/auth/token";
pub const HEALTH_PATH: &str = "/health";
pub const POD_PIDS_PATH: &str = "/api/v1/pods/pids";
pub const OWN_STRATEGIES_PATH: &str = "/api/v1/strategies/self";
pub const STRATEGIES_PATH: &str = "/api/v1/strategies";
pub const METRICS_PATH: &str = "/api/v1/metrics";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Which of the two co-located services a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Primary,
    Secondary,
}

/// Per-request routing and authentication options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    pub authenticated: bool,
    pub target: Service,
}

impl RequestOptions {
    pub const fn public(target: Service) -> Self {
        Self {
            authenticated: false,
            target,
        }
    }

    pub const fn authenticated(target: Service) -> Self {
        Self {
            authenticated: true,
            target,
        }
    }
}

/// A response whose body parsed as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Whether the HTTP status was 2xx.
    pub ok: bool,
    pub body: Value,
}

impl ApiResponse {
    /// HTTP success and `success: true` in the body.
    pub fn succeeded(&self) -> bool {
        self.ok && envelope::reports_success(&self.body)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ApiClient {
    primary: String,
    secondary: String,
    agent: ureq::Agent,
}

impl ApiClient {
    /// Build a client from the resolved service config.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ApiError> {
        let origin = Url::parse(config.origin.trim()).map_err(|source| ApiError::InvalidOrigin {
            origin: config.origin.clone(),
            source,
        })?;
        let secondary = secondary_origin(&origin, config.dashboard_port, config.decision_port);

        let mut builder = ureq::AgentBuilder::new();
        if config.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.timeout_ms));
        }

        Ok(Self {
            primary: origin.as_str().trim_end_matches('/').to_string(),
            secondary: secondary.as_str().trim_end_matches('/').to_string(),
            agent: builder.build(),
        })
    }

    /// Base URL (no trailing slash) of the given service.
    pub fn base_url(&self, service: Service) -> &str {
        match service {
            Service::Primary => &self.primary,
            Service::Secondary => &self.secondary,
        }
    }

    pub fn get(
        &self,
        path: &str,
        options: RequestOptions,
        token: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        self.request("GET", path, None, options, token)
    }

    pub fn post<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        options: RequestOptions,
        token: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let body = serde_json::to_string(body)?;
        self.request("POST", path, Some(&body), options, token)
    }

    /// Issue a request and parse the JSON body.
    ///
    /// `token` is the current session token; it is required (and attached as
    /// a bearer credential) only when `options.authenticated` is set.
    pub fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<&str>,
        options: RequestOptions,
        token: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let bearer = if options.authenticated {
            match token.filter(|t| !t.is_empty()) {
                Some(token) => Some(token),
                None => return Err(ApiError::AuthRequired),
            }
        } else {
            None
        };

        let url = format!("{}{}", self.base_url(options.target), path);
        let mut request = self
            .agent
            .request(method, &url)
            .set("Content-Type", "application/json");
        if let Some(token) = bearer {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        let result = match body {
            Some(body) => request.send_string(body),
            None => request.call(),
        };

        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => return Err(ApiError::transport(transport)),
        };

        let status = response.status();
        let text = response.into_string().map_err(ApiError::transport)?;
        let body: Value = serde_json::from_str(&text).map_err(|e| {
            ApiError::Transport(format!("HTTP {status}: response is not valid JSON ({e})"))
        })?;

        Ok(ApiResponse {
            status,
            ok: (200..300).contains(&status),
            body,
        })
    }
}

/// Derive the decision service origin from the primary origin: scheme, host
/// and port only.
fn secondary_origin(origin: &Url, dashboard_port: u16, decision_port: u16) -> Url {
    let mut secondary = origin.clone();
    secondary.set_path("");
    secondary.set_query(None);
    secondary.set_fragment(None);
    if origin.port_or_known_default() == Some(dashboard_port) {
        // Only fails for cannot-be-a-base URLs, which have no port to swap.
        let _ = secondary.set_port(Some(decision_port));
    }
    secondary
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config(origin: &str) -> ServiceConfig {
        ServiceConfig {
            origin: origin.to_string(),
            ..ServiceConfig::default()
        }
    }

    #[test]
    fn secondary_uses_decision_port_on_dashboard_port() {
        let client = ApiClient::from_config(&config("http://10.0.0.5:8080")).unwrap();
        assert_eq!(client.base_url(Service::Primary), "http://10.0.0.5:8080");
        assert_eq!(client.base_url(Service::Secondary), "http://10.0.0.5:8082");
    }

    #[test]
    fn secondary_falls_back_to_same_port() {
        let client = ApiClient::from_config(&config("http://sched.local:9000/")).unwrap();
        assert_eq!(client.base_url(Service::Primary), "http://sched.local:9000");
        assert_eq!(client.base_url(Service::Secondary), "http://sched.local:9000");
    }

    #[test]
    fn secondary_drops_origin_path() {
        let client = ApiClient::from_config(&config("http://10.0.0.5:8080/dash")).unwrap();
        assert_eq!(client.base_url(Service::Primary), "http://10.0.0.5:8080/dash");
        assert_eq!(client.base_url(Service::Secondary), "http://10.0.0.5:8082");

        let same_port = ApiClient::from_config(&config("http://sched.local:9000/ui/")).unwrap();
        assert_eq!(same_port.base_url(Service::Secondary), "http://sched.local:9000");
    }

    #[test]
    fn default_port_origin_keeps_port() {
        let client = ApiClient::from_config(&config("https://sched.example.com")).unwrap();
        assert_eq!(
            client.base_url(Service::Secondary),
            "https://sched.example.com"
        );
    }

    #[test]
    fn invalid_origin_is_rejected() {
        let err = ApiClient::from_config(&config("not a url")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidOrigin { .. }));
    }

    #[test]
    fn authenticated_request_without_token_fails_before_io() {
        // Port 9 (discard) is never contacted: the check happens first.
        let client = ApiClient::from_config(&config("http://127.0.0.1:9")).unwrap();
        let err = client
            .get(METRICS_PATH, RequestOptions::authenticated(Service::Secondary), None)
            .unwrap_err();
        assert!(matches!(err, ApiError::AuthRequired));

        let err = client
            .get(METRICS_PATH, RequestOptions::authenticated(Service::Secondary), Some(""))
            .unwrap_err();
        assert!(matches!(err, ApiError::AuthRequired));
    }
}
