/// Operator session: the bearer token and the authenticated status derived
/// from it.
///
/// The session is loaded from durable storage when the store is created and
/// only changes through [`SessionStore::login`] and [`SessionStore::logout`].
/// `authenticated` is never stored on its own; it is computed from the token,
/// so the two can not drift apart.
///
/// Each mutation returns a [`SessionTransition`]. The dashboard forwards it to
/// the polling scheduler, which stops privileged polling when the session
/// drops to unauthenticated.
use thiserror::Error;

use crate::api::envelope::{self, TokenGrant};
use crate::api::{ApiClient, ApiError, LOGIN_PATH, RequestOptions, Service, TOKEN_PATH};

pub mod storage;

use storage::{StorageError, TokenStore};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Snapshot of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    fn from_token(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// The two supported login modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Username/password against the primary service.
    Password { username: String, password: String },
    /// PEM public key exchanged for a token by the decision service.
    PublicKey { public_key: String },
}

impl Credentials {
    fn success_message(&self) -> &'static str {
        match self {
            Self::Password { .. } => "Login successful!",
            Self::PublicKey { .. } => "Authentication successful!",
        }
    }

    fn failure_prefix(&self) -> &'static str {
        match self {
            Self::Password { .. } => "Login failed",
            Self::PublicKey { .. } => "Authentication failed",
        }
    }

    fn fallback_reason(&self) -> &'static str {
        match self {
            Self::Password { .. } => "Invalid credentials",
            Self::PublicKey { .. } => "Unknown error",
        }
    }

    /// Reject blank input before it reaches the network.
    fn validate(&self) -> Result<(), LoginError> {
        match self {
            Self::Password { username, password }
                if username.trim().is_empty() || password.trim().is_empty() =>
            {
                Err(LoginError::MissingInput("Please enter username and password"))
            }
            Self::PublicKey { public_key } if public_key.trim().is_empty() => {
                Err(LoginError::MissingInput("Please enter public key"))
            }
            _ => Ok(()),
        }
    }
}

/// Change in authentication status caused by a session mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    Authenticated,
    Unauthenticated,
    Unchanged,
}

impl SessionTransition {
    fn between(was_authenticated: bool, now_authenticated: bool) -> Self {
        match (was_authenticated, now_authenticated) {
            (false, true) => Self::Authenticated,
            (true, false) => Self::Unauthenticated,
            _ => Self::Unchanged,
        }
    }
}

/// Successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub message: &'static str,
    pub transition: SessionTransition,
}

/// Result of [`SessionStore::logout`]. The in-memory session is always
/// cleared; `storage_error` is set when the persisted token survived.
#[derive(Debug)]
pub struct LogoutOutcome {
    pub transition: SessionTransition,
    pub storage_error: Option<StorageError>,
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("{0}")]
    MissingInput(&'static str),
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("{prefix}: {reason}")]
    Rejected { prefix: &'static str, reason: String },
    #[error("Login succeeded but the token could not be saved: {0}")]
    Storage(#[from] StorageError),
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Sole owner of the [`Session`].
pub struct SessionStore {
    session: Session,
    storage: Box<dyn TokenStore>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.session.authenticated())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create the store from persisted state. No network access.
    ///
    /// Unreadable storage is treated as "no token", the same as a fresh
    /// install.
    pub fn initialize(storage: Box<dyn TokenStore>) -> Self {
        let token = storage.load().ok().flatten();
        Self {
            session: Session::from_token(token),
            storage,
        }
    }

    /// Re-read persisted state. Calling it repeatedly yields the same session.
    pub fn reload(&mut self) -> SessionTransition {
        let was = self.session.authenticated();
        self.session = Session::from_token(self.storage.load().ok().flatten());
        SessionTransition::between(was, self.session.authenticated())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn token(&self) -> Option<&str> {
        self.session.token()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.authenticated()
    }

    /// Exchange credentials for a token.
    ///
    /// On success the token is persisted and then installed in the session.
    /// On any failure the session is left exactly as it was.
    pub fn login(
        &mut self,
        client: &ApiClient,
        credentials: &Credentials,
    ) -> Result<LoginOutcome, LoginError> {
        credentials.validate()?;

        let result = match credentials {
            Credentials::Password { username, password } => client.post(
                LOGIN_PATH,
                &serde_json::json!({
                    "username": username.trim(),
                    "password": password.trim(),
                }),
                RequestOptions::public(Service::Primary),
                None,
            ),
            Credentials::PublicKey { public_key } => client.post(
                TOKEN_PATH,
                &serde_json::json!({ "public_key": public_key.trim() }),
                RequestOptions::public(Service::Secondary),
                None,
            ),
        };

        let response = result.map_err(|e| match e {
            ApiError::Transport(message) => LoginError::Transport(message),
            other => LoginError::Transport(other.to_string()),
        })?;

        match envelope::token_grant(&response, credentials.fallback_reason()) {
            TokenGrant::Granted(token) => {
                self.storage.save(&token)?;
                let was = self.session.authenticated();
                self.session = Session::from_token(Some(token));
                Ok(LoginOutcome {
                    message: credentials.success_message(),
                    transition: SessionTransition::between(was, true),
                })
            }
            TokenGrant::Rejected(reason) => Err(LoginError::Rejected {
                prefix: credentials.failure_prefix(),
                reason,
            }),
        }
    }

    /// Drop the token from memory and storage. Never touches the network.
    ///
    /// Memory is cleared even when storage is not. The storage error is
    /// handed back because the stale token would authenticate the next start.
    pub fn logout(&mut self) -> LogoutOutcome {
        let was = self.session.authenticated();
        let storage_error = self.storage.clear().err();
        self.session = Session::default();
        LogoutOutcome {
            transition: SessionTransition::between(was, false),
            storage_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::storage::MemoryTokenStore;
    use super::*;

    #[test]
    fn initialize_reads_persisted_token() {
        let store = SessionStore::initialize(Box::new(MemoryTokenStore::with_token("abc")));
        assert!(store.is_authenticated());
        assert_eq!(store.token(), Some("abc"));
    }

    #[test]
    fn empty_persisted_token_is_unauthenticated() {
        let store = SessionStore::initialize(Box::new(MemoryTokenStore::with_token("")));
        assert!(!store.is_authenticated());
        assert_eq!(store.token(), None);
    }

    #[test]
    fn reload_is_idempotent() {
        let mut store = SessionStore::initialize(Box::new(MemoryTokenStore::with_token("abc")));
        assert_eq!(store.reload(), SessionTransition::Unchanged);
        assert_eq!(store.reload(), SessionTransition::Unchanged);
        assert_eq!(store.token(), Some("abc"));
    }

    #[test]
    fn logout_clears_memory_and_storage() {
        let backing = MemoryTokenStore::with_token("abc");
        let mut store = SessionStore::initialize(Box::new(backing.clone()));
        let outcome = store.logout();
        assert_eq!(outcome.transition, SessionTransition::Unauthenticated);
        assert!(outcome.storage_error.is_none());
        assert!(!store.is_authenticated());
        assert_eq!(backing.get(), None);
        assert_eq!(store.logout().transition, SessionTransition::Unchanged);
    }

    /// Keeps its token no matter what; `clear` always fails.
    struct StuckStore(MemoryTokenStore);

    impl TokenStore for StuckStore {
        fn load(&self) -> Result<Option<String>, StorageError> {
            self.0.load()
        }

        fn save(&self, token: &str) -> Result<(), StorageError> {
            self.0.save(token)
        }

        fn clear(&self) -> Result<(), StorageError> {
            Err(StorageError::Write {
                path: "session.json".into(),
                source: std::io::Error::other("read-only filesystem"),
            })
        }
    }

    #[test]
    fn logout_reports_storage_that_kept_the_token() {
        let backing = MemoryTokenStore::with_token("abc");
        let mut store = SessionStore::initialize(Box::new(StuckStore(backing.clone())));

        let outcome = store.logout();
        assert_eq!(outcome.transition, SessionTransition::Unauthenticated);
        assert!(!store.is_authenticated());
        let err = outcome.storage_error.expect("clear failure is reported");
        assert!(err.to_string().contains("read-only filesystem"));

        let restarted = SessionStore::initialize(Box::new(backing));
        assert!(restarted.is_authenticated());
    }

    #[test]
    fn blank_credentials_are_rejected_locally() {
        let blank = Credentials::Password {
            username: "  ".to_string(),
            password: "x".to_string(),
        };
        assert!(matches!(blank.validate(), Err(LoginError::MissingInput(_))));

        let key = Credentials::PublicKey {
            public_key: String::new(),
        };
        assert_eq!(
            key.validate().unwrap_err().to_string(),
            "Please enter public key"
        );
    }

    #[test]
    fn transitions_reflect_status_change() {
        assert_eq!(
            SessionTransition::between(false, true),
            SessionTransition::Authenticated
        );
        assert_eq!(
            SessionTransition::between(true, false),
            SessionTransition::Unauthenticated
        );
        assert_eq!(
            SessionTransition::between(true, true),
            SessionTransition::Unchanged
        );
    }
}
