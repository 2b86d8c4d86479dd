/// Session lifecycle tests: login in both modes, persistence across
/// restarts and logout.
mod support;

use serde_json::json;

use schedash::api::ApiClient;
use schedash::session::storage::{FileTokenStore, MemoryTokenStore, TokenStore};
use schedash::session::{Credentials, LoginError, SessionStore, SessionTransition};
use support::{MockService, reply_json, unreachable_config};

fn password(username: &str, password: &str) -> Credentials {
    Credentials::Password {
        username: username.to_string(),
        password: password.to_string(),
    }
}

#[test]
fn password_login_installs_token() {
    let mock = MockService::start(|req| {
        assert_eq!(req.path, "/api/v1/auth/login");
        reply_json(200, json!({"success": true, "data": {"token": "abc"}}))
    });
    let client = ApiClient::from_config(&mock.config().service).unwrap();
    let backing = MemoryTokenStore::new();
    let mut store = SessionStore::initialize(Box::new(backing.clone()));

    let outcome = store.login(&client, &password("admin", "x")).unwrap();

    assert_eq!(outcome.message, "Login successful!");
    assert_eq!(outcome.transition, SessionTransition::Authenticated);
    assert!(store.is_authenticated());
    assert_eq!(store.token(), Some("abc"));
    assert_eq!(backing.get().as_deref(), Some("abc"));
    assert_eq!(
        mock.requests()[0].json(),
        json!({"username": "admin", "password": "x"})
    );
}

#[test]
fn public_key_login_accepts_flat_envelope() {
    let mock = MockService::start(|req| {
        assert_eq!(req.path, "/api/v1/auth/token");
        reply_json(200, json!({"success": true, "token": "flat-token"}))
    });
    let client = ApiClient::from_config(&mock.config().service).unwrap();
    let mut store = SessionStore::initialize(Box::new(MemoryTokenStore::new()));

    let outcome = store
        .login(
            &client,
            &Credentials::PublicKey {
                public_key: "-----BEGIN PUBLIC KEY-----\nMIIB\n-----END PUBLIC KEY-----\n"
                    .to_string(),
            },
        )
        .unwrap();

    assert_eq!(outcome.message, "Authentication successful!");
    assert_eq!(store.token(), Some("flat-token"));
    let body = mock.requests()[0].json();
    assert!(body["public_key"].as_str().unwrap().starts_with("-----BEGIN"));
}

#[test]
fn rejected_login_keeps_previous_session() {
    let mock = MockService::start(|_| {
        reply_json(401, json!({"success": false, "error": "invalid password"}))
    });
    let client = ApiClient::from_config(&mock.config().service).unwrap();
    let backing = MemoryTokenStore::with_token("old");
    let mut store = SessionStore::initialize(Box::new(backing.clone()));

    let err = store.login(&client, &password("admin", "wrong")).unwrap_err();

    assert_eq!(err.to_string(), "Login failed: invalid password");
    assert_eq!(store.token(), Some("old"));
    assert_eq!(backing.get().as_deref(), Some("old"));
}

#[test]
fn rejection_without_reason_uses_fallback() {
    let mock = MockService::start(|_| reply_json(200, json!({"success": false})));
    let client = ApiClient::from_config(&mock.config().service).unwrap();
    let mut store = SessionStore::initialize(Box::new(MemoryTokenStore::new()));

    let err = store
        .login(
            &client,
            &Credentials::PublicKey {
                public_key: "key".to_string(),
            },
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "Authentication failed: Unknown error");
}

#[test]
fn transport_failure_is_reported_as_request_failed() {
    let client = ApiClient::from_config(&unreachable_config().service).unwrap();
    let mut store = SessionStore::initialize(Box::new(MemoryTokenStore::new()));

    let err = store.login(&client, &password("admin", "x")).unwrap_err();

    assert!(matches!(err, LoginError::Transport(_)));
    assert!(err.to_string().starts_with("Request failed: "));
    assert!(!store.is_authenticated());
}

#[test]
fn blank_input_never_reaches_the_network() {
    let mock = MockService::start(|_| reply_json(200, json!({"success": true})));
    let client = ApiClient::from_config(&mock.config().service).unwrap();
    let mut store = SessionStore::initialize(Box::new(MemoryTokenStore::new()));

    let err = store.login(&client, &password("admin", "")).unwrap_err();
    assert_eq!(err.to_string(), "Please enter username and password");
    assert!(mock.requests().is_empty());
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn token_survives_restart_and_logout_clears_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let mock = MockService::start(|_| {
        reply_json(200, json!({"success": true, "data": {"token": "persisted"}}))
    });
    let client = ApiClient::from_config(&mock.config().service).unwrap();

    {
        let mut store = SessionStore::initialize(Box::new(FileTokenStore::new(&path)));
        assert!(!store.is_authenticated());
        store.login(&client, &password("admin", "x")).unwrap();
    }

    let mut restarted = SessionStore::initialize(Box::new(FileTokenStore::new(&path)));
    assert_eq!(restarted.token(), Some("persisted"));

    let outcome = restarted.logout();
    assert_eq!(outcome.transition, SessionTransition::Unauthenticated);
    assert!(outcome.storage_error.is_none());
    assert_eq!(FileTokenStore::new(&path).load().unwrap(), None);

    let again = SessionStore::initialize(Box::new(FileTokenStore::new(&path)));
    assert!(!again.is_authenticated());
}

#[test]
fn unwritable_storage_fails_login_without_installing_token() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the file should be makes every write fail.
    let path = dir.path().join("session.json");
    std::fs::create_dir(&path).unwrap();

    let mock = MockService::start(|_| {
        reply_json(200, json!({"success": true, "data": {"token": "abc"}}))
    });
    let client = ApiClient::from_config(&mock.config().service).unwrap();
    let mut store = SessionStore::initialize(Box::new(FileTokenStore::new(&path)));

    let err = store.login(&client, &password("admin", "x")).unwrap_err();
    assert!(matches!(err, LoginError::Storage(_)));
    assert!(!store.is_authenticated());
}
