/// Strategy form tests: structural invariants over longer edit sequences
/// and submission against a mock service.
mod support;

use serde_json::json;

use schedash::api::{ApiClient, ApiError};
use schedash::strategy::{StrategyForm, StrategyId, SubmitOutcome, ValidationError};
use support::{MockService, reply_json};

fn id(n: u32) -> StrategyId {
    StrategyId::new(n)
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn form_never_becomes_empty() {
    let mut form = StrategyForm::new();
    let added: Vec<_> = (0..4).map(|_| form.add_strategy()).collect();
    form.remove_strategy(id(1));
    for id in added {
        form.remove_strategy(id);
        assert!(!form.strategies().is_empty());
    }
    assert_eq!(form.strategies().len(), 1);
    for record in form.strategies() {
        assert!(!record.selectors().is_empty());
    }
}

#[test]
fn selectors_never_become_empty() {
    let mut form = StrategyForm::new();
    let strategy = id(1);
    form.add_selector(strategy).unwrap();
    form.add_selector(strategy).unwrap();
    for _ in 0..3 {
        form.remove_selector(strategy, 0).unwrap();
        assert!(!form.get(strategy).unwrap().selectors().is_empty());
    }
    assert_eq!(form.get(strategy).unwrap().selectors().len(), 1);
}

#[test]
fn serialization_preserves_order_and_drops_ids() {
    let mut form = StrategyForm::new();
    let second = form.add_strategy();
    form.set_priority(second, true).unwrap();
    form.set_selector(second, 0, "app", "ran").unwrap();

    let payload = serde_json::to_value(form.serialize().payload).unwrap();
    assert_eq!(
        payload,
        json!({"strategies": [
            {"priority": false, "execution_time": 20000000, "selectors": []},
            {"priority": true, "execution_time": 20000000,
             "selectors": [{"key": "app", "value": "ran"}]}
        ]})
    );
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[test]
fn submit_posts_payload_with_bearer() {
    let mock = MockService::start(|_| {
        reply_json(200, json!({"success": true, "message": "saved"}))
    });
    let client = ApiClient::from_config(&mock.config().service).unwrap();
    let mut form = StrategyForm::new();
    form.add_strategy();

    let outcome = form.submit(&client, Some("abc")).unwrap();

    let SubmitOutcome::Saved {
        count,
        substitutions,
        ..
    } = &outcome
    else {
        panic!("expected saved outcome, got {outcome:?}");
    };
    assert_eq!(*count, 2);
    assert!(substitutions.is_empty());

    let seen = mock.requests();
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].path, "/api/v1/strategies");
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer abc"));
    assert_eq!(seen[0].json()["strategies"].as_array().unwrap().len(), 2);
}

#[test]
fn submit_reports_server_rejection_and_substitutions() {
    let mock = MockService::start(|_| {
        reply_json(403, json!({"success": false, "error": "forbidden"}))
    });
    let client = ApiClient::from_config(&mock.config().service).unwrap();
    let mut form = StrategyForm::new();
    form.set_execution_time(id(1), "soon").unwrap();

    let outcome = form.submit(&client, Some("abc")).unwrap();

    assert_eq!(
        outcome,
        SubmitOutcome::Rejected {
            reason: "forbidden".to_string(),
            substitutions: vec![ValidationError::ExecutionTime {
                strategy: id(1),
                input: "soon".to_string(),
            }],
        }
    );
    assert_eq!(mock.requests()[0].json()["strategies"][0]["execution_time"], 20_000_000);
}

#[test]
fn submit_without_session_sends_nothing() {
    let mock = MockService::start(|_| reply_json(200, json!({"success": true})));
    let client = ApiClient::from_config(&mock.config().service).unwrap();

    let err = StrategyForm::new().submit(&client, None).unwrap_err();

    assert!(matches!(err, ApiError::AuthRequired));
    assert!(mock.requests().is_empty());
}
