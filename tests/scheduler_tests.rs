/// Polling scheduler tests driven by a synthetic clock.
use std::time::{Duration, Instant};

use schedash::monitor::{PollError, PollState, PollingScheduler, ResourceKind};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[test]
fn sub_second_interval_is_refused_and_nothing_runs() {
    let mut sched = PollingScheduler::new(true);
    let t0 = Instant::now();

    let err = sched.start(ResourceKind::Health, 500, t0).unwrap_err();

    assert_eq!(err, PollError::IntervalTooShort { requested_ms: 500 });
    assert_eq!(err.to_string(), "Interval must be at least 1 second (got 500 ms)");
    assert!(!sched.any_active());
    assert!(sched.due(t0 + secs(10)).is_empty());
}

#[test]
fn kinds_run_on_independent_intervals() {
    let mut sched = PollingScheduler::new(true);
    let t0 = Instant::now();
    sched.start(ResourceKind::Health, 2000, t0).unwrap();
    sched.start(ResourceKind::Metrics, 3000, t0).unwrap();

    let mut health = 0;
    let mut metrics = 0;
    for tick in 0..=12 {
        for kind in sched.due(t0 + secs(tick)) {
            match kind {
                ResourceKind::Health => health += 1,
                ResourceKind::Metrics => metrics += 1,
            }
        }
    }
    // Immediate probe plus one per elapsed interval.
    assert_eq!(health, 7);
    assert_eq!(metrics, 5);
}

#[test]
fn next_wakeup_tracks_earliest_handle() {
    let mut sched = PollingScheduler::new(true);
    let t0 = Instant::now();
    assert_eq!(sched.next_wakeup(), None);

    sched.start(ResourceKind::Health, 5000, t0).unwrap();
    sched.start(ResourceKind::Metrics, 2000, t0).unwrap();
    sched.due(t0);
    assert_eq!(sched.next_wakeup(), Some(t0 + secs(2)));

    sched.stop(ResourceKind::Metrics);
    assert_eq!(sched.next_wakeup(), Some(t0 + secs(5)));
}

#[test]
fn session_loss_and_regain() {
    let mut sched = PollingScheduler::new(true);
    let t0 = Instant::now();
    sched.start(ResourceKind::Metrics, 1000, t0).unwrap();

    assert_eq!(sched.apply_session(false), vec![ResourceKind::Metrics]);
    assert_eq!(
        sched.toggle(ResourceKind::Metrics, 1000, t0),
        Err(PollError::AuthRequired(ResourceKind::Metrics))
    );

    // Regaining the session does not resurrect the old handle.
    sched.apply_session(true);
    assert_eq!(sched.state(ResourceKind::Metrics), PollState::Idle);
    assert_eq!(
        sched.toggle(ResourceKind::Metrics, 1000, t0),
        Ok(PollState::Active { interval_ms: 1000 })
    );
}
