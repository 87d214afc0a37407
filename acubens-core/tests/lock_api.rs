use std::sync::Arc;

use acubens_common::{
    AcquireRequest, LockEvent, ReleaseRequest, RenewRequest, RenewStatus, StatusReply,
};
use acubens_core::{AcquireOutcome, LeaseStore, LockCoordinator, Properties};
use assert_matches::assert_matches;

fn init_log() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}

fn acquire(code: &str, holder: &str, name: &str) -> AcquireRequest {
    AcquireRequest {
        resource_code: code.into(),
        holder_id: holder.into(),
        display_name: name.into(),
    }
}

#[test]
fn mutual_exclusion_under_concurrent_acquire() {
    init_log();
    let coordinator = Arc::new(LockCoordinator::new(&Properties::default()));

    let mut handles = Vec::new();
    for holder in ["client-a", "client-b", "client-c", "client-d"] {
        let coordinator = Arc::clone(&coordinator);
        handles.push(std::thread::spawn(move || {
            let reply = coordinator
                .acquire(acquire("13-01", holder, holder))
                .expect("acquire failed");
            reply.granted
        }));
    }

    let grants = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .filter(|granted| *granted)
        .count();
    assert_eq!(grants, 1, "exactly one concurrent acquire may win");
}

#[test]
fn reentrant_acquire_keeps_acquired_at() {
    init_log();
    let coordinator = LockCoordinator::new(&Properties::default());

    let first = coordinator
        .acquire(acquire("13-01", "client-a", "Alice"))
        .expect("acquire failed");
    assert!(first.granted);
    let first_lease = first.lease.expect("granted reply carries a lease");

    std::thread::sleep(std::time::Duration::from_millis(5));

    let again = coordinator
        .acquire(acquire("13-01", "client-a", "Alice"))
        .expect("re-entrant acquire failed");
    assert!(again.granted);
    let again_lease = again.lease.expect("granted reply carries a lease");

    assert_eq!(again_lease.acquired_at, first_lease.acquired_at);
    assert!(again_lease.last_renewed_at >= first_lease.last_renewed_at);
}

#[test]
fn expired_lease_is_acquirable_by_another_holder() {
    // store-level, with injected clocks for deterministic expiry
    let store = LeaseStore::new(30_000);
    let t0 = 1_000_000;

    assert_matches!(
        store.try_acquire(&"13-01".into(), &"client-a".into(), &"Alice".into(), t0),
        AcquireOutcome::Granted(_)
    );

    // still live one tick before the ttl elapses
    assert_matches!(
        store.try_acquire(
            &"13-01".into(),
            &"client-b".into(),
            &"Bob".into(),
            t0 + 29_999
        ),
        AcquireOutcome::Held(_)
    );

    assert_matches!(
        store.try_acquire(
            &"13-01".into(),
            &"client-b".into(),
            &"Bob".into(),
            t0 + 30_000
        ),
        AcquireOutcome::Granted(lease) if lease.holder_id.as_str() == "client-b"
    );
}

#[test]
fn late_renewal_after_reclaim_returns_not_owner() {
    let store = LeaseStore::new(30_000);
    let t0 = 1_000_000;

    assert_matches!(
        store.try_acquire(&"13-01".into(), &"client-a".into(), &"Alice".into(), t0),
        AcquireOutcome::Granted(_)
    );

    // heartbeats stop; B reclaims after the ttl
    assert_matches!(
        store.try_acquire(
            &"13-01".into(),
            &"client-b".into(),
            &"Bob".into(),
            t0 + 31_000
        ),
        AcquireOutcome::Granted(_)
    );

    // a late heartbeat from A finds someone else's lease
    assert_eq!(
        store.renew(&"13-01".into(), &"client-a".into(), t0 + 32_000),
        RenewStatus::NotOwner
    );

    // and B's lease is untouched by it
    assert_eq!(
        store.renew(&"13-01".into(), &"client-b".into(), t0 + 33_000),
        RenewStatus::Renewed
    );
}

#[test]
fn renewal_of_expired_lease_is_not_found_even_for_owner() {
    let store = LeaseStore::new(30_000);
    let t0 = 1_000_000;

    assert_matches!(
        store.try_acquire(&"13-01".into(), &"client-a".into(), &"Alice".into(), t0),
        AcquireOutcome::Granted(_)
    );
    assert_eq!(
        store.renew(&"13-01".into(), &"client-a".into(), t0 + 30_000),
        RenewStatus::NotFound
    );
}

#[test]
fn renewal_of_unknown_code_is_not_found() {
    let store = LeaseStore::new(30_000);
    assert_eq!(
        store.renew(&"99-99".into(), &"client-a".into(), 1_000_000),
        RenewStatus::NotFound
    );
}

#[test]
fn release_is_idempotent() {
    init_log();
    let coordinator = LockCoordinator::new(&Properties::default());

    coordinator
        .acquire(acquire("13-01", "client-a", "Alice"))
        .expect("acquire failed");

    let release = ReleaseRequest {
        resource_code: "13-01".into(),
        holder_id: "client-a".into(),
    };
    let first = coordinator.release(release.clone()).expect("release failed");
    assert!(first.ok);
    assert!(first.released);

    let second = coordinator
        .release(release.clone())
        .expect("second release failed");
    assert!(second.ok);
    assert!(!second.released);

    // a foreign release never affects the new holder's lease
    let bob = coordinator
        .acquire(acquire("13-01", "client-b", "Bob"))
        .expect("acquire failed");
    assert!(bob.granted);
    let foreign = coordinator.release(release).expect("foreign release failed");
    assert!(foreign.ok);
    assert!(!foreign.released);

    let status: StatusReply = coordinator.status();
    assert_eq!(
        status.leases.get("13-01").map(|l| l.holder_id.clone()),
        Some("client-b".into())
    );
}

#[test]
fn denied_acquire_names_the_current_holder() {
    init_log();
    let coordinator = LockCoordinator::new(&Properties::default());

    let granted = coordinator
        .acquire(acquire("13-01", "client-a", "Alice"))
        .expect("acquire failed");
    assert!(granted.granted);

    // B's status query shows the record held by A with A's display name
    let status = coordinator.status();
    let lease = status.leases.get("13-01").expect("lease visible in status");
    assert_eq!(lease.holder_display_name.as_str(), "Alice");

    // B's acquire is denied and carries A's identity
    let denied = coordinator
        .acquire(acquire("13-01", "client-b", "Bob"))
        .expect("acquire failed");
    assert!(!denied.granted);
    let owner = denied.owner.expect("denied reply carries the owner");
    assert_eq!(owner.holder_id.as_str(), "client-a");
    assert_eq!(owner.holder_display_name.as_str(), "Alice");

    // after A releases, B's acquire succeeds
    coordinator
        .release(ReleaseRequest {
            resource_code: "13-01".into(),
            holder_id: "client-a".into(),
        })
        .expect("release failed");
    let reply = coordinator
        .acquire(acquire("13-01", "client-b", "Bob"))
        .expect("acquire failed");
    assert!(reply.granted);
}

#[test]
fn events_are_published_after_mutation() {
    init_log();
    let coordinator = LockCoordinator::new(&Properties::default());
    let mut events = coordinator.subscribe();

    coordinator
        .acquire(acquire("13-01", "client-a", "Alice"))
        .expect("acquire failed");

    // by the time the acquire reply exists, the event is already queued
    let event = events.try_recv().expect("lock_acquired was published");
    assert_matches!(
        event,
        LockEvent::LockAcquired { lease } if lease.resource_code.as_str() == "13-01"
    );

    coordinator
        .release(ReleaseRequest {
            resource_code: "13-01".into(),
            holder_id: "client-a".into(),
        })
        .expect("release failed");
    let event = events.try_recv().expect("lock_released was published");
    assert_matches!(
        event,
        LockEvent::LockReleased { resource_code } if resource_code.as_str() == "13-01"
    );
}

#[test]
fn successful_renew_is_not_broadcast() {
    init_log();
    let coordinator = LockCoordinator::new(&Properties::default());
    let mut events = coordinator.subscribe();

    coordinator
        .acquire(acquire("13-01", "client-a", "Alice"))
        .expect("acquire failed");
    let _ = events.try_recv().expect("lock_acquired was published");

    let reply = coordinator
        .renew(RenewRequest {
            resource_code: "13-01".into(),
            holder_id: "client-a".into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
        .expect("renew failed");
    assert_eq!(reply.status, RenewStatus::Renewed);
    assert!(events.try_recv().is_err(), "renewals must not be broadcast");
}

#[test]
fn holder_sweep_releases_everything_and_broadcasts() {
    init_log();
    let coordinator = LockCoordinator::new(&Properties::default());

    coordinator
        .acquire(acquire("13-01", "client-a", "Alice"))
        .expect("acquire failed");
    coordinator
        .acquire(acquire("13-02", "client-a", "Alice"))
        .expect("acquire failed");
    coordinator
        .acquire(acquire("13-03", "client-b", "Bob"))
        .expect("acquire failed");

    let mut events = coordinator.subscribe();
    let mut released: Vec<String> = coordinator
        .release_all_by_holder(&"client-a".into())
        .into_iter()
        .map(|code| code.to_string())
        .collect();
    released.sort();
    assert_eq!(released, vec!["13-01", "13-02"]);

    for _ in 0..2 {
        assert_matches!(
            events.try_recv().expect("sweep publishes each release"),
            LockEvent::LockReleased { .. }
        );
    }

    let status = coordinator.status();
    assert!(!status.leases.contains_key("13-01"));
    assert!(status.leases.contains_key("13-03"), "other holders keep theirs");
}

#[test]
fn full_snapshot_carries_the_live_table() {
    init_log();
    let coordinator = LockCoordinator::new(&Properties::default());

    coordinator
        .acquire(acquire("13-01", "client-a", "Alice"))
        .expect("acquire failed");
    coordinator
        .acquire(acquire("13-02", "client-b", "Bob"))
        .expect("acquire failed");

    assert_matches!(
        coordinator.full_snapshot(),
        LockEvent::LockStatusUpdate { leases } if leases.len() == 2
    );
}

#[test]
fn blank_request_fields_are_rejected() {
    init_log();
    let coordinator = LockCoordinator::new(&Properties::default());

    let err = coordinator
        .acquire(acquire("", "client-a", "Alice"))
        .expect_err("blank resource_code must be rejected");
    assert_eq!(err.code(), acubens_common::prelude::ErrorCode::illegal_argument_code());
}
