#![forbid(unsafe_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use privlog_kernel_contracts::policy::{PolicyGrantInput, PolicyId, Purpose, Role};
use privlog_storage::audit_store::{PrivlogStore, StorageError};
use privlog_storage::repo::PrivacyPoliciesRepo;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

#[test]
fn at_policy_db_01_grants_are_inserted_with_fresh_keys() {
    let mut s = PrivlogStore::new_in_memory();
    let p1 = s
        .insert_policy_row(
            PolicyGrantInput::windowed_v1(Role::LoanOfficer, Purpose::Onboarding, t0(), 5).unwrap(),
        )
        .unwrap();
    let p2 = s
        .insert_policy_row(
            PolicyGrantInput::windowed_v1(Role::Auditor, Purpose::Audit, t0(), 5).unwrap(),
        )
        .unwrap();
    assert_eq!(p1, PolicyId(1));
    assert_eq!(p2, PolicyId(2));

    let grant = s.policy_row(p1).unwrap();
    assert_eq!(grant.role, Role::LoanOfficer);
    assert_eq!(grant.purpose, Purpose::Onboarding);
    assert_eq!(grant.end_time - grant.start_time, Duration::minutes(5));
    assert!(grant.is_active_at(t0() + Duration::minutes(4)));
    assert!(!grant.is_active_at(t0() + Duration::minutes(5)));
}

#[test]
fn at_policy_db_02_grants_are_append_only() {
    let mut s = PrivlogStore::new_in_memory();
    let p = s
        .insert_policy_row(
            PolicyGrantInput::windowed_v1(Role::LoanManager, Purpose::Approval, t0(), 5).unwrap(),
        )
        .unwrap();
    assert!(matches!(
        s.attempt_overwrite_policy_grant(p),
        Err(StorageError::AppendOnlyViolation {
            table: "privacy_policies"
        })
    ));
    assert!(matches!(
        s.attempt_delete_policy_grant(p),
        Err(StorageError::AppendOnlyViolation { .. })
    ));
    assert_eq!(s.policy_rows().len(), 1);
}

#[test]
fn at_policy_db_03_inverted_window_rejected_before_write() {
    assert!(PolicyGrantInput::v1(Role::Auditor, Purpose::Review, t0(), t0()).is_err());
    assert!(PolicyGrantInput::v1(
        Role::Auditor,
        Purpose::Review,
        t0(),
        t0() - Duration::seconds(1)
    )
    .is_err());
}
