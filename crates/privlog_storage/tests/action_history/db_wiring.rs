#![forbid(unsafe_code)]

use chrono::{DateTime, TimeZone, Utc};
use privlog_kernel_contracts::applicant::{
    ApplicantAttributes, ApplicantColumn, ApplicantId, ApplicantRecordInput, ColumnValue,
    RecordKey,
};
use privlog_kernel_contracts::employee::{EmployeeId, EmployeeInput};
use privlog_kernel_contracts::history::{
    ActionHistoryInput, HistoryEntryId, HistoryPayload, Operation, RecordSnapshot,
};
use privlog_kernel_contracts::policy::{PolicyGrantInput, PolicyId, Purpose, Role};
use privlog_storage::audit_store::{PrivlogStore, StorageError};
use privlog_storage::repo::{
    ActionHistoryRepo, ApplicantDetailsRepo, EmployeesRepo, PrivacyPoliciesRepo,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn attrs() -> ApplicantAttributes {
    ApplicantAttributes {
        residence_city: Some("Austin".to_string()),
        residence_state: Some("Austin".to_string()),
        occupation: Some("Chef".to_string()),
        ..Default::default()
    }
}

struct Seeded {
    store: PrivlogStore,
    policy: PolicyId,
    actor: EmployeeId,
    record: RecordKey,
}

fn seeded() -> Seeded {
    let mut store = PrivlogStore::new_in_memory();
    let policy = store
        .insert_policy_row(
            PolicyGrantInput::windowed_v1(Role::LoanOfficer, Purpose::Onboarding, t0(), 5).unwrap(),
        )
        .unwrap();
    let actor = store
        .insert_employee_row(EmployeeInput::v1("Ada", "Park", "ada@bank.example", None).unwrap())
        .unwrap();
    let record = store
        .insert_applicant_row(ApplicantRecordInput::v1(ApplicantId(555), attrs()).unwrap())
        .unwrap();
    Seeded {
        store,
        policy,
        actor,
        record,
    }
}

fn add_input(s: &Seeded) -> ActionHistoryInput {
    ActionHistoryInput::add_v1(
        s.policy,
        s.actor,
        s.record,
        t0(),
        RecordSnapshot::of(ApplicantId(555), &attrs()),
    )
    .unwrap()
}

fn update_input(s: &Seeded, column: ApplicantColumn, value: &str) -> ActionHistoryInput {
    ActionHistoryInput::update_v1(
        s.policy,
        s.actor,
        s.record,
        t0(),
        column,
        ColumnValue::Text(value.to_string()),
    )
    .unwrap()
}

#[test]
fn at_history_db_01_append_is_insertion_ordered() {
    let mut s = seeded();
    let input = add_input(&s);
    let e1 = s.store.append_history_row(input).unwrap();
    let input = ActionHistoryInput::bare_v1(s.policy, s.actor, s.record, Operation::View, t0())
        .unwrap();
    let e2 = s.store.append_history_row(input).unwrap();
    assert_eq!(e1, HistoryEntryId(1));
    assert_eq!(e2, HistoryEntryId(2));

    let ops: Vec<Operation> = s
        .store
        .action_history_rows()
        .iter()
        .map(|e| e.operation)
        .collect();
    assert_eq!(ops, vec![Operation::Add, Operation::View]);
    assert_eq!(
        s.store.history_row(e2).map(|e| e.operation),
        Some(Operation::View)
    );
}

#[test]
fn at_history_db_02_foreign_keys_enforced() {
    let mut s = seeded();
    let mut input = add_input(&s);
    input.policy_id = PolicyId(99);
    assert!(matches!(
        s.store.append_history_row(input),
        Err(StorageError::ForeignKeyViolation {
            table: "action_history.policy_id",
            ..
        })
    ));

    let mut input = add_input(&s);
    input.actor_id = EmployeeId(99);
    assert!(matches!(
        s.store.append_history_row(input),
        Err(StorageError::ForeignKeyViolation {
            table: "action_history.entity_id",
            ..
        })
    ));

    let mut input = add_input(&s);
    input.record_key = RecordKey(99);
    assert!(matches!(
        s.store.append_history_row(input),
        Err(StorageError::ForeignKeyViolation {
            table: "action_history.data_id",
            ..
        })
    ));
    assert!(s.store.action_history_rows().is_empty());
}

#[test]
fn at_history_db_03_entries_cannot_be_overwritten() {
    let mut s = seeded();
    let input = add_input(&s);
    let e = s.store.append_history_row(input).unwrap();
    assert!(matches!(
        s.store.attempt_overwrite_history_entry(e),
        Err(StorageError::AppendOnlyViolation {
            table: "action_history"
        })
    ));
}

#[test]
fn at_history_db_04_column_redaction_is_key_addressed() {
    let mut s = seeded();
    let input = add_input(&s);
    let add = s.store.append_history_row(input).unwrap();
    let input = update_input(&s, ApplicantColumn::ResidenceCity, "Boston");
    let city_update = s.store.append_history_row(input).unwrap();
    let input = update_input(&s, ApplicantColumn::Occupation, "Boston");
    let other_update = s.store.append_history_row(input).unwrap();

    let rewrite = s
        .store
        .redact_history_rows_column(s.record, ApplicantColumn::ResidenceCity)
        .unwrap();
    assert_eq!(rewrite.snapshots_scrubbed, 1);
    assert_eq!(rewrite.updates_nulled, 1);

    let Some(HistoryPayload::Snapshot(snapshot)) = &s.store.history_row(add).unwrap().new_data
    else {
        panic!("add entry lost its snapshot");
    };
    assert_eq!(
        snapshot.get(ApplicantColumn::ResidenceCity),
        Some(&ColumnValue::Null)
    );
    assert_eq!(
        snapshot.get(ApplicantColumn::ResidenceState),
        Some(&ColumnValue::Text("Austin".to_string()))
    );
    assert!(s.store.history_row(city_update).unwrap().new_data.is_none());
    assert_eq!(
        s.store.history_row(other_update).unwrap().new_data,
        Some(HistoryPayload::Value(ColumnValue::Text("Boston".to_string())))
    );

    let again = s
        .store
        .redact_history_rows_column(s.record, ApplicantColumn::ResidenceCity)
        .unwrap();
    assert_eq!(again.total(), 0);
}

#[test]
fn at_history_db_05_hard_delete_cascades_only_owned_entries() {
    let mut s = seeded();
    let other = s
        .store
        .insert_applicant_row(ApplicantRecordInput::v1(ApplicantId(600), attrs()).unwrap())
        .unwrap();
    let input = add_input(&s);
    s.store.append_history_row(input).unwrap();
    let input = ActionHistoryInput::bare_v1(s.policy, s.actor, other, Operation::View, t0())
        .unwrap();
    let kept = s.store.append_history_row(input).unwrap();

    let report = s.store.hard_delete_applicant_rows(ApplicantId(555)).unwrap();
    assert_eq!(report.records_removed, 1);
    assert_eq!(report.history_entries_removed, 1);
    assert_eq!(s.store.action_history_rows().len(), 1);
    assert!(s.store.history_row(kept).is_some());
    assert!(s.store.action_history_rows_for_record(s.record).is_empty());
    assert!(s.store.policy_row(s.policy).is_some());
}

#[test]
fn at_history_db_06_redaction_of_missing_record_is_not_found() {
    let mut s = seeded();
    assert!(matches!(
        s.store
            .redact_history_rows_column(RecordKey(42), ApplicantColumn::Occupation),
        Err(StorageError::NotFound { .. })
    ));
}
