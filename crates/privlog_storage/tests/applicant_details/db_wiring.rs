#![forbid(unsafe_code)]

use privlog_kernel_contracts::applicant::{
    ApplicantAttributes, ApplicantColumn, ApplicantId, ApplicantRecordInput, ColumnValue,
    RecordKey,
};
use privlog_storage::audit_store::{PrivlogStore, StorageError};
use privlog_storage::repo::ApplicantDetailsRepo;

fn applicant(id: i64, city: &str) -> ApplicantRecordInput {
    ApplicantRecordInput::v1(
        ApplicantId(id),
        ApplicantAttributes {
            annual_income: Some(51_000),
            applicant_age: Some(34),
            residence_city: Some(city.to_string()),
            residence_state: Some("Texas".to_string()),
            loan_default_risk: Some(false),
            ..Default::default()
        },
    )
    .unwrap()
}

#[test]
fn at_applicant_db_01_insert_assigns_fresh_surrogate_keys() {
    let mut s = PrivlogStore::new_in_memory();
    let k1 = s.insert_applicant_row(applicant(555, "Austin")).unwrap();
    let k2 = s.insert_applicant_row(applicant(556, "Dallas")).unwrap();
    assert_eq!(k1, RecordKey(1));
    assert_eq!(k2, RecordKey(2));
    assert_eq!(s.live_applicant_row_key(ApplicantId(555)), Some(k1));
    assert_eq!(s.applicant_detail_rows().len(), 2);
}

#[test]
fn at_applicant_db_02_external_id_unique_among_live_rows() {
    let mut s = PrivlogStore::new_in_memory();
    s.insert_applicant_row(applicant(555, "Austin")).unwrap();
    let err = s
        .insert_applicant_row(applicant(555, "Austin"))
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::DuplicateKey {
            table: "applicant_details.applicant_id",
            ..
        }
    ));
}

#[test]
fn at_applicant_db_03_set_value_bumps_row_version_and_returns_previous() {
    let mut s = PrivlogStore::new_in_memory();
    let k = s.insert_applicant_row(applicant(555, "Austin")).unwrap();
    let prev = s
        .set_applicant_row_value(
            k,
            ApplicantColumn::ResidenceCity,
            ColumnValue::Text("Boston".to_string()),
        )
        .unwrap();
    assert_eq!(prev, ColumnValue::Text("Austin".to_string()));
    let row = s.applicant_row(k).unwrap();
    assert_eq!(row.attributes.residence_city.as_deref(), Some("Boston"));
    assert_eq!(row.row_version, 2);

    let err = s
        .set_applicant_row_value(k, ApplicantColumn::ApplicantAge, ColumnValue::Text("x".into()))
        .unwrap_err();
    assert!(matches!(err, StorageError::ContractViolation(_)));
    assert_eq!(s.applicant_row(k).unwrap().row_version, 2);
}

#[test]
fn at_applicant_db_04_missing_row_is_not_found() {
    let mut s = PrivlogStore::new_in_memory();
    let err = s
        .set_applicant_row_value(RecordKey(9), ApplicantColumn::Occupation, ColumnValue::Null)
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::NotFound {
            table: "applicant_details",
            ..
        }
    ));
    assert!(matches!(
        s.mark_applicant_row_redacted(RecordKey(9)),
        Err(StorageError::NotFound { .. })
    ));
}

#[test]
fn at_applicant_db_05_soft_delete_keeps_row_and_frees_external_id() {
    let mut s = PrivlogStore::new_in_memory();
    let k = s.insert_applicant_row(applicant(555, "Austin")).unwrap();
    s.mark_applicant_row_redacted(k).unwrap();
    assert!(s.applicant_row(k).unwrap().redacted);
    assert_eq!(s.live_applicant_row_key(ApplicantId(555)), None);

    let k2 = s.insert_applicant_row(applicant(555, "Austin")).unwrap();
    assert_ne!(k, k2);
    assert_eq!(s.applicant_detail_rows().len(), 2);
}

#[test]
fn at_applicant_db_06_hard_delete_removes_live_and_redacted_rows() {
    let mut s = PrivlogStore::new_in_memory();
    let k1 = s.insert_applicant_row(applicant(555, "Austin")).unwrap();
    s.mark_applicant_row_redacted(k1).unwrap();
    let k2 = s.insert_applicant_row(applicant(555, "Austin")).unwrap();
    let other = s.insert_applicant_row(applicant(600, "Waco")).unwrap();

    let report = s.hard_delete_applicant_rows(ApplicantId(555)).unwrap();
    assert_eq!(report.records_removed, 2);
    assert!(s.applicant_row(k1).is_none());
    assert!(s.applicant_row(k2).is_none());
    assert!(s.applicant_row(other).is_some());

    assert!(matches!(
        s.hard_delete_applicant_rows(ApplicantId(555)),
        Err(StorageError::NotFound { .. })
    ));

    let k3 = s.insert_applicant_row(applicant(555, "Austin")).unwrap();
    assert_eq!(k3, RecordKey(4));
}
