#![forbid(unsafe_code)]

use privlog_kernel_contracts::employee::{EmployeeId, EmployeeInput};
use privlog_storage::audit_store::{PrivlogStore, StorageError};
use privlog_storage::repo::EmployeesRepo;

#[test]
fn at_employee_db_01_insert_and_read_back() {
    let mut s = PrivlogStore::new_in_memory();
    let id = s
        .insert_employee_row(
            EmployeeInput::v1("Ada", "Park", "ada@bank.example", Some("555-0100".into())).unwrap(),
        )
        .unwrap();
    assert_eq!(id, EmployeeId(1));
    let row = s.employee_row(id).unwrap();
    assert_eq!(row.display_name(), "Ada Park");
    assert_eq!(row.phone.as_deref(), Some("555-0100"));
}

#[test]
fn at_employee_db_02_email_is_unique_case_insensitively() {
    let mut s = PrivlogStore::new_in_memory();
    s.insert_employee_row(EmployeeInput::v1("Ada", "Park", "ada@bank.example", None).unwrap())
        .unwrap();
    let err = s
        .insert_employee_row(
            EmployeeInput::v1("Ada", "Lee", "ADA@bank.example", None).unwrap(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::DuplicateKey {
            table: "employees.email",
            ..
        }
    ));
    assert_eq!(s.employee_roster_rows().len(), 1);
}
