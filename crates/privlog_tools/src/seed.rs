#![forbid(unsafe_code)]

//! CSV ingestion of the applicant dataset and the employee roster. Applicant
//! rows go through `record_add` so each one is granted and logged.

use std::io;
use std::path::Path;

use privlog_kernel_contracts::applicant::{
    ApplicantAttributes, ApplicantColumn, ApplicantId, ApplicantRecordInput, ColumnValue,
};
use privlog_kernel_contracts::employee::{EmployeeId, EmployeeInput};
use privlog_os::gateway::MutationGateway;
use privlog_os::AuditError;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("cannot read {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("malformed csv at line {line}: {source}")]
    Csv {
        line: u64,
        #[source]
        source: csv::Error,
    },
    #[error("row at line {line} rejected: {source}")]
    Row {
        line: u64,
        #[source]
        source: AuditError,
    },
    #[error(transparent)]
    Audit(#[from] AuditError),
}

#[derive(Debug, Deserialize)]
struct ApplicantCsvRow {
    #[serde(rename = "Applicant_ID")]
    applicant_id: i64,
    #[serde(rename = "Annual_Income")]
    annual_income: Option<i64>,
    #[serde(rename = "Applicant_Age")]
    applicant_age: Option<i64>,
    #[serde(rename = "Work_Experience")]
    work_experience: Option<i64>,
    #[serde(rename = "Marital_Status")]
    marital_status: Option<String>,
    #[serde(rename = "House_Ownership")]
    house_ownership: Option<String>,
    #[serde(rename = "Vehicle_Ownership(car)")]
    vehicle_ownership: Option<String>,
    #[serde(rename = "Occupation")]
    occupation: Option<String>,
    #[serde(rename = "Residence_City")]
    residence_city: Option<String>,
    #[serde(rename = "Residence_State")]
    residence_state: Option<String>,
    #[serde(rename = "Years_in_Current_Employment")]
    years_in_current_employment: Option<i64>,
    #[serde(rename = "Years_in_Current_Residence")]
    years_in_current_residence: Option<i64>,
    #[serde(rename = "Loan_Default_Risk")]
    loan_default_risk: Option<String>,
}

impl ApplicantCsvRow {
    fn into_input(self) -> Result<ApplicantRecordInput, AuditError> {
        let loan_default_risk = match self.loan_default_risk.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match ColumnValue::parse_for(ApplicantColumn::LoanDefaultRisk, raw)? {
                ColumnValue::Boolean(b) => Some(b),
                _ => None,
            },
        };
        let attributes = ApplicantAttributes {
            annual_income: self.annual_income,
            applicant_age: self.applicant_age,
            work_experience: self.work_experience,
            marital_status: non_blank(self.marital_status),
            house_ownership: non_blank(self.house_ownership),
            vehicle_ownership: non_blank(self.vehicle_ownership),
            occupation: non_blank(self.occupation),
            residence_city: non_blank(self.residence_city),
            residence_state: non_blank(self.residence_state),
            years_in_current_employment: self.years_in_current_employment,
            years_in_current_residence: self.years_in_current_residence,
            loan_default_risk,
        };
        Ok(ApplicantRecordInput::v1(
            ApplicantId(self.applicant_id),
            attributes,
        )?)
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[derive(Debug, Deserialize)]
struct EmployeeCsvRow {
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
}

/// Employee the loader attributes applicant adds to when no roster is given.
pub fn ensure_seed_actor(gateway: &MutationGateway) -> Result<EmployeeId, SeedError> {
    let input = EmployeeInput::v1("Seed", "Loader", "seed.loader@privlog.local", None)
        .map_err(AuditError::from)?;
    Ok(gateway.register_employee(input)?)
}

pub fn load_employees<R: io::Read>(
    gateway: &MutationGateway,
    reader: R,
) -> Result<Vec<EmployeeId>, SeedError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut ids = Vec::new();
    for (i, result) in rdr.deserialize::<EmployeeCsvRow>().enumerate() {
        let line = data_line(i);
        let row = result.map_err(|source| SeedError::Csv { line, source })?;
        let input = EmployeeInput::v1(
            row.first_name,
            row.last_name,
            row.email,
            non_blank(row.phone),
        )
        .map_err(|v| SeedError::Row {
            line,
            source: v.into(),
        })?;
        let id = gateway
            .register_employee(input)
            .map_err(|source| SeedError::Row { line, source })?;
        ids.push(id);
    }
    info!(employees = ids.len(), "employees loaded");
    Ok(ids)
}

/// Adds at most `max_rows` applicants (all of them when `None`). Stops at
/// the first rejected row; rows before it stay committed.
pub fn load_applicants<R: io::Read>(
    gateway: &MutationGateway,
    actor: EmployeeId,
    reader: R,
    max_rows: Option<usize>,
) -> Result<usize, SeedError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let limit = max_rows.unwrap_or(usize::MAX);
    let mut added = 0usize;
    for (i, result) in rdr.deserialize::<ApplicantCsvRow>().take(limit).enumerate() {
        let line = data_line(i);
        let row = result.map_err(|source| SeedError::Csv { line, source })?;
        let input = row
            .into_input()
            .map_err(|source| SeedError::Row { line, source })?;
        let out = gateway
            .record_add(actor, input)
            .map_err(|source| SeedError::Row { line, source })?;
        debug!(line, record_key = out.record_key.0, "applicant row ingested");
        added += 1;
    }
    info!(applicants = added, "applicants loaded");
    Ok(added)
}

pub fn load_employees_file(
    gateway: &MutationGateway,
    path: &Path,
) -> Result<Vec<EmployeeId>, SeedError> {
    let file = std::fs::File::open(path).map_err(|e| SeedError::Open {
        path: path.display().to_string(),
        source: e.into(),
    })?;
    load_employees(gateway, file)
}

pub fn load_applicants_file(
    gateway: &MutationGateway,
    actor: EmployeeId,
    path: &Path,
    max_rows: Option<usize>,
) -> Result<usize, SeedError> {
    let file = std::fs::File::open(path).map_err(|e| SeedError::Open {
        path: path.display().to_string(),
        source: e.into(),
    })?;
    load_applicants(gateway, actor, file, max_rows)
}

// 1-based file line of the i-th data row; line 1 is the header.
fn data_line(i: usize) -> u64 {
    i as u64 + 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use privlog_kernel_contracts::history::Operation;
    use privlog_os::clock::ManualClock;
    use privlog_os::config::PrivlogConfig;
    use privlog_os::{AuditErrorKind, PrivlogRuntime};

    const APPLICANTS: &str = "\
Applicant_ID,Annual_Income,Applicant_Age,Work_Experience,Marital_Status,House_Ownership,Vehicle_Ownership(car),Occupation,Residence_City,Residence_State,Years_in_Current_Employment,Years_in_Current_Residence,Loan_Default_Risk
555,51000,34,9,single,rented,no,Chef,Austin,Texas,3,12,0
556,72000,41,15,married,owned,yes,Pilot,Dallas,Texas,8,4,1
557,,29,2,single,,,,Waco,Texas,1,,
";

    fn runtime() -> PrivlogRuntime {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        PrivlogRuntime::in_memory(Arc::new(clock), PrivlogConfig::mvp_v1())
    }

    #[test]
    fn applicants_go_through_record_add() {
        let rt = runtime();
        let actor = ensure_seed_actor(&rt.gateway).unwrap();
        let added = load_applicants(&rt.gateway, actor, APPLICANTS.as_bytes(), None).unwrap();
        assert_eq!(added, 3);

        let store = rt.store.lock();
        assert_eq!(store.applicant_rows().len(), 3);
        assert_eq!(store.history_rows().len(), 3);
        assert!(store
            .history_rows()
            .iter()
            .all(|e| e.operation == Operation::Add && e.actor_id == actor));
        assert_eq!(store.policy_grant_rows().len(), 3);
        drop(store);

        let sparse = rt.gateway.applicant_by_external_id(ApplicantId(557)).unwrap();
        assert_eq!(sparse.attributes.annual_income, None);
        assert_eq!(sparse.attributes.loan_default_risk, None);
        assert_eq!(sparse.attributes.residence_city.as_deref(), Some("Waco"));
        let pilot = rt.gateway.applicant_by_external_id(ApplicantId(556)).unwrap();
        assert_eq!(pilot.attributes.loan_default_risk, Some(true));
    }

    #[test]
    fn row_limit_is_honored() {
        let rt = runtime();
        let actor = ensure_seed_actor(&rt.gateway).unwrap();
        let added = load_applicants(&rt.gateway, actor, APPLICANTS.as_bytes(), Some(2)).unwrap();
        assert_eq!(added, 2);
        assert!(rt.gateway.applicant_by_external_id(ApplicantId(557)).is_err());
    }

    #[test]
    fn rejected_row_reports_line_and_keeps_earlier_rows() {
        let rt = runtime();
        let actor = ensure_seed_actor(&rt.gateway).unwrap();
        let csv = format!("{APPLICANTS}555,1,1,1,single,rented,no,Chef,Austin,Texas,1,1,0\n");
        let err = load_applicants(&rt.gateway, actor, csv.as_bytes(), None).unwrap_err();
        match err {
            SeedError::Row { source, .. } => {
                assert_eq!(source.kind(), AuditErrorKind::IntegrityViolation)
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(rt.store.lock().applicant_rows().len(), 3);
    }

    #[test]
    fn employees_file_is_loaded() {
        let rt = runtime();
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "first_name,last_name,email,phone").unwrap();
        writeln!(f, "Ada,Park,ada@bank.example,555-0100").unwrap();
        writeln!(f, "Ben,Ortiz,ben@bank.example,").unwrap();
        let ids = load_employees_file(&rt.gateway, f.path()).unwrap();
        assert_eq!(ids.len(), 2);
        let ben = rt.gateway.employee(ids[1]).unwrap();
        assert_eq!(ben.phone, None);

        let missing = load_employees_file(&rt.gateway, Path::new("/nonexistent/roster.csv"));
        assert!(matches!(missing, Err(SeedError::Open { .. })));
    }
}
