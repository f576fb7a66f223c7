#![forbid(unsafe_code)]

use privlog_kernel_contracts::applicant::{
    ApplicantColumn, ApplicantId, ApplicantRecord, ApplicantRecordInput, ColumnValue, RecordKey,
};
use privlog_kernel_contracts::employee::{EmployeeId, EmployeeInput, EmployeeRecord};
use privlog_kernel_contracts::history::{
    ActionHistoryEntry, ActionHistoryInput, HistoryEntryId, Operation, RecordSnapshot,
};
use privlog_kernel_contracts::policy::{PolicyGrant, PolicyId, Purpose, Role};
use privlog_storage::audit_store::{HardDeleteReport, PrivlogStore};
use privlog_storage::repo::{
    ActionHistoryRepo, ApplicantDetailsRepo, EmployeesRepo, PrivacyPoliciesRepo,
};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, warn};

use crate::error::{AuditError, AuditResult};
use crate::policy_ledger::{insert_grant, PolicyLedger};
use crate::SharedStore;

/// How a caller names the applicant row it wants to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRef {
    /// The live (non-redacted) row carrying this external id.
    ApplicantId(ApplicantId),
    /// Any row, by surrogate key.
    Key(RecordKey),
    /// Both; they must name the same row.
    Pinned {
        applicant_id: ApplicantId,
        key: RecordKey,
    },
}

impl From<ApplicantId> for RecordRef {
    fn from(id: ApplicantId) -> Self {
        RecordRef::ApplicantId(id)
    }
}

impl From<RecordKey> for RecordRef {
    fn from(key: RecordKey) -> Self {
        RecordRef::Key(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    pub record_key: RecordKey,
    pub policy_id: PolicyId,
    pub entry_id: HistoryEntryId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub record_key: RecordKey,
    pub policy_id: PolicyId,
    pub entry_id: HistoryEntryId,
    pub column: ApplicantColumn,
    pub previous: ColumnValue,
    pub value: ColumnValue,
    pub row_version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewOutcome {
    pub entry_id: HistoryEntryId,
    pub record: ApplicantRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftDeleteOutcome {
    pub record_key: RecordKey,
    pub policy_id: PolicyId,
    pub entry_id: HistoryEntryId,
}

/// Single entry point for audited changes to applicant data. Every operation
/// creates (or checks) a grant, mutates the store and appends exactly one
/// history entry inside one store transaction.
#[derive(Clone)]
pub struct MutationGateway {
    store: SharedStore,
    ledger: PolicyLedger,
}

impl MutationGateway {
    pub fn new(store: SharedStore, ledger: PolicyLedger) -> Self {
        Self { store, ledger }
    }

    pub fn record_add(
        &self,
        actor: EmployeeId,
        input: ApplicantRecordInput,
    ) -> AuditResult<AddOutcome> {
        let now = self.ledger.now();
        let grant = self
            .ledger
            .grant_input(Role::LoanOfficer, Purpose::Onboarding, Some(now), None)?;
        let snapshot = RecordSnapshot::of(input.applicant_id, &input.attributes);

        let mut store = self.store.lock();
        let out = store.transaction(|tx| {
            let policy_id = insert_grant(tx, grant)?;
            require_actor(tx, actor)?;
            let record_key = tx.insert_applicant_row(input)?;
            let entry_id = tx.append_history_row(ActionHistoryInput::add_v1(
                policy_id, actor, record_key, now, snapshot,
            )?)?;
            Ok::<_, AuditError>(AddOutcome {
                record_key,
                policy_id,
                entry_id,
            })
        })?;
        info!(
            record_key = out.record_key.0,
            entry_id = out.entry_id.0,
            actor = actor.0,
            "applicant added"
        );
        Ok(out)
    }

    /// Parses `column` and `raw_value` for the column's type before touching
    /// the store.
    pub fn record_update(
        &self,
        actor: EmployeeId,
        target: impl Into<RecordRef>,
        column: &str,
        raw_value: &str,
    ) -> AuditResult<UpdateOutcome> {
        let column = ApplicantColumn::parse(column)?;
        let value = ColumnValue::parse_for(column, raw_value)?;
        self.apply_update(actor, target.into(), column, value, None)
    }

    /// As [`MutationGateway::record_update`], failing with `VersionConflict`
    /// unless the row is still at `expected_version`.
    pub fn record_update_checked(
        &self,
        actor: EmployeeId,
        target: impl Into<RecordRef>,
        column: &str,
        raw_value: &str,
        expected_version: u64,
    ) -> AuditResult<UpdateOutcome> {
        let column = ApplicantColumn::parse(column)?;
        let value = ColumnValue::parse_for(column, raw_value)?;
        self.apply_update(actor, target.into(), column, value, Some(expected_version))
    }

    /// Typed form of [`MutationGateway::record_update`].
    pub fn record_update_value(
        &self,
        actor: EmployeeId,
        target: impl Into<RecordRef>,
        column: ApplicantColumn,
        value: ColumnValue,
    ) -> AuditResult<UpdateOutcome> {
        if value.is_null() {
            return Err(AuditError::InvalidValue {
                field: column.as_str().to_string(),
                reason: "null is only written by redaction".to_string(),
            });
        }
        value.check_for(column)?;
        self.apply_update(actor, target.into(), column, value, None)
    }

    fn apply_update(
        &self,
        actor: EmployeeId,
        target: RecordRef,
        column: ApplicantColumn,
        value: ColumnValue,
        expected_version: Option<u64>,
    ) -> AuditResult<UpdateOutcome> {
        let now = self.ledger.now();
        let grant = self
            .ledger
            .grant_input(Role::LoanOfficer, Purpose::Audit, Some(now), None)?;

        let mut store = self.store.lock();
        let out = store.transaction(|tx| {
            let record_key = resolve_target(tx, target)?;
            if let Some(expected) = expected_version {
                let actual = tx
                    .applicant_row(record_key)
                    .map(|r| r.row_version)
                    .unwrap_or_default();
                if actual != expected {
                    return Err(AuditError::VersionConflict {
                        record_key,
                        expected,
                        actual,
                    });
                }
            }
            let policy_id = insert_grant(tx, grant)?;
            require_actor(tx, actor)?;
            let previous = tx.set_applicant_row_value(record_key, column, value.clone())?;
            let entry_id = tx.append_history_row(ActionHistoryInput::update_v1(
                policy_id,
                actor,
                record_key,
                now,
                column,
                value.clone(),
            )?)?;
            let row_version = tx
                .applicant_row(record_key)
                .map(|r| r.row_version)
                .unwrap_or_default();
            Ok::<_, AuditError>(UpdateOutcome {
                record_key,
                policy_id,
                entry_id,
                column,
                previous,
                value,
                row_version,
            })
        })?;
        info!(
            record_key = out.record_key.0,
            column = column.as_str(),
            entry_id = out.entry_id.0,
            actor = actor.0,
            "applicant updated"
        );
        Ok(out)
    }

    /// Audited read under a grant the caller already holds. Purpose is not
    /// checked against the grant.
    pub fn record_view(
        &self,
        policy_id: PolicyId,
        actor: EmployeeId,
        record_key: RecordKey,
    ) -> AuditResult<ViewOutcome> {
        let now = self.ledger.now();
        let mut store = self.store.lock();
        store.transaction(|tx| {
            if tx.policy_row(policy_id).is_none() {
                return Err(AuditError::not_found("privacy_policies", policy_id));
            }
            require_actor(tx, actor)?;
            let record = tx
                .applicant_row(record_key)
                .cloned()
                .ok_or_else(|| AuditError::not_found("applicant_details", record_key))?;
            let entry_id = tx.append_history_row(ActionHistoryInput::bare_v1(
                policy_id,
                actor,
                record_key,
                Operation::View,
                now,
            )?)?;
            Ok(ViewOutcome { entry_id, record })
        })
    }

    /// Marks the row redacted; the row and its history stay.
    pub fn record_soft_delete(
        &self,
        actor: EmployeeId,
        record_key: RecordKey,
    ) -> AuditResult<SoftDeleteOutcome> {
        let now = self.ledger.now();
        let grant = self
            .ledger
            .grant_input(Role::LoanManager, Purpose::Approval, Some(now), None)?;
        let mut store = self.store.lock();
        let out = store.transaction(|tx| {
            let policy_id = insert_grant(tx, grant)?;
            require_actor(tx, actor)?;
            tx.mark_applicant_row_redacted(record_key)?;
            let entry_id = tx.append_history_row(ActionHistoryInput::bare_v1(
                policy_id,
                actor,
                record_key,
                Operation::SoftDelete,
                now,
            )?)?;
            Ok::<_, AuditError>(SoftDeleteOutcome {
                record_key,
                policy_id,
                entry_id,
            })
        })?;
        info!(
            record_key = record_key.0,
            entry_id = out.entry_id.0,
            actor = actor.0,
            "applicant soft-deleted"
        );
        Ok(out)
    }

    /// Administrative physical delete of every row carrying `applicant_id`,
    /// cascading into their history. Leaves no history entry of its own.
    pub fn hard_delete_cascading(&self, applicant_id: ApplicantId) -> AuditResult<HardDeleteReport> {
        let mut store = self.store.lock();
        let report = store.transaction(|tx| tx.hard_delete_applicant_rows(applicant_id))?;
        warn!(
            applicant_id = applicant_id.0,
            records_removed = report.records_removed,
            history_entries_removed = report.history_entries_removed,
            "applicant hard-deleted"
        );
        Ok(report)
    }

    /// Employees are referenced by history, not audited themselves.
    pub fn register_employee(&self, input: EmployeeInput) -> AuditResult<EmployeeId> {
        Ok(self.store.lock().insert_employee_row(input)?)
    }

    pub fn random_applicant(&self) -> AuditResult<ApplicantRecord> {
        self.random_applicant_with(&mut rand::thread_rng())
    }

    /// Uniform pick among non-redacted rows.
    pub fn random_applicant_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> AuditResult<ApplicantRecord> {
        let store = self.store.lock();
        let keys = store.live_applicant_row_keys();
        keys.choose(rng)
            .and_then(|k| store.applicant_row(*k))
            .cloned()
            .ok_or(AuditError::NoDataAvailable {
                table: "applicant_details",
            })
    }

    pub fn random_employee(&self) -> AuditResult<EmployeeRecord> {
        self.random_employee_with(&mut rand::thread_rng())
    }

    pub fn random_employee_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> AuditResult<EmployeeRecord> {
        let store = self.store.lock();
        let rows: Vec<&EmployeeRecord> = store.employee_roster_rows().values().collect();
        rows.choose(rng)
            .map(|e| (*e).clone())
            .ok_or(AuditError::NoDataAvailable { table: "employees" })
    }

    // Unaudited reads.

    pub fn applicant(&self, record_key: RecordKey) -> AuditResult<ApplicantRecord> {
        self.store
            .lock()
            .applicant_row(record_key)
            .cloned()
            .ok_or_else(|| AuditError::not_found("applicant_details", record_key))
    }

    pub fn applicant_by_external_id(&self, applicant_id: ApplicantId) -> AuditResult<ApplicantRecord> {
        let store = self.store.lock();
        store
            .live_applicant_row_key(applicant_id)
            .and_then(|k| store.applicant_row(k))
            .cloned()
            .ok_or_else(|| AuditError::not_found("applicant_details.applicant_id", applicant_id))
    }

    pub fn resolve(&self, target: impl Into<RecordRef>) -> AuditResult<RecordKey> {
        resolve_target(&self.store.lock(), target.into())
    }

    pub fn history_for(&self, record_key: RecordKey) -> Vec<ActionHistoryEntry> {
        self.store
            .lock()
            .action_history_rows_for_record(record_key)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn policy(&self, policy_id: PolicyId) -> AuditResult<PolicyGrant> {
        self.ledger.get(policy_id)
    }

    pub fn employee(&self, employee_id: EmployeeId) -> AuditResult<EmployeeRecord> {
        self.store
            .lock()
            .employee_row(employee_id)
            .cloned()
            .ok_or_else(|| AuditError::not_found("employees", employee_id))
    }
}

fn require_actor(store: &PrivlogStore, actor: EmployeeId) -> AuditResult<()> {
    if store.employee_row(actor).is_none() {
        return Err(AuditError::not_found("employees", actor));
    }
    Ok(())
}

fn resolve_target(store: &PrivlogStore, target: RecordRef) -> AuditResult<RecordKey> {
    match target {
        RecordRef::ApplicantId(id) => store
            .live_applicant_row_key(id)
            .ok_or_else(|| AuditError::not_found("applicant_details.applicant_id", id)),
        RecordRef::Key(key) => store
            .applicant_row(key)
            .map(|r| r.record_key)
            .ok_or_else(|| AuditError::not_found("applicant_details", key)),
        RecordRef::Pinned { applicant_id, key } => {
            let row = store
                .applicant_row(key)
                .ok_or_else(|| AuditError::not_found("applicant_details", key))?;
            if row.applicant_id != applicant_id {
                return Err(AuditError::IntegrityViolation {
                    detail: format!(
                        "record {key} carries applicant_id {}, not {applicant_id}",
                        row.applicant_id
                    ),
                });
            }
            Ok(key)
        }
    }
}
