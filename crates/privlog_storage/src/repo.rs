#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use privlog_kernel_contracts::applicant::{
    ApplicantColumn, ApplicantId, ApplicantRecord, ApplicantRecordInput, ColumnValue, RecordKey,
};
use privlog_kernel_contracts::employee::{EmployeeId, EmployeeInput, EmployeeRecord};
use privlog_kernel_contracts::history::{
    ActionHistoryEntry, ActionHistoryInput, HistoryEntryId,
};
use privlog_kernel_contracts::policy::{PolicyGrant, PolicyGrantInput, PolicyId};

use crate::audit_store::{HardDeleteReport, PrivlogStore, StorageError};
use crate::history_log::HistoryRewrite;

/// Typed repository interface for `applicant_details` persistence wiring.
pub trait ApplicantDetailsRepo {
    fn insert_applicant_row(&mut self, input: ApplicantRecordInput)
        -> Result<RecordKey, StorageError>;
    fn applicant_row(&self, record_key: RecordKey) -> Option<&ApplicantRecord>;
    fn live_applicant_row_key(&self, applicant_id: ApplicantId) -> Option<RecordKey>;
    fn live_applicant_row_keys(&self) -> Vec<RecordKey>;
    fn applicant_detail_rows(&self) -> &BTreeMap<RecordKey, ApplicantRecord>;
    fn set_applicant_row_value(
        &mut self,
        record_key: RecordKey,
        column: ApplicantColumn,
        value: ColumnValue,
    ) -> Result<ColumnValue, StorageError>;
    fn mark_applicant_row_redacted(&mut self, record_key: RecordKey) -> Result<(), StorageError>;
    fn hard_delete_applicant_rows(
        &mut self,
        applicant_id: ApplicantId,
    ) -> Result<HardDeleteReport, StorageError>;
}

/// Typed repository interface for `privacy_policies` persistence wiring.
pub trait PrivacyPoliciesRepo {
    fn insert_policy_row(&mut self, input: PolicyGrantInput) -> Result<PolicyId, StorageError>;
    fn policy_row(&self, policy_id: PolicyId) -> Option<&PolicyGrant>;
    fn policy_rows(&self) -> &BTreeMap<PolicyId, PolicyGrant>;
}

/// Typed repository interface for `action_history` persistence wiring.
pub trait ActionHistoryRepo {
    fn append_history_row(&mut self, input: ActionHistoryInput)
        -> Result<HistoryEntryId, StorageError>;
    fn history_row(&self, entry_id: HistoryEntryId) -> Option<&ActionHistoryEntry>;
    fn action_history_rows(&self) -> &[ActionHistoryEntry];
    fn action_history_rows_for_record(&self, record_key: RecordKey) -> Vec<&ActionHistoryEntry>;
    fn redact_history_rows_column(
        &mut self,
        record_key: RecordKey,
        column: ApplicantColumn,
    ) -> Result<HistoryRewrite, StorageError>;
    fn redact_history_rows_column_batch(
        &mut self,
        record_keys: &BTreeSet<RecordKey>,
        column: ApplicantColumn,
    ) -> Result<HistoryRewrite, StorageError>;
}

/// Typed repository interface for `employees` persistence wiring.
pub trait EmployeesRepo {
    fn insert_employee_row(&mut self, input: EmployeeInput) -> Result<EmployeeId, StorageError>;
    fn employee_row(&self, employee_id: EmployeeId) -> Option<&EmployeeRecord>;
    fn employee_roster_rows(&self) -> &BTreeMap<EmployeeId, EmployeeRecord>;
}

impl ApplicantDetailsRepo for PrivlogStore {
    fn insert_applicant_row(
        &mut self,
        input: ApplicantRecordInput,
    ) -> Result<RecordKey, StorageError> {
        self.insert_applicant(input)
    }

    fn applicant_row(&self, record_key: RecordKey) -> Option<&ApplicantRecord> {
        self.get_applicant(record_key)
    }

    fn live_applicant_row_key(&self, applicant_id: ApplicantId) -> Option<RecordKey> {
        self.live_applicant_key(applicant_id)
    }

    fn live_applicant_row_keys(&self) -> Vec<RecordKey> {
        self.live_applicant_keys()
    }

    fn applicant_detail_rows(&self) -> &BTreeMap<RecordKey, ApplicantRecord> {
        self.applicant_rows()
    }

    fn set_applicant_row_value(
        &mut self,
        record_key: RecordKey,
        column: ApplicantColumn,
        value: ColumnValue,
    ) -> Result<ColumnValue, StorageError> {
        self.set_applicant_value(record_key, column, value)
    }

    fn mark_applicant_row_redacted(&mut self, record_key: RecordKey) -> Result<(), StorageError> {
        self.mark_applicant_redacted(record_key)
    }

    fn hard_delete_applicant_rows(
        &mut self,
        applicant_id: ApplicantId,
    ) -> Result<HardDeleteReport, StorageError> {
        self.hard_delete_applicant(applicant_id)
    }
}

impl PrivacyPoliciesRepo for PrivlogStore {
    fn insert_policy_row(&mut self, input: PolicyGrantInput) -> Result<PolicyId, StorageError> {
        self.insert_policy_grant(input)
    }

    fn policy_row(&self, policy_id: PolicyId) -> Option<&PolicyGrant> {
        self.get_policy_grant(policy_id)
    }

    fn policy_rows(&self) -> &BTreeMap<PolicyId, PolicyGrant> {
        self.policy_grant_rows()
    }
}

impl ActionHistoryRepo for PrivlogStore {
    fn append_history_row(
        &mut self,
        input: ActionHistoryInput,
    ) -> Result<HistoryEntryId, StorageError> {
        self.append_history_entry(input)
    }

    fn history_row(&self, entry_id: HistoryEntryId) -> Option<&ActionHistoryEntry> {
        self.get_history_entry(entry_id)
    }

    fn action_history_rows(&self) -> &[ActionHistoryEntry] {
        self.history_rows()
    }

    fn action_history_rows_for_record(&self, record_key: RecordKey) -> Vec<&ActionHistoryEntry> {
        self.history_rows_for_record(record_key)
    }

    fn redact_history_rows_column(
        &mut self,
        record_key: RecordKey,
        column: ApplicantColumn,
    ) -> Result<HistoryRewrite, StorageError> {
        self.redact_history_column(record_key, column)
    }

    fn redact_history_rows_column_batch(
        &mut self,
        record_keys: &BTreeSet<RecordKey>,
        column: ApplicantColumn,
    ) -> Result<HistoryRewrite, StorageError> {
        self.redact_history_column_batch(record_keys, column)
    }
}

impl EmployeesRepo for PrivlogStore {
    fn insert_employee_row(&mut self, input: EmployeeInput) -> Result<EmployeeId, StorageError> {
        self.insert_employee(input)
    }

    fn employee_row(&self, employee_id: EmployeeId) -> Option<&EmployeeRecord> {
        self.get_employee(employee_id)
    }

    fn employee_roster_rows(&self) -> &BTreeMap<EmployeeId, EmployeeRecord> {
        self.employee_rows()
    }
}
