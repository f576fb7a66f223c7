#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use privlog_kernel_contracts::applicant::{
    ApplicantColumn, ApplicantId, ApplicantRecord, ApplicantRecordInput, ColumnValue, RecordKey,
};
use privlog_kernel_contracts::employee::{EmployeeId, EmployeeInput, EmployeeRecord};
use privlog_kernel_contracts::history::{
    ActionHistoryEntry, ActionHistoryInput, HistoryEntryId, HistoryPayload,
};
use privlog_kernel_contracts::policy::{PolicyGrant, PolicyGrantInput, PolicyId};
use privlog_kernel_contracts::ContractViolation;
use thiserror::Error;
use tracing::{debug, warn};

use crate::history_log::{scrub_entries, HistoryRewrite};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("foreign key violation on {table}: {key}")]
    ForeignKeyViolation { table: &'static str, key: String },
    #[error("duplicate key in {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("{table} is append-only")]
    AppendOnlyViolation { table: &'static str },
    #[error("no row in {table} for {key}")]
    NotFound { table: &'static str, key: String },
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardDeleteReport {
    pub records_removed: usize,
    pub history_entries_removed: usize,
}

#[derive(Debug, Default)]
struct StoreTables {
    applicant_details: BTreeMap<RecordKey, ApplicantRecord>,
    // External id -> key, for non-redacted rows only.
    live_applicant_index: BTreeMap<ApplicantId, RecordKey>,
    privacy_policies: BTreeMap<PolicyId, PolicyGrant>,
    // Ordered by entry_id; removals (cascade) keep the order.
    action_history: Vec<ActionHistoryEntry>,
    employees: BTreeMap<EmployeeId, EmployeeRecord>,
    employee_email_index: BTreeSet<String>,
}

/// Inverse of one mutation made inside a transaction.
#[derive(Debug)]
enum UndoOp {
    RemoveEmployee {
        employee_id: EmployeeId,
        email_key: String,
    },
    RemovePolicyGrant(PolicyId),
    RemoveApplicant(RecordKey),
    RestoreApplicant {
        record: ApplicantRecord,
        reindex: bool,
    },
    RestoreHardDeleted {
        records: Vec<ApplicantRecord>,
        live_key: Option<RecordKey>,
        history: Vec<ActionHistoryEntry>,
    },
    RemoveHistoryEntry(HistoryEntryId),
    RestoreHistoryPayload {
        entry_id: HistoryEntryId,
        new_data: Option<HistoryPayload>,
    },
}

impl StoreTables {
    fn history_index(&self, entry_id: HistoryEntryId) -> Option<usize> {
        self.action_history
            .binary_search_by_key(&entry_id, |e| e.entry_id)
            .ok()
    }

    fn undo(&mut self, op: UndoOp) {
        match op {
            UndoOp::RemoveEmployee {
                employee_id,
                email_key,
            } => {
                self.employees.remove(&employee_id);
                self.employee_email_index.remove(&email_key);
            }
            UndoOp::RemovePolicyGrant(policy_id) => {
                self.privacy_policies.remove(&policy_id);
            }
            UndoOp::RemoveApplicant(record_key) => {
                if let Some(record) = self.applicant_details.remove(&record_key) {
                    if self.live_applicant_index.get(&record.applicant_id) == Some(&record_key) {
                        self.live_applicant_index.remove(&record.applicant_id);
                    }
                }
            }
            UndoOp::RestoreApplicant { record, reindex } => {
                if reindex {
                    self.live_applicant_index
                        .insert(record.applicant_id, record.record_key);
                }
                self.applicant_details.insert(record.record_key, record);
            }
            UndoOp::RestoreHardDeleted {
                records,
                live_key,
                history,
            } => {
                for record in records {
                    if live_key == Some(record.record_key) {
                        self.live_applicant_index
                            .insert(record.applicant_id, record.record_key);
                    }
                    self.applicant_details.insert(record.record_key, record);
                }
                self.action_history.extend(history);
                self.action_history.sort_by_key(|e| e.entry_id);
            }
            UndoOp::RemoveHistoryEntry(entry_id) => {
                if let Some(i) = self.history_index(entry_id) {
                    self.action_history.remove(i);
                }
            }
            UndoOp::RestoreHistoryPayload { entry_id, new_data } => {
                if let Some(i) = self.history_index(entry_id) {
                    self.action_history[i].new_data = new_data;
                }
            }
        }
    }
}

/// In-memory rendition of the four audit relations with their keys, foreign
/// keys and the `action_history.data_id -> applicant_details` cascade.
#[derive(Debug)]
pub struct PrivlogStore {
    tables: StoreTables,
    // Present while a transaction is open; replayed in reverse on rollback.
    journal: Option<Vec<UndoOp>>,
    // Sequences are not rolled back with a failed transaction, so surrogate
    // keys are never reused.
    next_record_key: u64,
    next_policy_id: u64,
    next_history_entry_id: u64,
    next_employee_id: u64,
}

impl Default for PrivlogStore {
    fn default() -> Self {
        Self::new_in_memory()
    }
}

impl PrivlogStore {
    pub fn new_in_memory() -> Self {
        Self {
            tables: StoreTables::default(),
            journal: None,
            next_record_key: 1,
            next_policy_id: 1,
            next_history_entry_id: 1,
            next_employee_id: 1,
        }
    }

    /// Runs `f` atomically: when it returns `Err`, every relation is restored
    /// to its state before the call. Each mutation journals its own inverse,
    /// so the cost is proportional to what `f` touched. Nested calls roll
    /// back only their own part.
    pub fn transaction<T, E>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let outermost = self.journal.is_none();
        let mark = self.journal.get_or_insert_with(Vec::new).len();
        let out = f(self);
        if out.is_err() {
            let undone = self.rollback_to(mark);
            debug!(undone, "transaction rolled back");
        }
        if outermost {
            self.journal = None;
        }
        out
    }

    fn in_transaction(&self) -> bool {
        self.journal.is_some()
    }

    fn journal_push(&mut self, op: UndoOp) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(op);
        }
    }

    fn rollback_to(&mut self, mark: usize) -> usize {
        let mut undone = 0;
        while let Some(op) = self
            .journal
            .as_mut()
            .filter(|j| j.len() > mark)
            .and_then(Vec::pop)
        {
            self.tables.undo(op);
            undone += 1;
        }
        undone
    }

    // ------------------------
    // employees
    // ------------------------

    pub fn insert_employee(&mut self, input: EmployeeInput) -> Result<EmployeeId, StorageError> {
        let email_key = input.email.trim().to_ascii_lowercase();
        if self.tables.employee_email_index.contains(&email_key) {
            return Err(StorageError::DuplicateKey {
                table: "employees.email",
                key: input.email.clone(),
            });
        }
        let employee_id = EmployeeId(self.next_employee_id);
        let record = EmployeeRecord::from_input_v1(employee_id, input)?;
        self.next_employee_id = self.next_employee_id.saturating_add(1);
        self.tables.employee_email_index.insert(email_key.clone());
        self.tables.employees.insert(employee_id, record);
        self.journal_push(UndoOp::RemoveEmployee {
            employee_id,
            email_key,
        });
        Ok(employee_id)
    }

    pub fn get_employee(&self, employee_id: EmployeeId) -> Option<&EmployeeRecord> {
        self.tables.employees.get(&employee_id)
    }

    pub fn employee_rows(&self) -> &BTreeMap<EmployeeId, EmployeeRecord> {
        &self.tables.employees
    }

    // ------------------------
    // privacy_policies (append-only)
    // ------------------------

    pub fn insert_policy_grant(
        &mut self,
        input: PolicyGrantInput,
    ) -> Result<PolicyId, StorageError> {
        let policy_id = PolicyId(self.next_policy_id);
        let grant = PolicyGrant::from_input_v1(policy_id, input)?;
        self.next_policy_id = self.next_policy_id.saturating_add(1);
        self.tables.privacy_policies.insert(policy_id, grant);
        self.journal_push(UndoOp::RemovePolicyGrant(policy_id));
        Ok(policy_id)
    }

    pub fn get_policy_grant(&self, policy_id: PolicyId) -> Option<&PolicyGrant> {
        self.tables.privacy_policies.get(&policy_id)
    }

    pub fn policy_grant_rows(&self) -> &BTreeMap<PolicyId, PolicyGrant> {
        &self.tables.privacy_policies
    }

    pub fn attempt_overwrite_policy_grant(
        &mut self,
        _policy_id: PolicyId,
    ) -> Result<(), StorageError> {
        Err(StorageError::AppendOnlyViolation {
            table: "privacy_policies",
        })
    }

    pub fn attempt_delete_policy_grant(&mut self, _policy_id: PolicyId) -> Result<(), StorageError> {
        Err(StorageError::AppendOnlyViolation {
            table: "privacy_policies",
        })
    }

    // ------------------------
    // applicant_details
    // ------------------------

    pub fn insert_applicant(
        &mut self,
        input: ApplicantRecordInput,
    ) -> Result<RecordKey, StorageError> {
        if self
            .tables
            .live_applicant_index
            .contains_key(&input.applicant_id)
        {
            return Err(StorageError::DuplicateKey {
                table: "applicant_details.applicant_id",
                key: input.applicant_id.to_string(),
            });
        }
        let record_key = RecordKey(self.next_record_key);
        let record = ApplicantRecord::from_input_v1(record_key, input)?;
        self.next_record_key = self.next_record_key.saturating_add(1);
        self.tables
            .live_applicant_index
            .insert(record.applicant_id, record_key);
        self.tables.applicant_details.insert(record_key, record);
        self.journal_push(UndoOp::RemoveApplicant(record_key));
        Ok(record_key)
    }

    pub fn get_applicant(&self, record_key: RecordKey) -> Option<&ApplicantRecord> {
        self.tables.applicant_details.get(&record_key)
    }

    /// Key of the non-redacted row carrying `applicant_id`, if any.
    pub fn live_applicant_key(&self, applicant_id: ApplicantId) -> Option<RecordKey> {
        self.tables.live_applicant_index.get(&applicant_id).copied()
    }

    pub fn live_applicant_keys(&self) -> Vec<RecordKey> {
        self.tables.live_applicant_index.values().copied().collect()
    }

    pub fn applicant_rows(&self) -> &BTreeMap<RecordKey, ApplicantRecord> {
        &self.tables.applicant_details
    }

    fn applicant_mut(&mut self, record_key: RecordKey) -> Result<&mut ApplicantRecord, StorageError> {
        self.tables
            .applicant_details
            .get_mut(&record_key)
            .ok_or_else(|| StorageError::NotFound {
                table: "applicant_details",
                key: record_key.to_string(),
            })
    }

    /// Writes one cell and returns the value it replaced.
    pub fn set_applicant_value(
        &mut self,
        record_key: RecordKey,
        column: ApplicantColumn,
        value: ColumnValue,
    ) -> Result<ColumnValue, StorageError> {
        let prior = self.prior_for_undo(record_key);
        let record = self.applicant_mut(record_key)?;
        let previous = record.value(column);
        record.attributes.set(column, value)?;
        record.row_version = record.row_version.saturating_add(1);
        if let Some(record) = prior {
            self.journal_push(UndoOp::RestoreApplicant {
                record,
                reindex: false,
            });
        }
        Ok(previous)
    }

    // Copy of the row to restore on rollback; only taken inside a transaction.
    fn prior_for_undo(&self, record_key: RecordKey) -> Option<ApplicantRecord> {
        if self.in_transaction() {
            self.tables.applicant_details.get(&record_key).cloned()
        } else {
            None
        }
    }

    pub fn mark_applicant_redacted(&mut self, record_key: RecordKey) -> Result<(), StorageError> {
        let prior = self.prior_for_undo(record_key);
        let record = self.applicant_mut(record_key)?;
        record.redacted = true;
        record.row_version = record.row_version.saturating_add(1);
        let applicant_id = record.applicant_id;
        let was_live = self.tables.live_applicant_index.get(&applicant_id) == Some(&record_key);
        if was_live {
            self.tables.live_applicant_index.remove(&applicant_id);
        }
        if let Some(record) = prior {
            self.journal_push(UndoOp::RestoreApplicant {
                record,
                reindex: was_live,
            });
        }
        Ok(())
    }

    /// Physically removes every row carrying `applicant_id`, live or redacted,
    /// and cascades to their `action_history` rows.
    pub fn hard_delete_applicant(
        &mut self,
        applicant_id: ApplicantId,
    ) -> Result<HardDeleteReport, StorageError> {
        let doomed: BTreeSet<RecordKey> = self
            .tables
            .applicant_details
            .values()
            .filter(|r| r.applicant_id == applicant_id)
            .map(|r| r.record_key)
            .collect();
        if doomed.is_empty() {
            return Err(StorageError::NotFound {
                table: "applicant_details.applicant_id",
                key: applicant_id.to_string(),
            });
        }
        let records: Vec<ApplicantRecord> = doomed
            .iter()
            .filter_map(|key| self.tables.applicant_details.remove(key))
            .collect();
        let live_key = self.tables.live_applicant_index.remove(&applicant_id);

        let (removed, kept): (Vec<ActionHistoryEntry>, Vec<ActionHistoryEntry>) =
            std::mem::take(&mut self.tables.action_history)
                .into_iter()
                .partition(|e| doomed.contains(&e.record_key));
        self.tables.action_history = kept;
        let report = HardDeleteReport {
            records_removed: records.len(),
            history_entries_removed: removed.len(),
        };
        self.journal_push(UndoOp::RestoreHardDeleted {
            records,
            live_key,
            history: removed,
        });
        warn!(
            applicant_id = applicant_id.0,
            records_removed = report.records_removed,
            history_entries_removed = report.history_entries_removed,
            "hard delete cascaded into action_history"
        );
        Ok(report)
    }

    // ------------------------
    // action_history (append-only, except column erasure)
    // ------------------------

    pub fn append_history_entry(
        &mut self,
        input: ActionHistoryInput,
    ) -> Result<HistoryEntryId, StorageError> {
        if !self.tables.privacy_policies.contains_key(&input.policy_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "action_history.policy_id",
                key: input.policy_id.to_string(),
            });
        }
        if !self.tables.employees.contains_key(&input.actor_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "action_history.entity_id",
                key: input.actor_id.to_string(),
            });
        }
        if !self
            .tables
            .applicant_details
            .contains_key(&input.record_key)
        {
            return Err(StorageError::ForeignKeyViolation {
                table: "action_history.data_id",
                key: input.record_key.to_string(),
            });
        }

        let entry_id = HistoryEntryId(self.next_history_entry_id);
        let entry = ActionHistoryEntry::from_input_v1(entry_id, input)?;
        self.next_history_entry_id = self.next_history_entry_id.saturating_add(1);
        debug!(
            entry_id = entry_id.0,
            operation = entry.operation.as_str(),
            record_key = entry.record_key.0,
            "action_history row appended"
        );
        self.tables.action_history.push(entry);
        self.journal_push(UndoOp::RemoveHistoryEntry(entry_id));
        Ok(entry_id)
    }

    pub fn get_history_entry(&self, entry_id: HistoryEntryId) -> Option<&ActionHistoryEntry> {
        self.tables
            .history_index(entry_id)
            .map(|i| &self.tables.action_history[i])
    }

    pub fn history_rows(&self) -> &[ActionHistoryEntry] {
        &self.tables.action_history
    }

    pub fn history_rows_for_record(&self, record_key: RecordKey) -> Vec<&ActionHistoryEntry> {
        self.tables
            .action_history
            .iter()
            .filter(|e| e.record_key == record_key)
            .collect()
    }

    pub fn attempt_overwrite_history_entry(
        &mut self,
        _entry_id: HistoryEntryId,
    ) -> Result<(), StorageError> {
        Err(StorageError::AppendOnlyViolation {
            table: "action_history",
        })
    }

    /// Scrubs `column` from every history payload of `record_key`. This is the
    /// single sanctioned rewrite of `action_history`.
    pub fn redact_history_column(
        &mut self,
        record_key: RecordKey,
        column: ApplicantColumn,
    ) -> Result<HistoryRewrite, StorageError> {
        if !self
            .tables
            .applicant_details
            .contains_key(&record_key)
        {
            return Err(StorageError::NotFound {
                table: "applicant_details",
                key: record_key.to_string(),
            });
        }
        let rewrite = self.scrub_history(column, |key| key == record_key);
        debug!(
            record_key = record_key.0,
            column = column.as_str(),
            snapshots_scrubbed = rewrite.snapshots_scrubbed,
            updates_nulled = rewrite.updates_nulled,
            "action_history payloads scrubbed"
        );
        Ok(rewrite)
    }

    /// Single pass over `action_history` scrubbing `column` for every key in
    /// `record_keys`. All keys must exist.
    pub fn redact_history_column_batch(
        &mut self,
        record_keys: &BTreeSet<RecordKey>,
        column: ApplicantColumn,
    ) -> Result<HistoryRewrite, StorageError> {
        if let Some(missing) = record_keys
            .iter()
            .find(|k| !self.tables.applicant_details.contains_key(k))
        {
            return Err(StorageError::NotFound {
                table: "applicant_details",
                key: missing.to_string(),
            });
        }
        let rewrite = self.scrub_history(column, |key| record_keys.contains(&key));
        debug!(
            records = record_keys.len(),
            column = column.as_str(),
            snapshots_scrubbed = rewrite.snapshots_scrubbed,
            updates_nulled = rewrite.updates_nulled,
            "action_history payloads scrubbed in one pass"
        );
        Ok(rewrite)
    }

    fn scrub_history(
        &mut self,
        column: ApplicantColumn,
        selects: impl Fn(RecordKey) -> bool,
    ) -> HistoryRewrite {
        let journal = &mut self.journal;
        scrub_entries(
            self.tables
                .action_history
                .iter_mut()
                .filter(|e| selects(e.record_key)),
            column,
            |entry_id, previous| {
                if let Some(journal) = journal.as_mut() {
                    journal.push(UndoOp::RestoreHistoryPayload {
                        entry_id,
                        new_data: previous,
                    });
                }
            },
        )
    }
}
