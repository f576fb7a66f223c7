#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use privlog_kernel_contracts::applicant::{ApplicantColumn, ColumnValue, RecordKey};
use privlog_storage::audit_store::PrivlogStore;
use privlog_storage::history_log::HistoryRewrite;
use privlog_storage::repo::{ActionHistoryRepo, ApplicantDetailsRepo};
use tracing::info;

use crate::config::PrivlogConfig;
use crate::error::{AuditError, AuditResult};
use crate::SharedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// One transaction per key.
    Sequential,
    /// Chunks of `redaction_chunk_size` keys, one transaction and one history
    /// pass per chunk.
    Batched,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionOutcome {
    pub record_key: RecordKey,
    pub column: ApplicantColumn,
    /// Value held before the call; `Null` when it was already erased.
    pub previous: ColumnValue,
    pub history: HistoryRewrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRedactionOutcome {
    pub column: ApplicantColumn,
    pub records: usize,
    pub transactions: usize,
    pub history: HistoryRewrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRedactionOutcome {
    pub record_key: RecordKey,
    pub columns_cleared: usize,
    pub history: HistoryRewrite,
}

/// Column- and row-level erasure across `applicant_details` and the history
/// payloads that captured the erased values. Appends no history itself.
#[derive(Clone)]
pub struct RedactionEngine {
    store: SharedStore,
    config: PrivlogConfig,
}

impl RedactionEngine {
    pub fn new(store: SharedStore, config: PrivlogConfig) -> Self {
        Self { store, config }
    }

    pub fn redact_column(
        &self,
        column: ApplicantColumn,
        record_key: RecordKey,
    ) -> AuditResult<RedactionOutcome> {
        let mut store = self.store.lock();
        let (previous, history) = store.transaction(|tx| {
            let previous = erase_cell(tx, record_key, column)?;
            let history = tx.redact_history_rows_column(record_key, column)?;
            Ok::<_, AuditError>((previous, history))
        })?;
        info!(
            record_key = record_key.0,
            column = column.as_str(),
            history_rewrites = history.total(),
            "column redacted"
        );
        Ok(RedactionOutcome {
            record_key,
            column,
            previous,
            history,
        })
    }

    pub fn redact_column_named(
        &self,
        column: &str,
        record_key: RecordKey,
    ) -> AuditResult<RedactionOutcome> {
        self.redact_column(ApplicantColumn::parse(column)?, record_key)
    }

    /// Both modes leave the same final state. Every key is checked before
    /// anything is erased.
    pub fn batch_redact(
        &self,
        column: ApplicantColumn,
        record_keys: &[RecordKey],
        mode: BatchMode,
    ) -> AuditResult<BatchRedactionOutcome> {
        let mut store = self.store.lock();
        if let Some(missing) = record_keys
            .iter()
            .find(|k| store.applicant_row(**k).is_none())
        {
            return Err(AuditError::not_found("applicant_details", missing));
        }

        let unique: BTreeSet<RecordKey> = record_keys.iter().copied().collect();
        let mut history = HistoryRewrite::default();
        let mut transactions = 0usize;
        match mode {
            BatchMode::Sequential => {
                for &key in record_keys {
                    let rewrite = store.transaction(|tx| {
                        erase_cell(tx, key, column)?;
                        Ok::<_, AuditError>(tx.redact_history_rows_column(key, column)?)
                    })?;
                    history.absorb(rewrite);
                    transactions += 1;
                }
            }
            BatchMode::Batched => {
                let keys: Vec<RecordKey> = unique.iter().copied().collect();
                for chunk in keys.chunks(self.config.redaction_chunk_size.max(1)) {
                    let chunk: BTreeSet<RecordKey> = chunk.iter().copied().collect();
                    let rewrite = store.transaction(|tx| {
                        for &key in &chunk {
                            erase_cell(tx, key, column)?;
                        }
                        Ok::<_, AuditError>(tx.redact_history_rows_column_batch(&chunk, column)?)
                    })?;
                    history.absorb(rewrite);
                    transactions += 1;
                }
            }
        }
        info!(
            column = column.as_str(),
            records = unique.len(),
            transactions,
            history_rewrites = history.total(),
            ?mode,
            "batch redaction applied"
        );
        Ok(BatchRedactionOutcome {
            column,
            records: unique.len(),
            transactions,
            history,
        })
    }

    /// Row-level erasure: every attribute column and every history payload
    /// of the record. The external id and the `redacted` flag are kept.
    pub fn redact_record(&self, record_key: RecordKey) -> AuditResult<RowRedactionOutcome> {
        let mut store = self.store.lock();
        let (columns_cleared, history) = store.transaction(|tx| {
            let mut cleared = 0usize;
            let mut history = HistoryRewrite::default();
            for column in ApplicantColumn::ALL {
                if !erase_cell(tx, record_key, column)?.is_null() {
                    cleared += 1;
                }
                history.absorb(tx.redact_history_rows_column(record_key, column)?);
            }
            Ok::<_, AuditError>((cleared, history))
        })?;
        info!(
            record_key = record_key.0,
            columns_cleared,
            history_rewrites = history.total(),
            "record redacted"
        );
        Ok(RowRedactionOutcome {
            record_key,
            columns_cleared,
            history,
        })
    }
}

/// Nulls one cell and returns what it held. An already-null cell is left
/// alone so the row version only moves when something is erased.
fn erase_cell(
    store: &mut PrivlogStore,
    record_key: RecordKey,
    column: ApplicantColumn,
) -> AuditResult<ColumnValue> {
    let current = store
        .applicant_row(record_key)
        .map(|r| r.value(column))
        .ok_or_else(|| AuditError::not_found("applicant_details", record_key))?;
    if current.is_null() {
        return Ok(current);
    }
    Ok(store.set_applicant_row_value(record_key, column, ColumnValue::Null)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use privlog_kernel_contracts::applicant::{ApplicantAttributes, ApplicantId, ApplicantRecordInput};
    use privlog_kernel_contracts::employee::EmployeeInput;

    use crate::clock::ManualClock;
    use crate::error::AuditErrorKind;
    use crate::PrivlogRuntime;

    fn runtime(chunk: usize) -> PrivlogRuntime {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        PrivlogRuntime::in_memory(
            Arc::new(clock),
            PrivlogConfig {
                redaction_chunk_size: chunk,
                ..PrivlogConfig::mvp_v1()
            },
        )
    }

    fn seed(rt: &PrivlogRuntime, n: i64) -> Vec<RecordKey> {
        let actor = rt
            .gateway
            .register_employee(EmployeeInput::v1("Ada", "Park", "ada@bank.example", None).unwrap())
            .unwrap();
        (1..=n)
            .map(|id| {
                let attrs = ApplicantAttributes {
                    occupation: Some(format!("Job{id}")),
                    ..Default::default()
                };
                rt.gateway
                    .record_add(actor, ApplicantRecordInput::v1(ApplicantId(id), attrs).unwrap())
                    .unwrap()
                    .record_key
            })
            .collect()
    }

    #[test]
    fn batched_mode_uses_one_transaction_per_chunk() {
        let rt = runtime(2);
        let keys = seed(&rt, 5);
        let out = rt
            .redaction
            .batch_redact(ApplicantColumn::Occupation, &keys, BatchMode::Batched)
            .unwrap();
        assert_eq!(out.records, 5);
        assert_eq!(out.transactions, 3);
        assert_eq!(out.history.snapshots_scrubbed, 5);
    }

    #[test]
    fn missing_key_fails_whole_batch_before_any_erasure() {
        let rt = runtime(256);
        let mut keys = seed(&rt, 2);
        keys.push(RecordKey(99));
        for mode in [BatchMode::Sequential, BatchMode::Batched] {
            let err = rt
                .redaction
                .batch_redact(ApplicantColumn::Occupation, &keys, mode)
                .unwrap_err();
            assert_eq!(err.kind(), AuditErrorKind::NotFound);
        }
        let first = rt.gateway.applicant(keys[0]).unwrap();
        assert_eq!(first.attributes.occupation.as_deref(), Some("Job1"));
    }

    #[test]
    fn erase_cell_keeps_version_when_already_null() {
        let rt = runtime(256);
        let keys = seed(&rt, 1);
        let first = rt
            .redaction
            .redact_column(ApplicantColumn::Occupation, keys[0])
            .unwrap();
        assert_eq!(first.previous, ColumnValue::Text("Job1".to_string()));
        let v = rt.gateway.applicant(keys[0]).unwrap().row_version;
        let second = rt
            .redaction
            .redact_column(ApplicantColumn::Occupation, keys[0])
            .unwrap();
        assert!(second.previous.is_null());
        assert_eq!(second.history.total(), 0);
        assert_eq!(rt.gateway.applicant(keys[0]).unwrap().row_version, v);
    }
}
