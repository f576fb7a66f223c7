#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::applicant::{ApplicantAttributes, ApplicantColumn, ApplicantId, ColumnValue, RecordKey};
use crate::employee::EmployeeId;
use crate::policy::PolicyId;
use crate::{ContractViolation, SchemaVersion, Validate};

pub const HISTORY_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HistoryEntryId(pub u64);

impl Validate for HistoryEntryId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "history_entry_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

impl fmt::Display for HistoryEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Add,
    Update,
    SoftDelete,
    View,
}

impl Operation {
    pub const ALLOWED: &'static str = "add, update, soft_delete, view";

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Update => "update",
            Operation::SoftDelete => "soft_delete",
            Operation::View => "view",
        }
    }

    /// Older exports spell soft delete as `delete`.
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(Operation::Add),
            "update" => Ok(Operation::Update),
            "soft_delete" | "delete" => Ok(Operation::SoftDelete),
            "view" => Ok(Operation::View),
            _ => Err(ContractViolation::InvalidEnum {
                field: "operation",
                value: raw.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of every attribute of a record, captured by `add` entries.
/// Keyed by column so a single field can be scrubbed without looking at values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub applicant_id: ApplicantId,
    pub fields: BTreeMap<ApplicantColumn, ColumnValue>,
}

impl RecordSnapshot {
    pub fn of(applicant_id: ApplicantId, attributes: &ApplicantAttributes) -> Self {
        let fields = ApplicantColumn::ALL
            .into_iter()
            .map(|c| (c, attributes.get(c)))
            .collect();
        Self {
            applicant_id,
            fields,
        }
    }

    pub fn get(&self, column: ApplicantColumn) -> Option<&ColumnValue> {
        self.fields.get(&column)
    }

    /// Replaces the captured value of `column` with the null marker.
    /// Returns true when something was actually erased.
    pub fn scrub(&mut self, column: ApplicantColumn) -> bool {
        match self.fields.get_mut(&column) {
            Some(v) if !v.is_null() => {
                *v = ColumnValue::Null;
                true
            }
            _ => false,
        }
    }

    /// Legacy delimited form: `applicant_id=555;annual_income=...;...`.
    pub fn render(&self) -> String {
        let mut out = format!("applicant_id={}", self.applicant_id);
        for (column, value) in &self.fields {
            out.push(';');
            out.push_str(column.as_str());
            out.push('=');
            out.push_str(&value.to_string());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum HistoryPayload {
    Snapshot(RecordSnapshot),
    Value(ColumnValue),
}

impl fmt::Display for HistoryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryPayload::Snapshot(s) => f.write_str(&s.render()),
            HistoryPayload::Value(v) => write!(f, "{v}"),
        }
    }
}

/// Shape rules shared by inputs and stored entries. Stored `update` entries may
/// have lost their payload to redaction; inputs may not.
fn validate_shape(
    field: &'static str,
    operation: Operation,
    new_data: &Option<HistoryPayload>,
    modified_column: Option<ApplicantColumn>,
    allow_redacted_update: bool,
) -> Result<(), ContractViolation> {
    match operation {
        Operation::Add => {
            if !matches!(new_data, Some(HistoryPayload::Snapshot(_))) {
                return Err(ContractViolation::InvalidValue {
                    field,
                    reason: "add entries must carry a record snapshot",
                });
            }
            if modified_column.is_some() {
                return Err(ContractViolation::InvalidValue {
                    field,
                    reason: "add entries must not name a modified column",
                });
            }
        }
        Operation::Update => {
            let Some(column) = modified_column else {
                return Err(ContractViolation::InvalidValue {
                    field,
                    reason: "update entries must name the modified column",
                });
            };
            match new_data {
                Some(HistoryPayload::Value(v)) => {
                    if v.is_null() {
                        return Err(ContractViolation::InvalidValue {
                            field,
                            reason: "update payload must not be the null marker",
                        });
                    }
                    v.check_for(column)?;
                }
                None if allow_redacted_update => {}
                _ => {
                    return Err(ContractViolation::InvalidValue {
                        field,
                        reason: "update entries must carry the written value",
                    })
                }
            }
        }
        Operation::SoftDelete | Operation::View => {
            if new_data.is_some() || modified_column.is_some() {
                return Err(ContractViolation::InvalidValue {
                    field,
                    reason: "view and soft_delete entries carry no payload",
                });
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionHistoryInput {
    pub schema_version: SchemaVersion,
    pub policy_id: PolicyId,
    pub actor_id: EmployeeId,
    pub record_key: RecordKey,
    pub operation: Operation,
    pub time: DateTime<Utc>,
    pub new_data: Option<HistoryPayload>,
    pub modified_column: Option<ApplicantColumn>,
}

impl ActionHistoryInput {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        policy_id: PolicyId,
        actor_id: EmployeeId,
        record_key: RecordKey,
        operation: Operation,
        time: DateTime<Utc>,
        new_data: Option<HistoryPayload>,
        modified_column: Option<ApplicantColumn>,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            schema_version: HISTORY_CONTRACT_VERSION,
            policy_id,
            actor_id,
            record_key,
            operation,
            time,
            new_data,
            modified_column,
        };
        input.validate()?;
        Ok(input)
    }

    pub fn add_v1(
        policy_id: PolicyId,
        actor_id: EmployeeId,
        record_key: RecordKey,
        time: DateTime<Utc>,
        snapshot: RecordSnapshot,
    ) -> Result<Self, ContractViolation> {
        Self::v1(
            policy_id,
            actor_id,
            record_key,
            Operation::Add,
            time,
            Some(HistoryPayload::Snapshot(snapshot)),
            None,
        )
    }

    pub fn update_v1(
        policy_id: PolicyId,
        actor_id: EmployeeId,
        record_key: RecordKey,
        time: DateTime<Utc>,
        column: ApplicantColumn,
        value: ColumnValue,
    ) -> Result<Self, ContractViolation> {
        Self::v1(
            policy_id,
            actor_id,
            record_key,
            Operation::Update,
            time,
            Some(HistoryPayload::Value(value)),
            Some(column),
        )
    }

    pub fn bare_v1(
        policy_id: PolicyId,
        actor_id: EmployeeId,
        record_key: RecordKey,
        operation: Operation,
        time: DateTime<Utc>,
    ) -> Result<Self, ContractViolation> {
        Self::v1(policy_id, actor_id, record_key, operation, time, None, None)
    }
}

impl Validate for ActionHistoryInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != HISTORY_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "action_history_input.schema_version",
                reason: "must match HISTORY_CONTRACT_VERSION",
            });
        }
        self.policy_id.validate()?;
        self.actor_id.validate()?;
        self.record_key.validate()?;
        validate_shape(
            "action_history_input",
            self.operation,
            &self.new_data,
            self.modified_column,
            false,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionHistoryEntry {
    pub schema_version: SchemaVersion,
    pub entry_id: HistoryEntryId,
    pub policy_id: PolicyId,
    pub actor_id: EmployeeId,
    pub record_key: RecordKey,
    pub operation: Operation,
    pub time: DateTime<Utc>,
    pub new_data: Option<HistoryPayload>,
    pub modified_column: Option<ApplicantColumn>,
}

impl ActionHistoryEntry {
    pub fn from_input_v1(
        entry_id: HistoryEntryId,
        input: ActionHistoryInput,
    ) -> Result<Self, ContractViolation> {
        input.validate()?;
        let e = Self {
            schema_version: HISTORY_CONTRACT_VERSION,
            entry_id,
            policy_id: input.policy_id,
            actor_id: input.actor_id,
            record_key: input.record_key,
            operation: input.operation,
            time: input.time,
            new_data: input.new_data,
            modified_column: input.modified_column,
        };
        e.validate()?;
        Ok(e)
    }

    pub fn rendered_new_data(&self) -> Option<String> {
        self.new_data.as_ref().map(|p| p.to_string())
    }
}

impl Validate for ActionHistoryEntry {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != HISTORY_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "action_history_entry.schema_version",
                reason: "must match HISTORY_CONTRACT_VERSION",
            });
        }
        self.entry_id.validate()?;
        self.policy_id.validate()?;
        self.actor_id.validate()?;
        self.record_key.validate()?;
        validate_shape(
            "action_history_entry",
            self.operation,
            &self.new_data,
            self.modified_column,
            true,
        )
    }
}
