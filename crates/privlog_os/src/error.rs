#![forbid(unsafe_code)]

//! Error taxonomy surfaced by the policy ledger, the gateway and the
//! redaction engine.

use privlog_kernel_contracts::applicant::RecordKey;
use privlog_kernel_contracts::ContractViolation;
use privlog_storage::audit_store::StorageError;
use thiserror::Error;

pub type AuditResult<T> = Result<T, AuditError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditErrorKind {
    InvalidEnum,
    UnknownColumn,
    InvalidValue,
    NotFound,
    NoDataAvailable,
    IntegrityViolation,
    VersionConflict,
}

impl AuditErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditErrorKind::InvalidEnum => "invalid_enum",
            AuditErrorKind::UnknownColumn => "unknown_column",
            AuditErrorKind::InvalidValue => "invalid_value",
            AuditErrorKind::NotFound => "not_found",
            AuditErrorKind::NoDataAvailable => "no_data_available",
            AuditErrorKind::IntegrityViolation => "integrity_violation",
            AuditErrorKind::VersionConflict => "version_conflict",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    /// Role, purpose or operation outside its closed set.
    #[error("{field} must be one of [{allowed}], got '{value}'")]
    InvalidEnum {
        field: &'static str,
        value: String,
        allowed: &'static str,
    },

    /// Column name that is not a mutable applicant attribute.
    #[error("unknown column '{column}'")]
    UnknownColumn { column: String },

    /// Known column or field with a value of the wrong type or out of bounds.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Random selection over an empty (or fully redacted) table.
    #[error("no data available in {table}")]
    NoDataAvailable { table: &'static str },

    /// A store-level constraint (foreign key, uniqueness, append-only) or an
    /// inconsistent record reference.
    #[error("integrity violation: {detail}")]
    IntegrityViolation { detail: String },

    #[error("record {record_key} is at version {actual}, expected {expected}")]
    VersionConflict {
        record_key: RecordKey,
        expected: u64,
        actual: u64,
    },
}

impl AuditError {
    pub fn kind(&self) -> AuditErrorKind {
        match self {
            AuditError::InvalidEnum { .. } => AuditErrorKind::InvalidEnum,
            AuditError::UnknownColumn { .. } => AuditErrorKind::UnknownColumn,
            AuditError::InvalidValue { .. } => AuditErrorKind::InvalidValue,
            AuditError::NotFound { .. } => AuditErrorKind::NotFound,
            AuditError::NoDataAvailable { .. } => AuditErrorKind::NoDataAvailable,
            AuditError::IntegrityViolation { .. } => AuditErrorKind::IntegrityViolation,
            AuditError::VersionConflict { .. } => AuditErrorKind::VersionConflict,
        }
    }

    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        AuditError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

impl From<ContractViolation> for AuditError {
    fn from(v: ContractViolation) -> Self {
        match v {
            ContractViolation::InvalidEnum {
                field,
                value,
                allowed,
            } => AuditError::InvalidEnum {
                field,
                value,
                allowed,
            },
            ContractViolation::UnknownColumn { column } => AuditError::UnknownColumn { column },
            ContractViolation::InvalidColumnValue {
                column,
                value,
                reason,
            } => AuditError::InvalidValue {
                field: column.to_string(),
                reason: format!("'{value}' {reason}"),
            },
            ContractViolation::InvalidValue { field, reason } => AuditError::InvalidValue {
                field: field.to_string(),
                reason: reason.to_string(),
            },
        }
    }
}

impl From<StorageError> for AuditError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { table, key } => AuditError::NotFound { entity: table, key },
            StorageError::ContractViolation(v) => v.into(),
            other @ (StorageError::ForeignKeyViolation { .. }
            | StorageError::DuplicateKey { .. }
            | StorageError::AppendOnlyViolation { .. }) => AuditError::IntegrityViolation {
                detail: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_onto_taxonomy() {
        let e: AuditError = StorageError::DuplicateKey {
            table: "applicant_details.applicant_id",
            key: "555".to_string(),
        }
        .into();
        assert_eq!(e.kind(), AuditErrorKind::IntegrityViolation);
        assert!(e.to_string().contains("555"));

        let e: AuditError = StorageError::ContractViolation(ContractViolation::UnknownColumn {
            column: "index".to_string(),
        })
        .into();
        assert_eq!(e.kind(), AuditErrorKind::UnknownColumn);

        let e: AuditError = StorageError::NotFound {
            table: "applicant_details",
            key: "9".to_string(),
        }
        .into();
        assert_eq!(e, AuditError::not_found("applicant_details", 9));
    }
}
