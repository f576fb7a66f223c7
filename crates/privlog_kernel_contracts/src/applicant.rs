#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ContractViolation, SchemaVersion, Validate};

pub const APPLICANT_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Store-assigned surrogate key of an `applicant_details` row. Every foreign key
/// in the audit relations points here, never at the external applicant id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey(pub u64);

impl Validate for RecordKey {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "record_key",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External applicant identifier assigned at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicantId(pub i64);

impl ApplicantId {
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        let id = raw
            .trim()
            .parse::<i64>()
            .map_err(|_| ContractViolation::InvalidValue {
                field: "applicant_id",
                reason: "must be an integer",
            })?;
        let id = Self(id);
        id.validate()?;
        Ok(id)
    }
}

impl Validate for ApplicantId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 <= 0 {
            return Err(ContractViolation::InvalidValue {
                field: "applicant_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

impl fmt::Display for ApplicantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text { max_len: usize },
    Boolean,
}

/// Mutable attribute columns of `applicant_details`. Identifier columns
/// (`index`, `applicant_id`) and the `redacted` flag are absent:
/// they are not addressable by update or redaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ApplicantColumn {
    AnnualIncome,
    ApplicantAge,
    WorkExperience,
    MaritalStatus,
    HouseOwnership,
    VehicleOwnership,
    Occupation,
    ResidenceCity,
    ResidenceState,
    YearsInCurrentEmployment,
    YearsInCurrentResidence,
    LoanDefaultRisk,
}

impl ApplicantColumn {
    pub const ALL: [ApplicantColumn; 12] = [
        ApplicantColumn::AnnualIncome,
        ApplicantColumn::ApplicantAge,
        ApplicantColumn::WorkExperience,
        ApplicantColumn::MaritalStatus,
        ApplicantColumn::HouseOwnership,
        ApplicantColumn::VehicleOwnership,
        ApplicantColumn::Occupation,
        ApplicantColumn::ResidenceCity,
        ApplicantColumn::ResidenceState,
        ApplicantColumn::YearsInCurrentEmployment,
        ApplicantColumn::YearsInCurrentResidence,
        ApplicantColumn::LoanDefaultRisk,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicantColumn::AnnualIncome => "annual_income",
            ApplicantColumn::ApplicantAge => "applicant_age",
            ApplicantColumn::WorkExperience => "work_experience",
            ApplicantColumn::MaritalStatus => "marital_status",
            ApplicantColumn::HouseOwnership => "house_ownership",
            ApplicantColumn::VehicleOwnership => "vehicle_ownership",
            ApplicantColumn::Occupation => "occupation",
            ApplicantColumn::ResidenceCity => "residence_city",
            ApplicantColumn::ResidenceState => "residence_state",
            ApplicantColumn::YearsInCurrentEmployment => "years_in_current_employment",
            ApplicantColumn::YearsInCurrentResidence => "years_in_current_residence",
            ApplicantColumn::LoanDefaultRisk => "loan_default_risk",
        }
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            ApplicantColumn::AnnualIncome
            | ApplicantColumn::ApplicantAge
            | ApplicantColumn::WorkExperience
            | ApplicantColumn::YearsInCurrentEmployment
            | ApplicantColumn::YearsInCurrentResidence => ColumnKind::Integer,
            ApplicantColumn::MaritalStatus => ColumnKind::Text { max_len: 10 },
            ApplicantColumn::HouseOwnership => ColumnKind::Text { max_len: 15 },
            ApplicantColumn::VehicleOwnership => ColumnKind::Text { max_len: 5 },
            ApplicantColumn::Occupation => ColumnKind::Text { max_len: 40 },
            ApplicantColumn::ResidenceCity | ApplicantColumn::ResidenceState => {
                ColumnKind::Text { max_len: 50 }
            }
            ApplicantColumn::LoanDefaultRisk => ColumnKind::Boolean,
        }
    }

    /// Case-insensitive lookup by column name. The dataset header spelling
    /// `vehicle_ownership(car)` is accepted as an alias.
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        let name = raw.trim().to_ascii_lowercase();
        if name == "vehicle_ownership(car)" {
            return Ok(ApplicantColumn::VehicleOwnership);
        }
        ApplicantColumn::ALL
            .into_iter()
            .find(|c| c.as_str() == name)
            .ok_or(ContractViolation::UnknownColumn {
                column: raw.trim().to_string(),
            })
    }
}

impl fmt::Display for ApplicantColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell of `applicant_details`. `Null` is what redaction leaves behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Text(String),
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    /// Parses a raw user-supplied value for `column`. Null is never accepted
    /// here: only redaction writes nulls.
    pub fn parse_for(column: ApplicantColumn, raw: &str) -> Result<Self, ContractViolation> {
        let trimmed = raw.trim();
        let invalid = |reason: &'static str| ContractViolation::InvalidColumnValue {
            column: column.as_str(),
            value: raw.to_string(),
            reason,
        };
        if trimmed.eq_ignore_ascii_case("null") {
            return Err(invalid("null is only written by redaction"));
        }
        let value = match column.kind() {
            ColumnKind::Integer => ColumnValue::Integer(
                trimmed
                    .parse::<i64>()
                    .map_err(|_| invalid("must be an integer"))?,
            ),
            ColumnKind::Text { .. } => ColumnValue::Text(trimmed.to_string()),
            ColumnKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => ColumnValue::Boolean(true),
                "false" | "0" | "no" => ColumnValue::Boolean(false),
                _ => return Err(invalid("must be a boolean")),
            },
        };
        value.check_for(column)?;
        Ok(value)
    }

    /// Type and bound check of this value against `column`. Null always passes.
    pub fn check_for(&self, column: ApplicantColumn) -> Result<(), ContractViolation> {
        let invalid = |reason: &'static str| ContractViolation::InvalidColumnValue {
            column: column.as_str(),
            value: self.to_string(),
            reason,
        };
        match (column.kind(), self) {
            (_, ColumnValue::Null) => Ok(()),
            (ColumnKind::Integer, ColumnValue::Integer(v)) => {
                if *v < 0 {
                    return Err(invalid("must be >= 0"));
                }
                Ok(())
            }
            (ColumnKind::Text { max_len }, ColumnValue::Text(s)) => {
                if s.trim().is_empty() {
                    return Err(invalid("must not be empty"));
                }
                if s.chars().count() > max_len {
                    return Err(invalid("exceeds max length"));
                }
                Ok(())
            }
            (ColumnKind::Boolean, ColumnValue::Boolean(_)) => Ok(()),
            _ => Err(invalid("type does not match column")),
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            ColumnValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    fn as_boolean(&self) -> Option<bool> {
        match self {
            ColumnValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    fn into_text(self) -> Option<String> {
        match self {
            ColumnValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Null => f.write_str("NULL"),
            ColumnValue::Boolean(v) => write!(f, "{v}"),
            ColumnValue::Integer(v) => write!(f, "{v}"),
            ColumnValue::Text(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantAttributes {
    pub annual_income: Option<i64>,
    pub applicant_age: Option<i64>,
    pub work_experience: Option<i64>,
    pub marital_status: Option<String>,
    pub house_ownership: Option<String>,
    pub vehicle_ownership: Option<String>,
    pub occupation: Option<String>,
    pub residence_city: Option<String>,
    pub residence_state: Option<String>,
    pub years_in_current_employment: Option<i64>,
    pub years_in_current_residence: Option<i64>,
    pub loan_default_risk: Option<bool>,
}

fn integer_cell(v: Option<i64>) -> ColumnValue {
    v.map(ColumnValue::Integer).unwrap_or(ColumnValue::Null)
}

fn text_cell(v: &Option<String>) -> ColumnValue {
    v.clone().map(ColumnValue::Text).unwrap_or(ColumnValue::Null)
}

impl ApplicantAttributes {
    pub fn get(&self, column: ApplicantColumn) -> ColumnValue {
        match column {
            ApplicantColumn::AnnualIncome => integer_cell(self.annual_income),
            ApplicantColumn::ApplicantAge => integer_cell(self.applicant_age),
            ApplicantColumn::WorkExperience => integer_cell(self.work_experience),
            ApplicantColumn::MaritalStatus => text_cell(&self.marital_status),
            ApplicantColumn::HouseOwnership => text_cell(&self.house_ownership),
            ApplicantColumn::VehicleOwnership => text_cell(&self.vehicle_ownership),
            ApplicantColumn::Occupation => text_cell(&self.occupation),
            ApplicantColumn::ResidenceCity => text_cell(&self.residence_city),
            ApplicantColumn::ResidenceState => text_cell(&self.residence_state),
            ApplicantColumn::YearsInCurrentEmployment => {
                integer_cell(self.years_in_current_employment)
            }
            ApplicantColumn::YearsInCurrentResidence => integer_cell(self.years_in_current_residence),
            ApplicantColumn::LoanDefaultRisk => self
                .loan_default_risk
                .map(ColumnValue::Boolean)
                .unwrap_or(ColumnValue::Null),
        }
    }

    pub fn set(
        &mut self,
        column: ApplicantColumn,
        value: ColumnValue,
    ) -> Result<(), ContractViolation> {
        value.check_for(column)?;
        match column {
            ApplicantColumn::AnnualIncome => self.annual_income = value.as_integer(),
            ApplicantColumn::ApplicantAge => self.applicant_age = value.as_integer(),
            ApplicantColumn::WorkExperience => self.work_experience = value.as_integer(),
            ApplicantColumn::MaritalStatus => self.marital_status = value.into_text(),
            ApplicantColumn::HouseOwnership => self.house_ownership = value.into_text(),
            ApplicantColumn::VehicleOwnership => self.vehicle_ownership = value.into_text(),
            ApplicantColumn::Occupation => self.occupation = value.into_text(),
            ApplicantColumn::ResidenceCity => self.residence_city = value.into_text(),
            ApplicantColumn::ResidenceState => self.residence_state = value.into_text(),
            ApplicantColumn::YearsInCurrentEmployment => {
                self.years_in_current_employment = value.as_integer()
            }
            ApplicantColumn::YearsInCurrentResidence => {
                self.years_in_current_residence = value.as_integer()
            }
            ApplicantColumn::LoanDefaultRisk => self.loan_default_risk = value.as_boolean(),
        }
        Ok(())
    }
}

impl Validate for ApplicantAttributes {
    fn validate(&self) -> Result<(), ContractViolation> {
        for column in ApplicantColumn::ALL {
            self.get(column).check_for(column)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantRecordInput {
    pub schema_version: SchemaVersion,
    pub applicant_id: ApplicantId,
    pub attributes: ApplicantAttributes,
}

impl ApplicantRecordInput {
    pub fn v1(
        applicant_id: ApplicantId,
        attributes: ApplicantAttributes,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            schema_version: APPLICANT_CONTRACT_VERSION,
            applicant_id,
            attributes,
        };
        input.validate()?;
        Ok(input)
    }
}

impl Validate for ApplicantRecordInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != APPLICANT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "applicant_record_input.schema_version",
                reason: "must match APPLICANT_CONTRACT_VERSION",
            });
        }
        self.applicant_id.validate()?;
        self.attributes.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantRecord {
    pub schema_version: SchemaVersion,
    pub record_key: RecordKey,
    pub applicant_id: ApplicantId,
    pub attributes: ApplicantAttributes,
    pub redacted: bool,
    /// Bumped on every mutation of the row; starts at 1.
    pub row_version: u64,
}

impl ApplicantRecord {
    pub fn from_input_v1(
        record_key: RecordKey,
        input: ApplicantRecordInput,
    ) -> Result<Self, ContractViolation> {
        input.validate()?;
        let r = Self {
            schema_version: APPLICANT_CONTRACT_VERSION,
            record_key,
            applicant_id: input.applicant_id,
            attributes: input.attributes,
            redacted: false,
            row_version: 1,
        };
        r.validate()?;
        Ok(r)
    }

    pub fn value(&self, column: ApplicantColumn) -> ColumnValue {
        self.attributes.get(column)
    }
}

impl Validate for ApplicantRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != APPLICANT_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "applicant_record.schema_version",
                reason: "must match APPLICANT_CONTRACT_VERSION",
            });
        }
        self.record_key.validate()?;
        self.applicant_id.validate()?;
        if self.row_version == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "applicant_record.row_version",
                reason: "must be > 0",
            });
        }
        self.attributes.validate()
    }
}
