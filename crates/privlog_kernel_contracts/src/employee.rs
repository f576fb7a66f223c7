#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::{validate_bounded_text, validate_opt_text};
use crate::{ContractViolation, SchemaVersion, Validate};

pub const EMPLOYEE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EmployeeId(pub u64);

impl Validate for EmployeeId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "employee_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeInput {
    pub schema_version: SchemaVersion,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl EmployeeInput {
    pub fn v1(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        phone: Option<String>,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            schema_version: EMPLOYEE_CONTRACT_VERSION,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            phone,
        };
        input.validate()?;
        Ok(input)
    }
}

fn validate_contact_fields(
    first_name: &str,
    last_name: &str,
    email: &str,
    phone: &Option<String>,
) -> Result<(), ContractViolation> {
    validate_bounded_text("employee.first_name", first_name, 50)?;
    validate_bounded_text("employee.last_name", last_name, 50)?;
    validate_bounded_text("employee.email", email, 100)?;
    if !email.contains('@') {
        return Err(ContractViolation::InvalidValue {
            field: "employee.email",
            reason: "must contain '@'",
        });
    }
    validate_opt_text("employee.phone", phone, 32)
}

impl Validate for EmployeeInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != EMPLOYEE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "employee_input.schema_version",
                reason: "must match EMPLOYEE_CONTRACT_VERSION",
            });
        }
        validate_contact_fields(&self.first_name, &self.last_name, &self.email, &self.phone)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub schema_version: SchemaVersion,
    pub employee_id: EmployeeId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl EmployeeRecord {
    pub fn from_input_v1(
        employee_id: EmployeeId,
        input: EmployeeInput,
    ) -> Result<Self, ContractViolation> {
        input.validate()?;
        let r = Self {
            schema_version: EMPLOYEE_CONTRACT_VERSION,
            employee_id,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            phone: input.phone,
        };
        r.validate()?;
        Ok(r)
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Validate for EmployeeRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != EMPLOYEE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "employee_record.schema_version",
                reason: "must match EMPLOYEE_CONTRACT_VERSION",
            });
        }
        self.employee_id.validate()?;
        validate_contact_fields(&self.first_name, &self.last_name, &self.email, &self.phone)
    }
}
