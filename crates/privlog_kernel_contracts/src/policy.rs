#![forbid(unsafe_code)]

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{ContractViolation, SchemaVersion, Validate};

pub const POLICY_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const DEFAULT_POLICY_WINDOW_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolicyId(pub u64);

impl Validate for PolicyId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "policy_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Auditor,
    LoanManager,
    LoanOfficer,
}

impl Role {
    pub const ALLOWED: &'static str = "auditor, loan_manager, loan_officer";

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Auditor => "auditor",
            Role::LoanManager => "loan_manager",
            Role::LoanOfficer => "loan_officer",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auditor" => Ok(Role::Auditor),
            "loan_manager" => Ok(Role::LoanManager),
            "loan_officer" => Ok(Role::LoanOfficer),
            _ => Err(ContractViolation::InvalidEnum {
                field: "role",
                value: raw.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Audit,
    Approval,
    Onboarding,
    Review,
}

impl Purpose {
    pub const ALLOWED: &'static str = "audit, approval, onboarding, review";

    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::Audit => "audit",
            Purpose::Approval => "approval",
            Purpose::Onboarding => "onboarding",
            Purpose::Review => "review",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "audit" => Ok(Purpose::Audit),
            "approval" => Ok(Purpose::Approval),
            "onboarding" => Ok(Purpose::Onboarding),
            "review" => Ok(Purpose::Review),
            _ => Err(ContractViolation::InvalidEnum {
                field: "purpose",
                value: raw.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyGrantInput {
    pub schema_version: SchemaVersion,
    pub role: Role,
    pub purpose: Purpose,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl PolicyGrantInput {
    pub fn v1(
        role: Role,
        purpose: Purpose,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            schema_version: POLICY_CONTRACT_VERSION,
            role,
            purpose,
            start_time,
            end_time,
        };
        input.validate()?;
        Ok(input)
    }

    /// Window of `window_minutes` starting at `start_time`.
    pub fn windowed_v1(
        role: Role,
        purpose: Purpose,
        start_time: DateTime<Utc>,
        window_minutes: i64,
    ) -> Result<Self, ContractViolation> {
        let end_time = Duration::try_minutes(window_minutes)
            .and_then(|window| start_time.checked_add_signed(window))
            .ok_or(ContractViolation::InvalidValue {
                field: "policy_grant.end_time",
                reason: "window runs past the representable time range",
            })?;
        Self::v1(role, purpose, start_time, end_time)
    }
}

fn validate_window(
    field: &'static str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<(), ContractViolation> {
    if end_time <= start_time {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "end_time must be after start_time",
        });
    }
    Ok(())
}

impl Validate for PolicyGrantInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != POLICY_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "policy_grant_input.schema_version",
                reason: "must match POLICY_CONTRACT_VERSION",
            });
        }
        validate_window("policy_grant_input.end_time", self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyGrant {
    pub schema_version: SchemaVersion,
    pub policy_id: PolicyId,
    pub role: Role,
    pub purpose: Purpose,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl PolicyGrant {
    pub fn from_input_v1(
        policy_id: PolicyId,
        input: PolicyGrantInput,
    ) -> Result<Self, ContractViolation> {
        input.validate()?;
        let g = Self {
            schema_version: POLICY_CONTRACT_VERSION,
            policy_id,
            role: input.role,
            purpose: input.purpose,
            start_time: input.start_time,
            end_time: input.end_time,
        };
        g.validate()?;
        Ok(g)
    }

    /// Descriptive only; nothing gates access on this.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.start_time <= at && at < self.end_time
    }
}

impl Validate for PolicyGrant {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != POLICY_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "policy_grant.schema_version",
                reason: "must match POLICY_CONTRACT_VERSION",
            });
        }
        self.policy_id.validate()?;
        validate_window("policy_grant.end_time", self.start_time, self.end_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn role_and_purpose_are_closed_sets() {
        assert_eq!(Role::parse("Loan_Officer").unwrap(), Role::LoanOfficer);
        assert_eq!(Purpose::parse("review").unwrap(), Purpose::Review);
        assert!(matches!(
            Role::parse("janitor"),
            Err(ContractViolation::InvalidEnum { field: "role", .. })
        ));
        assert!(matches!(
            Purpose::parse("marketing"),
            Err(ContractViolation::InvalidEnum {
                field: "purpose",
                ..
            })
        ));
    }

    #[test]
    fn window_must_be_forward() {
        assert!(PolicyGrantInput::v1(Role::Auditor, Purpose::Audit, t0(), t0()).is_err());
        let g = PolicyGrantInput::windowed_v1(
            Role::Auditor,
            Purpose::Audit,
            t0(),
            DEFAULT_POLICY_WINDOW_MINUTES,
        )
        .unwrap();
        assert_eq!(g.end_time - g.start_time, Duration::minutes(5));

        let late = DateTime::<Utc>::MAX_UTC - Duration::minutes(1);
        assert!(matches!(
            PolicyGrantInput::windowed_v1(Role::Auditor, Purpose::Audit, late, 5),
            Err(ContractViolation::InvalidValue {
                field: "policy_grant.end_time",
                ..
            })
        ));
        assert!(PolicyGrantInput::windowed_v1(Role::Auditor, Purpose::Audit, t0(), i64::MAX).is_err());
    }

    #[test]
    fn is_active_at_is_half_open() {
        let g = PolicyGrant::from_input_v1(
            PolicyId(1),
            PolicyGrantInput::windowed_v1(Role::LoanManager, Purpose::Approval, t0(), 5).unwrap(),
        )
        .unwrap();
        assert!(g.is_active_at(t0()));
        assert!(!g.is_active_at(t0() + Duration::minutes(5)));
    }
}
