#![forbid(unsafe_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use privlog_kernel_contracts::policy::{PolicyGrant, PolicyGrantInput, PolicyId, Purpose, Role};
use privlog_storage::audit_store::PrivlogStore;
use privlog_storage::repo::PrivacyPoliciesRepo;
use tracing::info;

use crate::clock::Clock;
use crate::config::PrivlogConfig;
use crate::error::{AuditError, AuditResult};
use crate::SharedStore;

/// Append-only store of access grants. Grants are metadata: nothing here
/// checks a caller against them.
#[derive(Clone)]
pub struct PolicyLedger {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    config: PrivlogConfig,
}

impl PolicyLedger {
    pub fn new(store: SharedStore, clock: Arc<dyn Clock>, config: PrivlogConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Start defaults to now; end defaults to start plus the configured window.
    pub fn grant(
        &self,
        role: Role,
        purpose: Purpose,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> AuditResult<PolicyId> {
        let input = self.grant_input(role, purpose, start, end)?;
        let mut store = self.store.lock();
        insert_grant(&mut store, input)
    }

    /// String boundary of [`PolicyLedger::grant`].
    pub fn grant_named(
        &self,
        role: &str,
        purpose: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> AuditResult<PolicyId> {
        let role = Role::parse(role)?;
        let purpose = Purpose::parse(purpose)?;
        self.grant(role, purpose, start, end)
    }

    pub fn get(&self, policy_id: PolicyId) -> AuditResult<PolicyGrant> {
        self.store
            .lock()
            .policy_row(policy_id)
            .cloned()
            .ok_or_else(|| AuditError::not_found("privacy_policies", policy_id))
    }

    /// Validated grant input; nothing is written.
    pub(crate) fn grant_input(
        &self,
        role: Role,
        purpose: Purpose,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> AuditResult<PolicyGrantInput> {
        let start = start.unwrap_or_else(|| self.clock.now());
        let end = match end {
            Some(end) => end,
            None => Duration::try_minutes(self.config.policy_window_minutes)
                .and_then(|window| start.checked_add_signed(window))
                .ok_or_else(|| AuditError::InvalidValue {
                    field: "end_time".to_string(),
                    reason: "default window runs past the representable time range".to_string(),
                })?,
        };
        Ok(PolicyGrantInput::v1(role, purpose, start, end)?)
    }
}

/// Inserts a grant inside the caller's transaction.
pub(crate) fn insert_grant(
    store: &mut PrivlogStore,
    input: PolicyGrantInput,
) -> AuditResult<PolicyId> {
    let role = input.role;
    let purpose = input.purpose;
    let policy_id = store.insert_policy_row(input)?;
    info!(
        policy_id = policy_id.0,
        role = role.as_str(),
        purpose = purpose.as_str(),
        "policy grant created"
    );
    Ok(policy_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::AuditErrorKind;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn ledger() -> PolicyLedger {
        PolicyLedger::new(
            crate::shared_in_memory_store(),
            Arc::new(ManualClock::new(t0())),
            PrivlogConfig::mvp_v1(),
        )
    }

    #[test]
    fn grant_defaults_to_now_plus_window() {
        let l = ledger();
        let id = l.grant(Role::Auditor, Purpose::Audit, None, None).unwrap();
        let g = l.get(id).unwrap();
        assert_eq!(g.start_time, t0());
        assert_eq!(g.end_time, t0() + Duration::minutes(5));
    }

    #[test]
    fn explicit_end_before_start_is_rejected_without_write() {
        let l = ledger();
        let err = l
            .grant(
                Role::Auditor,
                Purpose::Audit,
                Some(t0()),
                Some(t0() - Duration::minutes(1)),
            )
            .unwrap_err();
        assert_eq!(err.kind(), AuditErrorKind::InvalidValue);
        assert!(l.store.lock().policy_rows().is_empty());
    }

    #[test]
    fn window_edges_near_max_time_do_not_panic() {
        let l = ledger();
        let max = DateTime::<Utc>::MAX_UTC;
        let id = l
            .grant(
                Role::Auditor,
                Purpose::Audit,
                Some(max - Duration::minutes(1)),
                Some(max),
            )
            .unwrap();
        assert_eq!(l.get(id).unwrap().end_time, max);

        let err = l
            .grant(Role::Auditor, Purpose::Audit, Some(max), None)
            .unwrap_err();
        assert_eq!(err.kind(), AuditErrorKind::InvalidValue);
        assert_eq!(l.store.lock().policy_rows().len(), 1);
    }

    #[test]
    fn grant_named_rejects_unknown_enums() {
        let l = ledger();
        assert_eq!(
            l.grant_named("janitor", "audit", None, None)
                .unwrap_err()
                .kind(),
            AuditErrorKind::InvalidEnum
        );
        assert_eq!(
            l.grant_named("auditor", "curiosity", None, None)
                .unwrap_err()
                .kind(),
            AuditErrorKind::InvalidEnum
        );
        let id = l.grant_named("Loan_Officer", "review", None, None).unwrap();
        assert_eq!(l.get(id).unwrap().role, Role::LoanOfficer);
    }

    #[test]
    fn unknown_policy_is_not_found() {
        assert_eq!(
            ledger().get(PolicyId(7)).unwrap_err().kind(),
            AuditErrorKind::NotFound
        );
    }
}
