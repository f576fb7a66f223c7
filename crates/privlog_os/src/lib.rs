#![forbid(unsafe_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use privlog_storage::audit_store::PrivlogStore;

pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod policy_ledger;
pub mod redaction;

pub use error::{AuditError, AuditErrorKind, AuditResult};

/// The one store handle every component is built over. Each logical
/// operation holds the lock for its whole transaction.
pub type SharedStore = Arc<Mutex<PrivlogStore>>;

pub fn shared_in_memory_store() -> SharedStore {
    Arc::new(Mutex::new(PrivlogStore::new_in_memory()))
}

/// Ledger, gateway and redaction engine wired over one store and clock.
#[derive(Clone)]
pub struct PrivlogRuntime {
    pub store: SharedStore,
    pub ledger: policy_ledger::PolicyLedger,
    pub gateway: gateway::MutationGateway,
    pub redaction: redaction::RedactionEngine,
}

impl PrivlogRuntime {
    pub fn new(
        store: SharedStore,
        clock: Arc<dyn clock::Clock>,
        config: config::PrivlogConfig,
    ) -> Self {
        let ledger = policy_ledger::PolicyLedger::new(store.clone(), clock.clone(), config);
        let gateway = gateway::MutationGateway::new(store.clone(), ledger.clone());
        let redaction = redaction::RedactionEngine::new(store.clone(), config);
        Self {
            store,
            ledger,
            gateway,
            redaction,
        }
    }

    pub fn in_memory(clock: Arc<dyn clock::Clock>, config: config::PrivlogConfig) -> Self {
        Self::new(shared_in_memory_store(), clock, config)
    }
}
