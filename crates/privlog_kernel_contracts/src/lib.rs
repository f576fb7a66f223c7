#![forbid(unsafe_code)]

pub mod applicant;
pub mod common;
pub mod employee;
pub mod history;
pub mod policy;

pub use common::{ContractViolation, SchemaVersion, Validate};
