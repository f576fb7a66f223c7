#![forbid(unsafe_code)]

pub mod audit_store;
pub mod history_log;
pub mod repo;
