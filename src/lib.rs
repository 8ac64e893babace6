//! Batch reconciliation of LMS course enrolments against the Daisy roster API.
//!
//! The binary in `main.rs` wires file-backed collaborators around the core
//! exported here; tests drive the same core with in-memory fakes.

pub mod account;
pub mod apply;
pub mod cli;
pub mod config;
pub mod confirm;
pub mod diagnostics;
pub mod diff;
pub mod notify;
pub mod orchestrator;
pub mod roster;
pub mod store;
