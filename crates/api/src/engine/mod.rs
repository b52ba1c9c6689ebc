//! Request execution engine.
//!
//! Holds the table of routable services (definition plus the backend
//! that runs it) and the orchestrator that drives one request through
//! validate, bind, submit, poll and fetch.

pub mod orchestrator;
pub mod services;
