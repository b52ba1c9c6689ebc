//! Core domain logic for the Easel service gateway.
//!
//! Holds the service data model and the request pipeline stages that do
//! not touch the network: parameter validation, template binding, backend
//! registry and service discovery.

pub mod backend;
pub mod binder;
pub mod error;
pub mod mapping;
pub mod registry;
pub mod service;
pub mod template;
pub mod types;
pub mod validation;
