//! Shared response envelope types for API handlers.
//!
//! Gateway-level listings use a `{ "data": ... }` envelope. Per-service
//! endpoints return their payload unwrapped, since clients of a single
//! service address it directly.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
