//! ComfyUI REST client library.
//!
//! Provides the HTTP API wrapper, history parsing, a fixed-interval poll
//! loop, artifact storage and the [`RenderBackend`](executor::RenderBackend)
//! implementation used to run jobs on ComfyUI servers.

pub mod api;
pub mod executor;
pub mod job;
pub mod poll;
pub mod storage;
