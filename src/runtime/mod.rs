//! Runtime module
//!
//! Spawned task and stream handles shared by the GitHub layer and the
//! shard orchestrator.

pub mod async_task;

pub use async_task::{AsyncStream, AsyncTask, EmitterBuilder};
