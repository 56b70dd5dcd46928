//! Domain types and pure business rules for generation job orchestration.
//!
//! Nothing in this crate performs I/O. The job lifecycle rules, parameter
//! validation, extension arithmetic and session expiry checks live here so
//! the engine, the store and the HTTP layer all share one definition.

pub mod error;
pub mod extension;
pub mod job;
pub mod params;
pub mod session;
pub mod types;
