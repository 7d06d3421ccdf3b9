//! Delayed-response bus memory model.
//!
//! [`BusMemory`] emulates a bus target, typically system memory reached by a
//! controller's DMA engine, whose acknowledgments arrive a fixed number of
//! steps after each request. Strobes are randomly stalled, writes honour
//! per-byte selects, and addresses wrap modulo the storage size.
//!
//! # Modules
//!
//! - `error` — Memory model error types
//! - `queue` — Fixed-capacity circular queue of in-flight acknowledgments
//! - `stall` — Random stall generator
//! - `memory` — Backing storage and the per-step bus interface

#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod queue;
pub mod stall;

pub use error::MemError;
pub use memory::{BusConfig, BusMemory, BusRequest, BusStatus};
pub use queue::DelayQueue;
pub use stall::StallSource;
