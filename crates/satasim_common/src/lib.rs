//! Shared SATA definitions for the device-side link simulator.
//!
//! This crate provides the vocabulary used by every other satasim crate:
//! the closed set of link primitives with their bit-exact codewords, the
//! 33-bit PHY word (32 data bits plus a primitive flag), the wire byte swap,
//! and typed Frame Information Structures with their word layouts.

#![warn(missing_docs)]

pub mod fis;
pub mod primitive;
pub mod word;

pub use fis::{AtaCommand, Fis, FisError, PioSetup, RegD2h, RegH2d};
pub use primitive::Primitive;
pub use word::{swap_endian, PhyWord};
