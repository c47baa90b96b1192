//! # Set Reconciliation Core
//!
//! Pure values for set reconciliation: prime-field elements, element sets,
//! and the bit-string prefixes that address prefix-tree nodes.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Zp`] - An element of the prime field `2^127 - 1`; also a record identifier
//! - [`ZSet`] - A set of elements with deterministic iteration order
//! - [`Bitstring`] - A prefix naming one node of the prefix tree
//! - [`Solver`] - The algebraic solver capability consumed by reconciliation

pub mod error;
pub mod prefix;
pub mod solver;
pub mod zp;
pub mod zset;

pub use error::{CoreError, SolveError};
pub use prefix::Bitstring;
pub use solver::{sample_ratios, SolvedDiff, Solver};
pub use zp::{Zp, ELEMENT_WIDTH, MODULUS};
pub use zset::ZSet;
