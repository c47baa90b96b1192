//! # Set Reconciliation Prefix Tree
//!
//! Prefix-tree abstraction for set reconciliation. Elements are filed under
//! the bits of their encoding, so two replicas can localize differences to
//! small subtrees and reconcile each one separately.
//!
//! ## Key Types
//!
//! - [`PrefixTree`] - The read-only capability consumed by the sync engine
//! - [`PrefixNode`] - A node: sample values, size, leaf flag, elements
//! - [`MemPrefixTree`] - Thread-safe in-memory implementation
//! - [`TreeConfig`] - Tree shape (bit quantum, samples, split/join thresholds)
//!
//! ## Usage
//!
//! ```rust
//! use setrecon_core::Zp;
//! use setrecon_ptree::{MemPrefixTree, PrefixNode, PrefixTree, TreeConfig};
//!
//! let tree = MemPrefixTree::new(TreeConfig::default()).unwrap();
//! tree.insert(Zp::hash_key(b"record-1")).unwrap();
//!
//! let root = tree.root().unwrap();
//! assert_eq!(root.size(), 1);
//! ```
//!
//! ## Design Notes
//!
//! - **Read-only consumers**: the sync engine never mutates a tree
//! - **Concurrent readers**: implementations must allow simultaneous sessions
//! - **Snapshots**: node handles carry a copy of the node's summary

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{Result, TreeError};
pub use memory::{MemNode, MemPrefixTree};
pub use traits::{PrefixNode, PrefixTree, TreeConfig};
