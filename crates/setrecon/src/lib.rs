//! # Set Reconciliation
//!
//! Peers that keep replicated sets of record identifiers in agreement,
//! exchanging little more than the difference between them.
//!
//! ## Overview
//!
//! Each replica indexes its elements in a prefix tree whose nodes carry
//! sample values of the node's characteristic polynomial. Two peers compare
//! samples node by node; a small difference is recovered algebraically, a
//! small node is sent outright, and a node that is neither is reported as
//! unresolved.
//!
//! - **Elements**: 127-bit field values, usually [`Zp::hash_key`] of an application key
//! - **Prefix tree**: shared with the application, which inserts and removes elements
//! - **Sessions**: one connection each, run by the dialing peer as responder
//! - **Gossip**: periodic sessions with random partners; results arrive as [`Recover`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use setrecon::{Peer, ReconConfig, TcpConnector};
//! use setrecon::ptree::MemPrefixTree;
//! # use setrecon::core::{SolvedDiff, SolveError, Solver, Zp};
//! # struct MySolver;
//! # impl Solver for MySolver {
//! #     fn solve(&self, _: &[Zp], _: &[Zp], _: i64) -> Result<SolvedDiff, SolveError> {
//! #         Err(SolveError::InsufficientDegree)
//! #     }
//! # }
//!
//! async fn example() -> setrecon::Result<()> {
//!     let config = ReconConfig::default().with_partners(vec!["10.0.0.2:11370".into()]);
//!     let tree = Arc::new(MemPrefixTree::new(config.tree_config())?);
//!     let connector = TcpConnector::new(config.dial_timeout());
//!
//!     let (peer, mut recovered) = Peer::new(config, tree, MySolver, connector)?;
//!     let gossip = Arc::new(peer).spawn_gossip();
//!
//!     while let Some(recover) = recovered.recv().await {
//!         println!("{} elements missing, held by {}", recover.elements.len(), recover.remote_addr);
//!     }
//!     gossip.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `setrecon::core` - Field elements, sets, prefixes, the solver capability
//! - `setrecon::ptree` - Prefix-tree traits and the in-memory tree
//! - `setrecon::sync` - Wire protocol, coordinator and session driver

pub mod error;
pub mod peer;

// Re-export component crates
pub use setrecon_core as core;
pub use setrecon_ptree as ptree;
pub use setrecon_sync as sync;

// Re-export main types for convenience
pub use error::{PeerError, Result};
pub use peer::{GossipHandle, Peer, Recover};

// Re-export commonly used types
pub use setrecon_core::{Bitstring, SolveError, SolvedDiff, Solver, ZSet, Zp};
pub use setrecon_sync::{
    Connector, FailureKind, MemoryConnector, MemoryNetwork, PeerConfig, ReconConfig, ReconError,
    ReconMsg, TcpConnector,
};
