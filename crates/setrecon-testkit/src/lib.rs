//! # Set Reconciliation Testkit
//!
//! Testing utilities for set reconciliation.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Generators**: Proptest strategies for elements and overlapping set pairs
//! - **Fixtures**: A scripted solver, an oracle solver that knows both sets, a
//!   hand-built prefix tree, and a scripted requester that plays the remote end
//!   of a session
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use setrecon_testkit::generators::overlapping_sets;
//!
//! proptest! {
//!     #[test]
//!     fn diff_is_disjoint((local, remote) in overlapping_sets(32)) {
//!         let a = ZSet::diff(&local, &remote);
//!         let b = ZSet::diff(&remote, &local);
//!         prop_assert!(a.intersection(&b).is_empty());
//!     }
//! }
//! ```
//!
//! ## Scripted Sessions
//!
//! ```rust,ignore
//! use setrecon_testkit::fixtures::ScriptedRemote;
//!
//! let (ours, theirs) = tokio::io::duplex(64 * 1024);
//! let mut remote = ScriptedRemote::new(theirs);
//! remote.handshake(&config).await?;
//! remote.send(&[request, ReconMsg::Flush]).await?;
//! let reply = remote.recv().await?;
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    random_elements, OracleSolver, ScriptedRemote, ScriptedSolver, StaticNode, StaticTree,
};
pub use generators::{element, element_set, overlapping_sets};
