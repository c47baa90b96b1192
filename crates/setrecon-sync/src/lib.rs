//! # Set Reconciliation Sync
//!
//! The message-exchange engine that drives one reconciliation session
//! between two peers.
//!
//! ## Overview
//!
//! After a configuration handshake, the requester walks its prefix tree and
//! asks about one node at a time. This crate implements the responder side:
//! the [`Coordinator`] answers each request against the local
//! [`PrefixTree`](setrecon_ptree::PrefixTree), and the [`ReconSession`]
//! driver owns the connection, batches replies until the requester asks for
//! a flush, and collects the elements the local peer turns out to be missing.
//!
//! ## Key Properties
//!
//! - **Sequential**: one session handles its messages strictly in arrival order
//! - **Batched**: replies go out only on `Flush`
//! - **Bounded**: an optional element limit ends a session early, reporting it incomplete
//! - **Stateless across sessions**: sessions share nothing but the read-only tree
//!
//! ## Usage
//!
//! ```rust,no_run
//! use setrecon_sync::{Connector, Coordinator, ReconConfig, ReconSession, Role, TcpConnector};
//! use setrecon_ptree::MemPrefixTree;
//! # use setrecon_core::{SolvedDiff, SolveError, Solver, Zp};
//! # struct MySolver;
//! # impl Solver for MySolver {
//! #     fn solve(&self, _: &[Zp], _: &[Zp], _: i64) -> Result<SolvedDiff, SolveError> {
//! #         Err(SolveError::InsufficientDegree)
//! #     }
//! # }
//!
//! async fn example() -> setrecon_sync::Result<()> {
//!     let config = ReconConfig::default();
//!     let tree = MemPrefixTree::new(config.tree_config())?;
//!     let conn = TcpConnector::new(config.dial_timeout())
//!         .connect("10.0.0.2:11370")
//!         .await?;
//!
//!     let coordinator = Coordinator::new(&tree, MySolver, config.small_node_threshold());
//!     let outcome = ReconSession::new(conn, coordinator, &config, Role::Responder)?
//!         .run()
//!         .await?;
//!     println!("missing {} elements", outcome.needed.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Requester                          Responder
//!   |<------- handshake ------------->|
//!   |-------- ReconRqstPoly --------->|
//!   |-------- ReconRqstFull --------->|
//!   |-------- Flush ----------------->|
//!   |<------- Elements ---------------|
//!   |<------- FullElements/SyncFail --|
//!   |-------- Done ------------------>|
//! ```

pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod handshake;
pub mod messages;
pub mod session;
pub mod transport;

pub use codec::{read_msg, read_msg_timeout, write_msg};
pub use config::ReconConfig;
pub use coordinator::{Coordinator, Step};
pub use error::{FailureKind, ReconError, Result};
pub use handshake::{exchange_config, Role};
pub use messages::{limits, ConfigAck, HandshakeMsg, PeerConfig, ReconMsg, PROTOCOL_VERSION};
pub use session::{ReconSession, SessionOutcome, SessionState};
pub use transport::{
    memory::MemoryConnector, memory::MemoryListener, memory::MemoryNetwork, Connector,
    TcpConnector,
};
