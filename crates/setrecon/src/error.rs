//! Error types for the peer.

use setrecon_ptree::TreeError;
use setrecon_sync::{FailureKind, ReconError};
use thiserror::Error;

/// Errors that can occur during peer operations.
#[derive(Debug, Error)]
pub enum PeerError {
    /// A reconciliation session failed.
    #[error("reconciliation failed: {0}")]
    Recon(#[from] ReconError),

    /// Prefix tree operation failed.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// No partner addresses are configured.
    #[error("no reconciliation partners configured")]
    NoPartners,

    /// Reconciliation has been switched off.
    #[error("reconciliation is disabled")]
    Disabled,

    /// The application stopped receiving recovered elements.
    #[error("recover channel closed")]
    RecoverChannelClosed,

    /// The configuration does not fit the tree.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PeerError {
    /// Classification of the underlying session failure, if there was one.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            PeerError::Recon(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// Result type for peer operations.
pub type Result<T> = std::result::Result<T, PeerError>;
