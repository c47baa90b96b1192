//! Error types for the sync module.

use thiserror::Error;

use setrecon_core::{Bitstring, CoreError, SolveError};
use setrecon_ptree::TreeError;

/// Errors that can end a reconciliation session.
#[derive(Debug, Error)]
pub enum ReconError {
    /// Transport-level I/O error.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// A frame exceeded the configured size limit.
    #[error("frame too large: {len} > {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// Timeout waiting for peer.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Message validation failed.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Peer sent a message that is not valid at this point of the protocol.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// Peer asked for algebraic reconciliation of a node we do not have.
    #[error("poly request for non-existent node {0}")]
    NodeNotFound(Bitstring),

    /// Remote and local sample vectors do not line up.
    #[error("sample count mismatch: remote={remote}, local={local}")]
    SampleMismatch { remote: usize, local: usize },

    /// Peer sent an error message.
    #[error("peer error: {0}")]
    PeerError(String),

    /// Handshake found the peers' configurations incompatible.
    #[error("incompatible peer: {0}")]
    Incompatible(String),

    /// The solver failed for a reason other than insufficient degree.
    #[error("solver error: {0}")]
    Solver(SolveError),

    /// Prefix tree operation failed.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// Field arithmetic failed.
    #[error("arithmetic error: {0}")]
    Core(#[from] CoreError),

    /// Configuration could not be loaded or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification of a session failure, for logging and backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A read deadline expired.
    Timeout,
    /// Connection, framing or decoding failed.
    Transport,
    /// The peer broke the protocol.
    Protocol,
    /// The peer reported an error of its own.
    Remote,
    /// The peers cannot reconcile with each other.
    Incompatible,
    /// A local collaborator (tree, solver, arithmetic, config) failed.
    Local,
}

impl ReconError {
    /// Classify this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            ReconError::Timeout(_) => FailureKind::Timeout,
            ReconError::Io(_) | ReconError::Codec(_) | ReconError::FrameTooLarge { .. } => {
                FailureKind::Transport
            }
            ReconError::InvalidMessage(_)
            | ReconError::UnexpectedMessage(_)
            | ReconError::NodeNotFound(_)
            | ReconError::SampleMismatch { .. } => FailureKind::Protocol,
            ReconError::PeerError(_) => FailureKind::Remote,
            ReconError::Incompatible(_) => FailureKind::Incompatible,
            ReconError::Solver(_)
            | ReconError::Tree(_)
            | ReconError::Core(_)
            | ReconError::Config(_) => FailureKind::Local,
        }
    }

    /// Whether the peer should be told about this failure before closing.
    ///
    /// A peer that reported an error itself has already given up.
    pub fn should_notify_peer(&self) -> bool {
        !matches!(self, ReconError::PeerError(_))
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, ReconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_distinguishes_failures() {
        assert_eq!(ReconError::Timeout("read".into()).kind(), FailureKind::Timeout);
        assert_eq!(
            ReconError::NodeNotFound(Bitstring::new(0)).kind(),
            FailureKind::Protocol
        );
        assert_eq!(ReconError::PeerError("boom".into()).kind(), FailureKind::Remote);
        assert_eq!(ReconError::Codec("bad".into()).kind(), FailureKind::Transport);
    }

    #[test]
    fn test_peer_errors_not_echoed() {
        assert!(!ReconError::PeerError("boom".into()).should_notify_peer());
        assert!(ReconError::UnexpectedMessage("Elements".into()).should_notify_peer());
    }
}
