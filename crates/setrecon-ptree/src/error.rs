//! Error types for the prefix tree.

use thiserror::Error;

use setrecon_core::{Bitstring, CoreError, Zp};

/// Errors that can occur during prefix-tree operations.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Element is already in the tree.
    #[error("duplicate element: {0}")]
    DuplicateElement(Zp),

    /// Element is not in the tree.
    #[error("element not found: {0}")]
    ElementNotFound(Zp),

    /// Element coincides with an evaluation point and cannot be summarized.
    #[error("element {0} collides with an evaluation point")]
    ReservedElement(Zp),

    /// A node handle outlived the node it referred to.
    #[error("node not found: {0}")]
    NodeNotFound(Bitstring),

    /// Invalid tree configuration.
    #[error("invalid tree configuration: {0}")]
    InvalidConfig(String),

    /// Field arithmetic failed while maintaining sample values.
    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] CoreError),

    /// A lock guarding the tree was poisoned by a panicking writer.
    #[error("prefix tree lock poisoned")]
    Poisoned,
}

/// Result type for prefix-tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;
