//! Prefix-tree traits: the read-only view the reconciliation engine needs.
//!
//! Ownership and mutation of the tree belong to the application. The engine
//! only looks nodes up by prefix and reads their summaries, so a tree must
//! tolerate concurrent readers from simultaneously running sessions.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use setrecon_core::{Bitstring, Zp};

use crate::error::{Result, TreeError};

/// Shape parameters of a prefix tree.
///
/// Both peers of a session must agree on `bit_quantum` and `num_samples`,
/// otherwise their node prefixes and sample vectors do not line up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Prefix bits consumed per tree level; each node has `2^bit_quantum` children.
    pub bit_quantum: u32,
    /// Sample values kept per node (the interpolation degree bound plus one).
    pub num_samples: usize,
    /// A leaf splits once it holds more than this many elements.
    pub split_threshold: usize,
    /// An internal node collapses into a leaf at this size or below.
    pub join_threshold: usize,
}

impl TreeConfig {
    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.bit_quantum == 0 || self.bit_quantum > 8 {
            return Err(TreeError::InvalidConfig(format!(
                "bit_quantum must be in 1..=8, got {}",
                self.bit_quantum
            )));
        }
        if self.num_samples == 0 {
            return Err(TreeError::InvalidConfig("num_samples must be positive".into()));
        }
        if self.join_threshold >= self.split_threshold {
            return Err(TreeError::InvalidConfig(format!(
                "join_threshold {} must be below split_threshold {}",
                self.join_threshold, self.split_threshold
            )));
        }
        Ok(())
    }

    /// Children per internal node.
    pub fn fanout(&self) -> usize {
        1 << self.bit_quantum
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            bit_quantum: 2,
            num_samples: 6,
            split_threshold: 50,
            join_threshold: 25,
        }
    }
}

/// A read-only view of one tree node.
pub trait PrefixNode {
    /// The prefix addressing this node.
    fn key(&self) -> &Bitstring;

    /// Sample values: the node's characteristic polynomial evaluated at the
    /// tree's points, in point order.
    fn svalues(&self) -> &[Zp];

    /// Number of elements under this node.
    fn size(&self) -> usize;

    fn is_leaf(&self) -> bool;

    /// Prefixes of the children, empty for a leaf.
    fn children_keys(&self) -> Vec<Bitstring>;

    /// Every element under this node.
    fn elements(&self) -> Result<Vec<Zp>>;
}

/// The prefix-tree capability consumed by reconciliation.
pub trait PrefixTree: Send + Sync {
    type Node: PrefixNode;

    /// The evaluation points matching each node's sample values.
    fn points(&self) -> &[Zp];

    /// Look up the node at `prefix`. `Ok(None)` if there is no such node.
    fn node(&self, prefix: &Bitstring) -> Result<Option<Self::Node>>;

    /// The root node.
    fn root(&self) -> Result<Self::Node> {
        let prefix = Bitstring::new(0);
        self.node(&prefix)?.ok_or(TreeError::NodeNotFound(prefix))
    }
}

impl<T: PrefixTree + ?Sized> PrefixTree for Arc<T> {
    type Node = T::Node;

    fn points(&self) -> &[Zp] {
        (**self).points()
    }

    fn node(&self, prefix: &Bitstring) -> Result<Option<Self::Node>> {
        (**self).node(prefix)
    }
}

impl<T: PrefixTree + ?Sized> PrefixTree for &T {
    type Node = T::Node;

    fn points(&self) -> &[Zp] {
        (**self).points()
    }

    fn node(&self, prefix: &Bitstring) -> Result<Option<Self::Node>> {
        (**self).node(prefix)
    }
}
