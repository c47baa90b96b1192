//! Exchange coordinator: answers one reconciliation request at a time.
//!
//! For a poly request the coordinator divides the requester's sample values
//! by its own and asks the solver for the difference. When the difference is
//! too large for the degree bound it falls back:
//!
//! ```text
//! solve ok                         -> Elements(what the remote lacks)
//! insufficient degree, small node  -> FullElements(every element of the node)
//! insufficient degree, large node  -> SyncFail
//! anything else                    -> session error
//! ```
//!
//! A full request is a plain set difference against the node's elements.

use setrecon_core::{sample_ratios, Bitstring, CoreError, SolveError, Solver, ZSet, Zp};
use setrecon_ptree::{PrefixNode, PrefixTree};

use crate::error::{ReconError, Result};
use crate::messages::ReconMsg;

/// Outcome of handling one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Elements the local peer now knows it is missing.
    pub needed: ZSet,
    /// Reply to queue for the remote.
    pub response: ReconMsg,
}

/// Resolves requests against a prefix tree.
///
/// Holds no per-session state; one coordinator can serve any number of
/// sequential requests, and coordinators over the same tree can run in
/// parallel.
pub struct Coordinator<T: PrefixTree, S: Solver> {
    tree: T,
    solver: S,
    small_node_threshold: usize,
}

impl<T: PrefixTree, S: Solver> Coordinator<T, S> {
    /// Create a coordinator. Nodes smaller than `small_node_threshold`
    /// (`thresh_mult × mbar`) are sent in full when the solver gives up.
    pub fn new(tree: T, solver: S, small_node_threshold: usize) -> Self {
        Self {
            tree,
            solver,
            small_node_threshold,
        }
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    /// Dispatch a request message.
    pub fn handle_request(&self, msg: &ReconMsg) -> Result<Step> {
        match msg {
            ReconMsg::ReconRqstPoly {
                prefix,
                size,
                samples,
            } => self.handle_poly(prefix, *size, samples),
            ReconMsg::ReconRqstFull { prefix, elements } => self.handle_full(prefix, elements),
            other => Err(ReconError::UnexpectedMessage(format!(
                "{} is not a request",
                other.name()
            ))),
        }
    }

    /// Reconcile a node algebraically.
    pub fn handle_poly(
        &self,
        prefix: &Bitstring,
        remote_size: u64,
        remote_samples: &[Zp],
    ) -> Result<Step> {
        let node = self
            .tree
            .node(prefix)?
            .ok_or_else(|| ReconError::NodeNotFound(prefix.clone()))?;

        let local_samples = node.svalues();
        let ratios = match sample_ratios(remote_samples, local_samples) {
            Some(Ok(ratios)) => ratios,
            Some(Err(_)) => return Err(CoreError::DivisionByZero.into()),
            None => {
                return Err(ReconError::SampleMismatch {
                    remote: remote_samples.len(),
                    local: local_samples.len(),
                })
            }
        };

        let remote_size = i64::try_from(remote_size)
            .map_err(|_| ReconError::InvalidMessage(format!("node size {} out of range", remote_size)))?;
        let size_diff = remote_size - node.size() as i64;

        match self.solver.solve(&ratios, self.tree.points(), size_diff) {
            Ok(diff) => {
                tracing::debug!(
                    "solved node {}: local needs {}, remote needs {}",
                    prefix,
                    diff.remote_only.len(),
                    diff.local_only.len()
                );
                Ok(Step {
                    needed: diff.remote_only,
                    response: ReconMsg::Elements(diff.local_only),
                })
            }
            Err(SolveError::InsufficientDegree) => self.fallback(&node),
            Err(e) => Err(ReconError::Solver(e)),
        }
    }

    /// Diff a node against the requester's literal element set.
    ///
    /// A missing node is not an error here: it simply holds nothing.
    pub fn handle_full(&self, prefix: &Bitstring, remote: &ZSet) -> Result<Step> {
        let local: ZSet = match self.tree.node(prefix)? {
            Some(node) => node.elements()?.into_iter().collect(),
            None => ZSet::new(),
        };

        let needed = ZSet::diff(remote, &local);
        let remote_needs = ZSet::diff(&local, remote);
        tracing::debug!(
            "full request for node {}: local needs {}, remote needs {}",
            prefix,
            needed.len(),
            remote_needs.len()
        );

        Ok(Step {
            needed,
            response: ReconMsg::Elements(remote_needs),
        })
    }

    fn fallback(&self, node: &T::Node) -> Result<Step> {
        if node.is_leaf() || node.size() < self.small_node_threshold {
            tracing::debug!(
                "low mbar at node {}, sending {} full elements",
                node.key(),
                node.size()
            );
            let elements: ZSet = node.elements()?.into_iter().collect();
            return Ok(Step {
                needed: ZSet::new(),
                response: ReconMsg::FullElements(elements),
            });
        }

        tracing::warn!(
            "low mbar at node {} (leaf={}, size={}), sending SyncFail",
            node.key(),
            node.is_leaf(),
            node.size()
        );
        Ok(Step {
            needed: ZSet::new(),
            response: ReconMsg::SyncFail,
        })
    }
}
