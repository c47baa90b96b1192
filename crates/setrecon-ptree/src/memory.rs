//! In-memory implementation of the PrefixTree trait.
//!
//! This is primarily for tests and small deployments. Every node keeps its
//! sample values up to date incrementally: inserting `x` multiplies sample
//! `i` by `(point_i - x)`, removing `x` divides it back out.

use std::sync::{Arc, RwLock};

use setrecon_core::{Bitstring, CoreError, Zp, ELEMENT_WIDTH};

use crate::error::{Result, TreeError};
use crate::traits::{PrefixNode, PrefixTree, TreeConfig};

/// Prefixes never grow past the element width.
const MAX_DEPTH_BITS: usize = ELEMENT_WIDTH * 8;

/// In-memory prefix tree.
///
/// Thread-safe via RwLock. Node handles returned by [`PrefixTree::node`] are
/// snapshots of the node's summary taken under the read lock.
pub struct MemPrefixTree {
    config: TreeConfig,
    points: Vec<Zp>,
    root: Arc<RwLock<NodeData>>,
}

#[derive(Debug)]
struct NodeData {
    key: Bitstring,
    svalues: Vec<Zp>,
    size: usize,
    children: Vec<NodeData>,
    /// Only populated on leaves.
    elements: Vec<Zp>,
}

impl NodeData {
    fn new(key: Bitstring, num_samples: usize) -> Self {
        Self {
            key,
            svalues: vec![Zp::ONE; num_samples],
            size: 0,
            children: Vec::new(),
            elements: Vec::new(),
        }
    }

    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn scale(&mut self, factors: &[Zp]) {
        for (s, f) in self.svalues.iter_mut().zip(factors) {
            *s = *s * *f;
        }
    }

    fn child_index(&self, z: &Zp, quantum: u32) -> usize {
        let depth = self.key.len();
        Bitstring::of_element(z, depth + quantum as usize).chunk(depth, quantum)
    }

    fn leaf_for(&self, z: &Zp, quantum: u32) -> &NodeData {
        let mut node = self;
        while !node.is_leaf() {
            node = &node.children[node.child_index(z, quantum)];
        }
        node
    }

    /// Caller guarantees `prefix.len()` is a multiple of `quantum`.
    fn find(&self, prefix: &Bitstring, quantum: u32) -> Option<&NodeData> {
        let mut node = self;
        while node.key.len() < prefix.len() {
            if node.is_leaf() {
                return None;
            }
            node = &node.children[prefix.chunk(node.key.len(), quantum)];
        }
        (node.key == *prefix).then_some(node)
    }

    fn collect_elements(&self, out: &mut Vec<Zp>) {
        out.extend_from_slice(&self.elements);
        for child in &self.children {
            child.collect_elements(out);
        }
    }

    fn split(&mut self, config: &TreeConfig, points: &[Zp]) {
        if self.key.len() + config.bit_quantum as usize > MAX_DEPTH_BITS {
            return;
        }

        let mut children: Vec<NodeData> = (0..config.fanout())
            .map(|i| NodeData::new(self.key.child(i, config.bit_quantum), config.num_samples))
            .collect();

        for z in std::mem::take(&mut self.elements) {
            let child = &mut children[self.child_index(&z, config.bit_quantum)];
            child.scale(&marks(points, &z));
            child.size += 1;
            child.elements.push(z);
        }

        for child in children.iter_mut() {
            if child.elements.len() > config.split_threshold {
                child.split(config, points);
            }
        }

        tracing::debug!("split node {} ({} elements)", self.key, self.size);
        self.children = children;
    }

    fn join(&mut self) {
        let mut elements = Vec::with_capacity(self.size);
        for child in &self.children {
            child.collect_elements(&mut elements);
        }
        tracing::debug!("joined node {} ({} elements)", self.key, elements.len());
        self.children.clear();
        self.elements = elements;
    }
}

/// Per-point factors `point_i - z`.
fn marks(points: &[Zp], z: &Zp) -> Vec<Zp> {
    points.iter().map(|p| *p - *z).collect()
}

impl MemPrefixTree {
    /// Create an empty tree.
    pub fn new(config: TreeConfig) -> Result<Self> {
        config.validate()?;
        let points = Zp::points(config.num_samples);
        let root = NodeData::new(Bitstring::new(0), config.num_samples);
        Ok(Self {
            config,
            points,
            root: Arc::new(RwLock::new(root)),
        })
    }

    /// Create a tree holding `elements`.
    pub fn from_elements(config: TreeConfig, elements: impl IntoIterator<Item = Zp>) -> Result<Self> {
        let tree = Self::new(config)?;
        for z in elements {
            tree.insert(z)?;
        }
        Ok(tree)
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Add an element.
    pub fn insert(&self, z: Zp) -> Result<()> {
        if self.points.contains(&z) {
            return Err(TreeError::ReservedElement(z));
        }
        let factors = marks(&self.points, &z);
        let quantum = self.config.bit_quantum;

        let mut root = self.root.write().map_err(|_| TreeError::Poisoned)?;
        if root.leaf_for(&z, quantum).elements.contains(&z) {
            return Err(TreeError::DuplicateElement(z));
        }

        let mut node: &mut NodeData = &mut root;
        loop {
            node.scale(&factors);
            node.size += 1;
            if node.is_leaf() {
                node.elements.push(z);
                if node.elements.len() > self.config.split_threshold {
                    node.split(&self.config, &self.points);
                }
                return Ok(());
            }
            let idx = node.child_index(&z, quantum);
            node = &mut node.children[idx];
        }
    }

    /// Remove an element.
    pub fn remove(&self, z: &Zp) -> Result<()> {
        if self.points.contains(z) {
            return Err(TreeError::ElementNotFound(*z));
        }
        let factors = marks(&self.points, z)
            .into_iter()
            .map(|m| m.inv().ok_or(CoreError::DivisionByZero))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let quantum = self.config.bit_quantum;

        let mut root = self.root.write().map_err(|_| TreeError::Poisoned)?;
        if !root.leaf_for(z, quantum).elements.contains(z) {
            return Err(TreeError::ElementNotFound(*z));
        }

        let mut node: &mut NodeData = &mut root;
        loop {
            node.scale(&factors);
            node.size -= 1;
            if !node.is_leaf() && node.size <= self.config.join_threshold {
                node.join();
            }
            if node.is_leaf() {
                node.elements.retain(|e| e != z);
                return Ok(());
            }
            let idx = node.child_index(z, quantum);
            node = &mut node.children[idx];
        }
    }

    /// Check whether an element is present.
    pub fn contains(&self, z: &Zp) -> Result<bool> {
        let root = self.root.read().map_err(|_| TreeError::Poisoned)?;
        Ok(root.leaf_for(z, self.config.bit_quantum).elements.contains(z))
    }

    /// Number of elements in the tree.
    pub fn len(&self) -> Result<usize> {
        let root = self.root.read().map_err(|_| TreeError::Poisoned)?;
        Ok(root.size)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl PrefixTree for MemPrefixTree {
    type Node = MemNode;

    fn points(&self) -> &[Zp] {
        &self.points
    }

    fn node(&self, prefix: &Bitstring) -> Result<Option<MemNode>> {
        let quantum = self.config.bit_quantum;
        if prefix.len() % quantum as usize != 0 {
            return Ok(None);
        }

        let root = self.root.read().map_err(|_| TreeError::Poisoned)?;
        Ok(root.find(prefix, quantum).map(|node| MemNode {
            key: node.key.clone(),
            svalues: node.svalues.clone(),
            size: node.size,
            children_keys: node.children.iter().map(|c| c.key.clone()).collect(),
            quantum,
            root: Arc::clone(&self.root),
        }))
    }
}

/// Snapshot of a [`MemPrefixTree`] node.
#[derive(Debug, Clone)]
pub struct MemNode {
    key: Bitstring,
    svalues: Vec<Zp>,
    size: usize,
    children_keys: Vec<Bitstring>,
    quantum: u32,
    root: Arc<RwLock<NodeData>>,
}

impl PrefixNode for MemNode {
    fn key(&self) -> &Bitstring {
        &self.key
    }

    fn svalues(&self) -> &[Zp] {
        &self.svalues
    }

    fn size(&self) -> usize {
        self.size
    }

    fn is_leaf(&self) -> bool {
        self.children_keys.is_empty()
    }

    fn children_keys(&self) -> Vec<Bitstring> {
        self.children_keys.clone()
    }

    /// Resolved against the live tree, sorted ascending.
    fn elements(&self) -> Result<Vec<Zp>> {
        let root = self.root.read().map_err(|_| TreeError::Poisoned)?;
        let node = root
            .find(&self.key, self.quantum)
            .ok_or_else(|| TreeError::NodeNotFound(self.key.clone()))?;

        let mut out = Vec::with_capacity(node.size);
        node.collect_elements(&mut out);
        out.sort();
        Ok(out)
    }
}
