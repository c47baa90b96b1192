//! Sets of field elements.

use serde::{Deserialize, Serialize};
use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fmt;

use crate::zp::Zp;

/// A set of elements.
///
/// Backed by a `BTreeSet`, so iteration is always in ascending element
/// order. Peers may rely on that ordering for reproducible message bodies.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZSet(BTreeSet<Zp>);

impl ZSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Insert an element. Returns true if it was not already present.
    pub fn insert(&mut self, z: Zp) -> bool {
        self.0.insert(z)
    }

    /// Remove an element. Returns true if it was present.
    pub fn remove(&mut self, z: &Zp) -> bool {
        self.0.remove(z)
    }

    pub fn contains(&self, z: &Zp) -> bool {
        self.0.contains(z)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, Zp> {
        self.0.iter()
    }

    /// All elements in ascending order.
    pub fn items(&self) -> Vec<Zp> {
        self.0.iter().copied().collect()
    }

    /// Add every element of `other` to this set.
    pub fn add_all(&mut self, other: &ZSet) {
        self.0.extend(other.0.iter().copied());
    }

    /// `self ∪ other`.
    pub fn union(&self, other: &ZSet) -> ZSet {
        Self(self.0.union(&other.0).copied().collect())
    }

    /// `self ∩ other`.
    pub fn intersection(&self, other: &ZSet) -> ZSet {
        Self(self.0.intersection(&other.0).copied().collect())
    }

    /// `a − b`: elements of `a` that are not in `b`.
    pub fn diff(a: &ZSet, b: &ZSet) -> ZSet {
        Self(a.0.difference(&b.0).copied().collect())
    }
}

impl FromIterator<Zp> for ZSet {
    fn from_iter<I: IntoIterator<Item = Zp>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Zp> for ZSet {
    fn extend<I: IntoIterator<Item = Zp>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for ZSet {
    type Item = Zp;
    type IntoIter = btree_set::IntoIter<Zp>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ZSet {
    type Item = &'a Zp;
    type IntoIter = btree_set::Iter<'a, Zp>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Debug for ZSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}
