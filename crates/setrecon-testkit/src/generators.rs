//! Proptest generators for property-based testing.

use proptest::prelude::*;

use setrecon_core::{Bitstring, ZSet, Zp};

/// Generate an element.
///
/// Values stay well clear of the small integers used as evaluation points,
/// so any generated element can be inserted into a prefix tree.
pub fn element() -> impl Strategy<Value = Zp> {
    ((1u128 << 32)..(1u128 << 126)).prop_map(Zp::new)
}

/// Generate a set of up to `max` elements.
pub fn element_set(max: usize) -> impl Strategy<Value = ZSet> {
    prop::collection::btree_set(element(), 0..=max).prop_map(|s| s.into_iter().collect())
}

/// Generate a `(local, remote)` pair sharing some elements.
///
/// Each side gets up to `max` elements of its own on top of a common core.
pub fn overlapping_sets(max: usize) -> impl Strategy<Value = (ZSet, ZSet)> {
    (element_set(max), element_set(max), element_set(max)).prop_map(
        |(common, local_only, remote_only)| {
            let local = common.union(&ZSet::diff(&local_only, &remote_only));
            let remote = common.union(&ZSet::diff(&remote_only, &local_only));
            (local, remote)
        },
    )
}

/// Generate a prefix of up to `max_bits` bits.
pub fn prefix(max_bits: usize) -> impl Strategy<Value = Bitstring> {
    prop::collection::vec(any::<bool>(), 0..=max_bits).prop_map(|bits| {
        let mut prefix = Bitstring::new(0);
        for bit in bits {
            prefix.push(bit);
        }
        prefix
    })
}
