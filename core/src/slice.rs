// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;

use crate::tuple::Tuple;

/// One slice's tuple sets. Holds no reference back to its owning
/// [`crate::switch::Switch`] — the switch owns slices by id and indexes
/// tuples to slice ids itself, avoiding the cyclic ownership spec.md §9
/// calls out. All transitions (`adopt`, `abandon`, `sanitize`, ...) are
/// therefore methods on `Switch`, parameterized by a slice id, rather
/// than on `Slice` itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slice {
    /// Tuples the operator has asked for.
    pub target: BTreeSet<Tuple>,
    /// The subset of `target` whose port currently exists on the datapath.
    pub sanitized: BTreeSet<Tuple>,
    /// The subset for which flow rules/groups are currently installed.
    pub established: BTreeSet<Tuple>,
}

impl Slice {
    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_slice_is_empty() {
        assert!(Slice::default().is_empty());
    }
}
