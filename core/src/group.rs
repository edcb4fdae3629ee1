// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SlicerError;
use crate::tuple::Tuple;

/// A group table id, allocated dense starting at 0 from a free pool that is
/// always kept non-empty (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u32);

/// Assigns one group to each tuple that needs a learning-bridge group
/// (slices of size > 2), and reclaims the id when the tuple is released.
///
/// Kept separate from `Switch` so the allocation policy (always hand out
/// the *minimum* free id, auto-extending the pool so it is never empty) can
/// be tested in isolation.
#[derive(Debug)]
pub struct GroupAllocator {
    by_tuple: BTreeMap<Tuple, GroupId>,
    free: BTreeSet<GroupId>,
}

impl GroupAllocator {
    pub fn new() -> Self {
        let mut free = BTreeSet::new();
        free.insert(GroupId(0));
        Self {
            by_tuple: BTreeMap::new(),
            free,
        }
    }

    pub fn get(&self, tuple: &Tuple) -> Option<GroupId> {
        self.by_tuple.get(tuple).copied()
    }

    /// Returns the group already owned by `tuple`, allocating the smallest
    /// free id if it doesn't have one yet. The pool always keeps at least
    /// one id beyond every allocated one so a claim never has to extend
    /// it mid-allocation (spec.md §4.2).
    pub fn claim_for_tuple(&mut self, tuple: Tuple) -> GroupId {
        if let Some(id) = self.by_tuple.get(&tuple) {
            return *id;
        }
        let id = *self.free.iter().next().expect("free pool is never empty");
        self.free.remove(&id);
        if self.free.is_empty() {
            self.free.insert(GroupId(id.0 + 1));
        }
        self.by_tuple.insert(tuple, id);
        id
    }

    pub fn release_tuple(&mut self, tuple: &Tuple) -> Option<GroupId> {
        let id = self.by_tuple.remove(tuple)?;
        self.free.insert(id);
        Some(id)
    }

    pub fn release_group(&mut self, group: GroupId) -> Result<(), SlicerError> {
        let owner = self
            .by_tuple
            .iter()
            .find(|(_, id)| **id == group)
            .map(|(tuple, _)| *tuple);
        match owner {
            Some(tuple) => {
                self.by_tuple.remove(&tuple);
                self.free.insert(group);
                Ok(())
            }
            None => Err(SlicerError::invalid_argument(format!(
                "group {} is not owned by any tuple",
                group.0
            ))),
        }
    }

    pub fn owner_of(&self, group: GroupId) -> Option<Tuple> {
        self.by_tuple
            .iter()
            .find(|(_, id)| **id == group)
            .map(|(tuple, _)| *tuple)
    }
}

impl Default for GroupAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claiming_the_same_tuple_twice_returns_the_same_group() {
        let mut groups = GroupAllocator::new();
        let a = groups.claim_for_tuple(Tuple::untagged(1));
        let b = groups.claim_for_tuple(Tuple::untagged(1));
        assert_eq!(a, b);
    }

    #[test]
    fn released_ids_are_reused() {
        let mut groups = GroupAllocator::new();
        let a = groups.claim_for_tuple(Tuple::untagged(1));
        groups.release_tuple(&Tuple::untagged(1));
        let b = groups.claim_for_tuple(Tuple::untagged(2));
        assert_eq!(a, b);
    }

    #[test]
    fn claims_always_hand_out_the_minimum_free_id() {
        let mut groups = GroupAllocator::new();
        let a = groups.claim_for_tuple(Tuple::untagged(1));
        let b = groups.claim_for_tuple(Tuple::untagged(2));
        let c = groups.claim_for_tuple(Tuple::untagged(3));
        assert_eq!([a.0, b.0, c.0], [0, 1, 2]);

        groups.release_tuple(&Tuple::untagged(2));
        let d = groups.claim_for_tuple(Tuple::untagged(4));
        assert_eq!(d, b, "the released id is the minimum free one, so it comes back first");
    }

    #[test]
    fn release_group_by_id_finds_its_owner() {
        let mut groups = GroupAllocator::new();
        let g = groups.claim_for_tuple(Tuple::untagged(1));
        assert!(groups.release_group(g).is_ok());
        assert!(groups.get(&Tuple::untagged(1)).is_none());
    }

    #[test]
    fn releasing_an_unowned_group_is_an_error() {
        let mut groups = GroupAllocator::new();
        assert!(groups.release_group(GroupId(99)).is_err());
    }
}
