// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use crate::config::SlicerConfig;
use crate::dpid::Dpid;
use crate::driver::Command;
use crate::group::GroupAllocator;
use crate::slice::Slice;
use crate::tuple::{fmt_tuples, Tuple, MAX_PORT};

/// Identifies one [`Slice`] inside a [`Switch`]'s flat registry. Slices
/// never hold a reference to their switch or to each other; the switch
/// alone indexes tuples to slice ids (spec.md §9 — avoids the cyclic
/// `Slice<->Switch` reference the original object graph has).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SliceId(u64);

/// Per-datapath slicing state: the registry of slices, the tuple-owner
/// index, the group allocator, known ports, and the two invalidation
/// queues the revalidator drains (spec.md §3, "Switch state").
#[derive(Debug)]
pub struct Switch {
    dpid: Dpid,
    config: SlicerConfig,
    pub(crate) attached: bool,
    pub(crate) known_ports: BTreeSet<u32>,
    pub(crate) slices: BTreeMap<SliceId, Slice>,
    next_slice_id: u64,
    pub(crate) target_index: BTreeMap<Tuple, SliceId>,
    pub(crate) groups: GroupAllocator,
    pub(crate) invalid_slices: BTreeSet<SliceId>,
    pub(crate) invalid_first_tag_rules: BTreeSet<(u32, u16)>,
}

impl Switch {
    pub fn new(dpid: Dpid) -> Self {
        Self::with_config(dpid, SlicerConfig::default())
    }

    pub fn with_config(dpid: Dpid, config: SlicerConfig) -> Self {
        Self {
            dpid,
            config,
            attached: false,
            known_ports: BTreeSet::new(),
            slices: BTreeMap::new(),
            next_slice_id: 0,
            target_index: BTreeMap::new(),
            groups: GroupAllocator::new(),
            invalid_slices: BTreeSet::new(),
            invalid_first_tag_rules: BTreeSet::new(),
        }
    }

    pub fn dpid(&self) -> Dpid {
        self.dpid
    }

    pub fn config(&self) -> &SlicerConfig {
        &self.config
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn known_ports(&self) -> &BTreeSet<u32> {
        &self.known_ports
    }

    /// Direct lookup of the slice owning `tuple`, independent of
    /// `create_slice` — used by the HTTP `GET` handler and the learning
    /// engine alike (supplemented feature #2, §10).
    pub fn get_slice(&self, tuple: &Tuple) -> Option<&Slice> {
        self.target_index.get(tuple).and_then(|sid| self.slices.get(sid))
    }

    pub(crate) fn slice(&self, sid: SliceId) -> Option<&Slice> {
        self.slices.get(&sid)
    }

    pub(crate) fn owner_of(&self, tuple: &Tuple) -> Option<SliceId> {
        self.target_index.get(tuple).copied()
    }

    /// The current configuration as a list of slices, each a list of its
    /// target tuples — mirrors `get_config` on the original `SwitchStatus`.
    pub fn get_config(&self) -> Vec<Vec<Tuple>> {
        self.slices
            .values()
            .filter(|s| !s.is_empty())
            .map(|s| s.target.iter().copied().collect())
            .collect()
    }

    /// Record that a port now exists on the datapath. The caller is
    /// expected to follow with `revalidate()` (spec.md §4.6).
    pub fn port_added(&mut self, port: u32) {
        if port > MAX_PORT {
            return;
        }
        log::info!("{}: gained port {port}", self.dpid);
        self.known_ports.insert(port);
    }

    /// Record that a port no longer exists, invalidating every slice with
    /// a tuple on it. The caller is expected to follow with
    /// `revalidate()` (spec.md §4.6).
    ///
    /// Unlike `invalidate_all`, `established` is left untouched here: the
    /// delta pass needs the prior `established` to see what just fell out
    /// of `sanitized` so it can release groups and delete the now-stale
    /// E-Line/static rules (spec.md §4.7 steps 1/3).
    pub fn port_removed(&mut self, port: u32) {
        log::info!("{}: lost port {port}", self.dpid);
        self.known_ports.remove(&port);
        let affected: Vec<SliceId> = self
            .target_index
            .iter()
            .filter(|(tup, _)| tup.port() == port)
            .map(|(_, sid)| *sid)
            .collect();
        for sid in affected {
            self.invalid_slices.insert(sid);
        }
    }

    /// The user no longer wants to connect `tuple` (wire name: `disused`).
    pub fn discard_tuple(&mut self, tuple: Tuple) {
        self.abandon_tuple(tuple);
    }

    /// Mark every slice as fully invalid, forcing a complete static
    /// reinstall on the next `revalidate()` — used on datapath attach.
    pub fn invalidate_all(&mut self) {
        let ids: Vec<SliceId> = self.slices.keys().copied().collect();
        for sid in ids {
            self.invalidate_slice(sid);
        }
    }

    pub(crate) fn invalidate_slice(&mut self, sid: SliceId) {
        if let Some(slice) = self.slices.get_mut(&sid) {
            slice.established.clear();
        }
        self.invalid_slices.insert(sid);
    }

    /// Given a candidate set of tuples, reject it outright on conflict;
    /// otherwise adopt it into the slice with maximum tuple overlap
    /// (splitting that slice's orphaned tuples into a fresh sibling), or
    /// into a brand-new slice if none overlaps (spec.md §4.5). Returns
    /// whether a change was made.
    pub fn create_slice(&mut self, tuples: &[Tuple]) -> bool {
        let requested: BTreeSet<Tuple> = tuples.iter().copied().collect();
        if requested.is_empty() {
            return false;
        }
        let ordered: Vec<Tuple> = requested.iter().copied().collect();
        for i in 0..ordered.len() {
            for j in (i + 1)..ordered.len() {
                if ordered[i].conflicts_with(&ordered[j]) {
                    return false;
                }
            }
        }

        log::info!("{}: creating {}", self.dpid, fmt_tuples(&ordered));

        let mut best: Option<(SliceId, usize)> = None;
        for t in &requested {
            let Some(sid) = self.target_index.get(t).copied() else {
                continue;
            };
            let overlap = self.slices[&sid].target.intersection(&requested).count();
            if best.map_or(true, |(_, best_overlap)| overlap > best_overlap) {
                best = Some((sid, overlap));
            }
        }

        match best {
            Some((host, _)) => {
                let to_adopt: Vec<Tuple> = requested
                    .iter()
                    .filter(|t| !self.slices[&host].target.contains(*t))
                    .copied()
                    .collect();
                for t in to_adopt {
                    self.adopt(host, t);
                }
                let orphans: Vec<Tuple> = self.slices[&host]
                    .target
                    .difference(&requested)
                    .copied()
                    .collect();
                if !orphans.is_empty() {
                    let sibling = self.new_slice_id();
                    for t in orphans {
                        self.adopt(sibling, t);
                    }
                }
            }
            None => {
                let sid = self.new_slice_id();
                for t in requested {
                    self.adopt(sid, t);
                }
            }
        }
        true
    }

    fn new_slice_id(&mut self) -> SliceId {
        let id = SliceId(self.next_slice_id);
        self.next_slice_id += 1;
        id
    }

    /// Ensure `tuple` belongs to slice `sid`, forcing any other slice
    /// holding a conflicting tuple to abandon it first (spec.md §4.4).
    pub(crate) fn adopt(&mut self, sid: SliceId, tuple: Tuple) {
        if self.slices.get(&sid).is_some_and(|s| s.target.contains(&tuple)) {
            return;
        }
        let to_abandon: Vec<Tuple> = self
            .target_index
            .keys()
            .filter(|t2| tuple.conflicts_with(t2))
            .copied()
            .collect();
        for t2 in to_abandon {
            self.abandon_tuple(t2);
        }
        self.slices.entry(sid).or_default().target.insert(tuple);
        self.target_index.insert(tuple, sid);
        self.invalid_slices.insert(sid);
    }

    /// Drop `tuple` from whichever slice currently owns it, a no-op if
    /// unowned (spec.md §4.4 `abandon`, generalized to look its owner up
    /// rather than requiring the caller to already know it).
    pub(crate) fn abandon_tuple(&mut self, tuple: Tuple) {
        let Some(owner) = self.target_index.remove(&tuple) else {
            return;
        };
        if let Some(slice) = self.slices.get_mut(&owner) {
            slice.target.remove(&tuple);
        }
        self.invalid_slices.insert(owner);
    }

    pub(crate) fn sanitize_slice(&mut self, sid: SliceId) {
        let known_ports = &self.known_ports;
        if let Some(slice) = self.slices.get_mut(&sid) {
            slice.sanitized = slice
                .target
                .iter()
                .filter(|t| known_ports.contains(&t.port()))
                .copied()
                .collect();
        }
    }

    pub(crate) fn match_slice(&mut self, sid: SliceId) {
        if let Some(slice) = self.slices.get_mut(&sid) {
            slice.established = slice.sanitized.clone();
        }
    }

    /// Drop slices that have lost their last tuple — a slice has no
    /// identity once `target_index` stops pointing at it (spec.md §3
    /// lifecycle).
    pub(crate) fn collect_garbage(&mut self) {
        self.slices.retain(|_, slice| !slice.is_empty());
    }

    pub(crate) fn set_attached(&mut self, attached: bool) {
        self.attached = attached;
    }

    /// Commands that wipe a previously-attached datapath's flow/group
    /// state and install the permanent static topology (spec.md §4.8,
    /// "Attach sequence" in §6).
    pub(crate) fn attach_commands() -> Vec<Command> {
        use crate::driver::{FlowDelete, FlowMatch, FlowMod, GroupTarget};

        let mut cmds = Vec::new();
        for table in [
            crate::flowbuild::TABLE_CLASSIFY,
            crate::flowbuild::TABLE_ELINE,
            crate::flowbuild::TABLE_FORWARD,
        ] {
            cmds.push(Command::DeleteFlow(FlowDelete::new(table, FlowMatch::default())));
        }
        // OFPG_ALL: wipe every group a prior controller instance left
        // behind, not just id 0 (spec.md §6 attach sequence).
        cmds.push(Command::DeleteGroup(GroupTarget::All));

        let lldp_drop = FlowMod::new(
            crate::flowbuild::TABLE_CLASSIFY,
            6,
            FlowMatch {
                vlan_vid: Some(0x0000),
                eth_type: Some(0x88CC),
                ..Default::default()
            },
        );
        // No actions and no goto-table: an empty apply-actions instruction
        // set is an explicit drop, matching the original's LLDP rule.
        cmds.push(Command::InstallFlow(lldp_drop));
        cmds
    }
}
