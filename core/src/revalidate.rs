// SPDX-License-Identifier: Apache-2.0

//! The convergence engine (spec.md §4.7) plus the datapath attach/detach
//! orchestration (§6 "Attach sequence") that drives it. Kept in its own
//! module because it is, by a wide margin, the most intricate part of the
//! switch state machine — separating it from the plain registry
//! operations in `switch.rs` mirrors how the original kept
//! `revalidate`/`delete_static_rules`/`add_static_rules` as the largest,
//! most carefully commented methods on `SwitchStatus`/`Slice`.

use std::collections::BTreeSet;

use crate::driver::{
    Action, Command, FlowDelete, FlowMatch, FlowMod, GroupMod, GroupTarget, OutputPort,
    BROADCAST_COOKIE,
};
use crate::flowbuild::{first_tag_match, tuple_action, tuple_match, TABLE_CLASSIFY, TABLE_FORWARD};
use crate::group::GroupId;
use crate::switch::{SliceId, Switch};
use crate::tuple::{fmt_tuples, Tuple};

impl Switch {
    /// Runs the attach sequence: wipe any prior flow/group state, install
    /// the permanent LLDP-drop rule, register the ports the datapath
    /// reports, then force a full static reinstall.
    pub fn attach(&mut self, ports: &[u32]) -> Vec<Command> {
        log::info!("{}: new switch", self.dpid());
        let mut cmds = Self::attach_commands();
        self.set_attached(true);
        for &port in ports {
            self.port_added(port);
        }
        self.invalidate_all();
        cmds.extend(self.revalidate());
        cmds
    }

    /// Records that the datapath session dropped. `revalidate` becomes a
    /// no-op until the next `attach` (spec.md §7, "Switch link down").
    pub fn detach(&mut self) {
        log::info!("{}: switch detached", self.dpid());
        self.set_attached(false);
    }

    /// Drains the invalidation queues, emitting the minimal batch of
    /// mutation commands needed to converge the switch toward the
    /// declared target state. A no-op if no datapath is attached.
    pub fn revalidate(&mut self) -> Vec<Command> {
        if !self.attached {
            return Vec::new();
        }
        log::info!("{}: revalidating...", self.dpid());
        let mut cmds = Vec::new();

        let mut tuples_to_reset: BTreeSet<Tuple> = BTreeSet::new();
        for sid in self.invalid_slices.clone() {
            if let Some(slice) = self.slices.get(&sid) {
                tuples_to_reset.extend(slice.established.difference(&slice.target));
            }
        }
        for t in tuples_to_reset {
            cmds.extend(self.delete_dynamic_rules(t));
        }

        for sid in self.invalid_slices.clone() {
            self.sanitize_slice(sid);
        }

        for sid in self.invalid_slices.clone() {
            cmds.extend(self.delete_static_rules(sid));
        }
        for sid in self.invalid_slices.clone() {
            cmds.extend(self.add_static_rules(sid));
        }

        for sid in self.invalid_slices.clone() {
            self.match_slice(sid);
        }
        self.invalid_slices.clear();
        self.collect_garbage();

        cmds.extend(self.revalidate_first_tag_rules());

        log::info!("{}: revalidating complete", self.dpid());
        cmds
    }

    /// Deletes every dynamic rule/group attributable to a single tuple
    /// that just left its slice (orphan cleanup, §4.7 step 1; also used
    /// directly by the learning engine's flow-removed handling).
    pub(crate) fn delete_dynamic_rules(&mut self, tuple: Tuple) -> Vec<Command> {
        let mut cmds = Vec::new();
        self.invalidate_first_tag_rule(tuple);
        let (m, table, _priority) = tuple_match(tuple, None);
        cmds.push(Command::DeleteFlow(FlowDelete::new(table, m)));

        if let Some(group) = self.groups.release_tuple(&tuple) {
            log::info!("{}: deleting group {} for {tuple}", self.dpid(), group.0);
            cmds.push(Command::DeleteGroup(GroupTarget::Id(group)));
            cmds.push(Command::DeleteFlow(FlowDelete::filtered_by_cookie(
                TABLE_FORWARD,
                FlowMatch::default(),
                group.0 as u64,
            )));
            cmds.push(Command::DeleteFlow(FlowDelete::new(
                TABLE_FORWARD,
                FlowMatch {
                    metadata: Some(group.0 as u64),
                    ..Default::default()
                },
            )));
        }
        cmds
    }

    pub(crate) fn invalidate_first_tag_rule(&mut self, tuple: Tuple) {
        if let Some(vlan) = tuple.first_vlan() {
            self.invalid_first_tag_rules.insert((tuple.port(), vlan));
        }
    }

    /// A T0 rule popping `tuple`'s outer tag into metadata and passing to
    /// T1, if `tuple` is tagged at all (spec.md §4.7 step 4, §4.8).
    pub(crate) fn ensure_first_tag_rule(&mut self, tuple: Tuple) -> Option<Command> {
        let vlan = tuple.first_vlan()?;
        let mut fm = FlowMod::new(TABLE_CLASSIFY, 4, first_tag_match(tuple.port(), vlan));
        fm.actions = vec![Action::PopVlan, Action::SetMetadata(vlan as u64)];
        fm.goto_table = Some(crate::flowbuild::TABLE_ELINE);
        Some(Command::InstallFlow(fm))
    }

    fn delete_static_rules(&mut self, sid: SliceId) -> Vec<Command> {
        let (established, sanitized) = match self.slices.get(&sid) {
            Some(s) if s.established != s.sanitized => (s.established.clone(), s.sanitized.clone()),
            _ => return Vec::new(),
        };
        log::info!(
            "{}: {} -> {}",
            self.dpid(),
            fmt_tuples(&established.iter().copied().collect::<Vec<_>>()),
            fmt_tuples(&sanitized.iter().copied().collect::<Vec<_>>())
        );

        let oldtups: Vec<Tuple> = if established.len() == 2 || sanitized.len() <= 2 {
            established.iter().copied().collect()
        } else {
            established.difference(&sanitized).copied().collect()
        };

        let mut cmds = Vec::new();
        for &t in &oldtups {
            self.invalidate_first_tag_rule(t);
            let (m, table, _priority) = tuple_match(t, None);
            let del = match self.groups.get(&t) {
                Some(group) => FlowDelete {
                    out_port: Some(OutputPort::Controller { max_len: 0 }),
                    ..FlowDelete::filtered_by_cookie(table, m, group.0 as u64)
                },
                None => FlowDelete::new(table, m),
            };
            cmds.push(Command::DeleteFlow(del));
        }

        if sanitized.len() <= 2 && established.len() > 2 {
            for &t in &oldtups {
                if let Some(group) = self.groups.release_tuple(&t) {
                    log::info!("{}: deleting group {} for {t}", self.dpid(), group.0);
                    cmds.push(Command::DeleteGroup(GroupTarget::Id(group)));
                    cmds.push(Command::DeleteFlow(FlowDelete::filtered_by_cookie(
                        TABLE_FORWARD,
                        FlowMatch::default(),
                        group.0 as u64,
                    )));
                    cmds.push(Command::DeleteFlow(FlowDelete::new(
                        TABLE_FORWARD,
                        FlowMatch {
                            metadata: Some(group.0 as u64),
                            ..Default::default()
                        },
                    )));
                }
            }
        }
        cmds
    }

    fn add_static_rules(&mut self, sid: SliceId) -> Vec<Command> {
        let (established, sanitized) = match self.slices.get(&sid) {
            Some(s) if s.established != s.sanitized => (s.established.clone(), s.sanitized.clone()),
            _ => return Vec::new(),
        };
        if sanitized.len() < 2 {
            return Vec::new();
        }

        let mut cmds = Vec::new();

        if sanitized.len() == 2 {
            let tups: Vec<Tuple> = sanitized.iter().copied().collect();
            for i in 0..2 {
                let this = tups[i];
                let other = tups[1 - i];
                if let Some(c) = self.ensure_first_tag_rule(this) {
                    cmds.push(c);
                }
                log::info!("{}: adding e-line for {this}->{other}", self.dpid());
                let (m, table, priority) = tuple_match(this, None);
                let mut fm = FlowMod::new(table, priority, m);
                fm.actions = tuple_action(other, this.port());
                cmds.push(Command::InstallFlow(fm));
            }
            return cmds;
        }

        let newports: BTreeSet<Tuple> = if established.len() <= 2 {
            sanitized.clone()
        } else {
            sanitized.difference(&established).copied().collect()
        };

        for &stup in &sanitized {
            let added = self.groups.get(&stup).is_none();
            let group = self.groups.claim_for_tuple(stup);
            log::info!(
                "{}: updating group {} tuple {stup}->{}",
                self.dpid(),
                group.0,
                fmt_tuples(
                    &sanitized
                        .iter()
                        .filter(|d| **d != stup)
                        .copied()
                        .collect::<Vec<_>>()
                )
            );
            let buckets: Vec<Vec<Action>> = sanitized
                .iter()
                .filter(|d| **d != stup)
                .map(|&d| tuple_action(d, stup.port()))
                .collect();
            cmds.push(Command::InstallGroup(GroupMod {
                group_id: group,
                buckets,
                modify: !added,
            }));

            if added {
                let mut fm = FlowMod::new(
                    TABLE_FORWARD,
                    1,
                    FlowMatch {
                        metadata: Some(group.0 as u64),
                        ..Default::default()
                    },
                );
                fm.actions = vec![Action::Group(group.0)];
                fm.cookie = BROADCAST_COOKIE;
                cmds.push(Command::InstallFlow(fm));
            }
        }

        for &stup in &newports {
            let group: GroupId = self.groups.get(&stup).expect("claimed above");
            let (m, table, priority) = tuple_match(stup, None);
            let mut fm = FlowMod::new(table, priority, m);
            fm.actions = vec![Action::Output(OutputPort::Controller { max_len: 0xFFFF })];
            fm.cookie = group.0 as u64;
            cmds.push(Command::InstallFlow(fm));
            if let Some(c) = self.ensure_first_tag_rule(stup) {
                cmds.push(c);
            }
        }

        cmds
    }

    /// Deletes any T0 first-tag rule no longer required by a live tuple of
    /// length ≥ 2 (spec.md §4.7 step 6).
    fn revalidate_first_tag_rules(&mut self) -> Vec<Command> {
        for t in self.target_index.keys() {
            if let Some(vlan) = t.first_vlan() {
                self.invalid_first_tag_rules.remove(&(t.port(), vlan));
            }
        }
        let cmds = self
            .invalid_first_tag_rules
            .iter()
            .map(|&(port, vlan)| {
                Command::DeleteFlow(FlowDelete::new(TABLE_CLASSIFY, first_tag_match(port, vlan)))
            })
            .collect();
        self.invalid_first_tag_rules.clear();
        cmds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dpid::Dpid;

    fn dpid() -> Dpid {
        Dpid(1)
    }

    #[test]
    fn revalidate_is_a_no_op_without_a_datapath() {
        let mut sw = Switch::new(dpid());
        sw.create_slice(&[Tuple::untagged(1)]);
        assert!(sw.revalidate().is_empty());
    }

    #[test]
    fn attach_then_drop_slice_emits_no_dynamic_flows() {
        let mut sw = Switch::new(dpid());
        sw.attach(&[1, 2, 3]);
        sw.create_slice(&[Tuple::untagged(1)]);
        let cmds = sw.revalidate();
        assert!(cmds.is_empty());
    }

    #[test]
    fn attach_then_eline_installs_two_flows_and_first_tag_rules() {
        let mut sw = Switch::new(dpid());
        sw.attach(&[1, 2, 3]);
        sw.create_slice(&[Tuple::c_tagged(1, 100), Tuple::c_tagged(2, 200)]);
        let cmds = sw.revalidate();
        let installs = cmds
            .iter()
            .filter(|c| matches!(c, Command::InstallFlow(_)))
            .count();
        assert_eq!(installs, 4);
        assert!(cmds.iter().all(|c| !matches!(c, Command::InstallGroup(_))));
    }

    #[test]
    fn attach_then_three_tuple_slice_allocates_groups_and_flood_rules() {
        let mut sw = Switch::new(dpid());
        sw.attach(&[1, 2, 3]);
        sw.create_slice(&[
            Tuple::c_tagged(1, 100),
            Tuple::untagged(2),
            Tuple::s_tagged(3, 50, 60),
        ]);
        let cmds = sw.revalidate();
        let groups = cmds
            .iter()
            .filter(|c| matches!(c, Command::InstallGroup(_)))
            .count();
        assert_eq!(groups, 3);
        let flood_rules = cmds
            .iter()
            .filter(|c| matches!(c, Command::InstallFlow(fm) if fm.cookie == BROADCAST_COOKIE))
            .count();
        assert_eq!(flood_rules, 3);
    }

    #[test]
    fn losing_a_port_shrinks_a_three_tuple_slice_to_an_eline() {
        let mut sw = Switch::new(dpid());
        sw.attach(&[1, 2, 3]);
        sw.create_slice(&[
            Tuple::c_tagged(1, 100),
            Tuple::untagged(2),
            Tuple::s_tagged(3, 50, 60),
        ]);
        sw.revalidate();
        sw.port_removed(3);
        let cmds = sw.revalidate();
        assert!(cmds.iter().any(|c| matches!(c, Command::DeleteGroup(_))));
        let eline_installs = cmds
            .iter()
            .filter(|c| matches!(c, Command::InstallFlow(fm) if fm.table == crate::flowbuild::TABLE_ELINE && fm.priority == 4))
            .count();
        assert_eq!(eline_installs, 2);
    }
}
