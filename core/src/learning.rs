// SPDX-License-Identifier: Apache-2.0

//! Reacts to packet-in (unrecognized source) and flow-removed
//! (idle-timeout) notifications to install and retire per-destination
//! unicast rules (spec.md §4.9).

use crate::driver::{Action, Command, FlowDelete, FlowMatch, FlowMod, MacAddr, OutputPort, PacketOut};
use crate::event::{FlowRemovedReason, MatchedTuple};
use crate::flowbuild::{reconstruct_tuple, tuple_action, tuple_match, TABLE_FORWARD};
use crate::switch::Switch;
use crate::tuple::Tuple;

impl Switch {
    /// A packet arrived with a source MAC the classifier didn't
    /// recognize. Learn it, then hand back the commands needed to retire
    /// stale rules, install fresh ones, barrier, and resubmit the packet.
    pub fn handle_packet_in(
        &mut self,
        matched: MatchedTuple,
        eth_src: MacAddr,
        raw_frame: Vec<u8>,
        buffer_id: Option<u32>,
    ) -> Vec<Command> {
        let Some(tuple) = reconstruct_tuple(&matched) else {
            return Vec::new();
        };
        let timeout = self.config().learn_idle_timeout_secs;
        let mut cmds = self.learn(tuple, eth_src, timeout);
        cmds.push(Command::Barrier);

        let mut actions = Vec::new();
        match tuple {
            Tuple::STagged { outer, .. } => {
                actions.push(Action::PushVlan { ethertype: 0x88A8 });
                actions.push(Action::SetVlanVid(0x1000 | outer));
            }
            Tuple::CTagged { vlan, .. } => {
                actions.push(Action::PushVlan { ethertype: 0x8100 });
                actions.push(Action::SetVlanVid(0x1000 | vlan));
            }
            Tuple::Untagged { .. } => {}
        }
        actions.push(Action::Output(OutputPort::Table));
        cmds.push(Command::SendPacketOut(PacketOut {
            in_port: tuple.port(),
            buffer_id,
            raw_frame: Some(raw_frame),
            actions,
        }));
        cmds
    }

    /// A learned rule idle-timed-out: retract that MAC from every peer in
    /// its slice. Other flow-removed reasons carry no meaning here and
    /// are ignored (spec.md §7).
    pub fn handle_flow_removed(
        &mut self,
        matched: MatchedTuple,
        eth_src: MacAddr,
        reason: FlowRemovedReason,
    ) -> Vec<Command> {
        if reason != FlowRemovedReason::IdleTimeout {
            return Vec::new();
        }
        let Some(tuple) = reconstruct_tuple(&matched) else {
            return Vec::new();
        };
        let Some(group) = self.groups.get(&tuple) else {
            return Vec::new();
        };
        log::info!("{}: {tuple}/G{:03}/{eth_src} not heard from", self.dpid(), group.0);
        vec![Command::DeleteFlow(FlowDelete::filtered_by_cookie(
            TABLE_FORWARD,
            FlowMatch {
                eth_dst: Some(eth_src),
                ..Default::default()
            },
            group.0 as u64,
        ))]
    }

    /// Hand-fed learning, for a caller that wants to seed a MAC without
    /// waiting for a real packet-in (the HTTP `learn` change, spec.md
    /// §4.10/§6). `timeout` falls back to the configured default.
    pub fn learn_mac(&mut self, tuple: Tuple, mac: MacAddr, timeout: Option<u32>) -> Vec<Command> {
        let timeout = timeout.unwrap_or(self.config().learn_idle_timeout_secs);
        self.learn(tuple, mac, timeout)
    }

    /// Installs the per-destination forwarding rules and the ingress
    /// suppression rule for `mac` arriving on `tuple`, after first
    /// draining any pending revalidation (matching the original's `_learn`
    /// calling `revalidate` before touching any slice state).
    fn learn(&mut self, tuple: Tuple, mac: MacAddr, timeout: u32) -> Vec<Command> {
        log::info!("{}: {mac} new on {tuple}", self.dpid());
        let mut cmds = self.revalidate();

        let Some(sid) = self.owner_of(&tuple) else {
            return cmds;
        };
        // A tuple in a slice with fewer than 3 members has no group; the
        // packet is still resubmitted by the caller, but learning itself
        // is a no-op here (spec.md §9 Open Question #2).
        let Some(group) = self.groups.get(&tuple) else {
            return cmds;
        };
        let peers: Vec<Tuple> = self
            .slice(sid)
            .map(|s| s.target.iter().copied().collect())
            .unwrap_or_default();

        for &dtup in &peers {
            let Some(dgroup) = self.groups.get(&dtup) else {
                continue;
            };
            let mut fm = FlowMod::new(
                TABLE_FORWARD,
                2,
                FlowMatch {
                    metadata: Some(dgroup.0 as u64),
                    eth_dst: Some(mac),
                    ..Default::default()
                },
            );
            fm.actions = if group == dgroup {
                Vec::new()
            } else {
                tuple_action(tuple, dtup.port())
            };
            fm.cookie = group.0 as u64;
            cmds.push(Command::InstallFlow(fm));
        }

        for &stup in &peers {
            if stup == tuple {
                continue;
            }
            let Some(sgroup) = self.groups.get(&stup) else {
                continue;
            };
            let (_, table, _) = tuple_match(stup, Some(mac));
            cmds.push(Command::DeleteFlow(FlowDelete::filtered_by_cookie(
                table,
                FlowMatch {
                    eth_src: Some(mac),
                    ..Default::default()
                },
                sgroup.0 as u64,
            )));
        }

        let (m, table, priority) = tuple_match(tuple, Some(mac));
        let mut fm = FlowMod::new(table, priority + 1, m);
        fm.actions = {
            let mut a = vec![Action::SetMetadata(group.0 as u64)];
            if tuple.len() > 2 {
                a.push(Action::PopVlan);
            }
            a
        };
        fm.goto_table = Some(TABLE_FORWARD);
        fm.cookie = group.0 as u64;
        fm.idle_timeout = timeout;
        fm.send_flow_removed = true;
        cmds.push(Command::InstallFlow(fm));

        cmds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dpid::Dpid;
    use std::str::FromStr;

    fn mac() -> MacAddr {
        MacAddr::from_str("aa:bb:cc:dd:ee:01").unwrap()
    }

    #[test]
    fn packet_in_on_an_ungrouped_tuple_still_resubmits() {
        let mut sw = Switch::new(Dpid(1));
        sw.attach(&[1, 2]);
        sw.create_slice(&[Tuple::untagged(1), Tuple::untagged(2)]);
        sw.revalidate();
        let cmds = sw.handle_packet_in(
            MatchedTuple {
                table_id: 0,
                in_port: 1,
                metadata: None,
                vlan_vid: None,
            },
            mac(),
            vec![],
            None,
        );
        assert!(matches!(cmds.last(), Some(Command::SendPacketOut(_))));
        assert!(cmds.iter().any(|c| matches!(c, Command::Barrier)));
    }

    #[test]
    fn packet_in_on_a_grouped_tuple_installs_forward_and_suppression_rules() {
        let mut sw = Switch::new(Dpid(1));
        sw.attach(&[1, 2, 3]);
        sw.create_slice(&[
            Tuple::untagged(1),
            Tuple::untagged(2),
            Tuple::untagged(3),
        ]);
        sw.revalidate();
        let cmds = sw.handle_packet_in(
            MatchedTuple {
                table_id: 0,
                in_port: 2,
                metadata: None,
                vlan_vid: None,
            },
            mac(),
            vec![],
            None,
        );
        let forward_installs = cmds
            .iter()
            .filter(|c| matches!(c, Command::InstallFlow(fm) if fm.table == TABLE_FORWARD && fm.priority == 2))
            .count();
        // One rule per tuple in the slice, including the source tuple
        // itself (its rule has empty actions — a drop — per spec.md §4.9's
        // "else empty actions" clause, which is only reachable when g == gd).
        assert_eq!(forward_installs, 3);
        assert!(cmds
            .iter()
            .any(|c| matches!(c, Command::InstallFlow(fm) if fm.send_flow_removed)));
    }

    #[test]
    fn flow_removed_with_other_reasons_is_ignored() {
        let mut sw = Switch::new(Dpid(1));
        sw.attach(&[1, 2, 3]);
        sw.create_slice(&[
            Tuple::untagged(1),
            Tuple::untagged(2),
            Tuple::untagged(3),
        ]);
        sw.revalidate();
        let cmds = sw.handle_flow_removed(
            MatchedTuple {
                table_id: 0,
                in_port: 2,
                metadata: None,
                vlan_vid: None,
            },
            mac(),
            FlowRemovedReason::Delete,
        );
        assert!(cmds.is_empty());
    }

    #[test]
    fn flow_removed_on_idle_timeout_retracts_the_mac() {
        let mut sw = Switch::new(Dpid(1));
        sw.attach(&[1, 2, 3]);
        sw.create_slice(&[
            Tuple::untagged(1),
            Tuple::untagged(2),
            Tuple::untagged(3),
        ]);
        sw.revalidate();
        sw.handle_packet_in(
            MatchedTuple {
                table_id: 0,
                in_port: 2,
                metadata: None,
                vlan_vid: None,
            },
            mac(),
            vec![],
            None,
        );
        let cmds = sw.handle_flow_removed(
            MatchedTuple {
                table_id: 0,
                in_port: 2,
                metadata: None,
                vlan_vid: None,
            },
            mac(),
            FlowRemovedReason::IdleTimeout,
        );
        assert_eq!(cmds.len(), 1);
        assert!(matches!(&cmds[0], Command::DeleteFlow(fd) if fd.m.eth_dst == Some(mac())));
    }
}
