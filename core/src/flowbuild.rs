// SPDX-License-Identifier: Apache-2.0

//! Pure functions translating a [`Tuple`] into the match/action shapes the
//! switch understands. Nothing here touches `Switch` state; see spec.md
//! §4.3.

use crate::driver::{Action, FlowMatch, MacAddr, OutputPort};
use crate::event::MatchedTuple;
use crate::tuple::Tuple;

pub const TABLE_CLASSIFY: u8 = 0;
pub const TABLE_ELINE: u8 = 1;
pub const TABLE_LEARN: u8 = 1;
pub const TABLE_FORWARD: u8 = 2;

const VLAN_PRESENT: u16 = 0x1000;
const ETH_TYPE_8021Q: u16 = 0x8100;
const ETH_TYPE_8021AD: u16 = 0x88A8;

/// The `(match, table, priority)` identifying traffic arriving on `t`,
/// optionally narrowed to a specific source MAC.
pub fn tuple_match(t: Tuple, mac: Option<MacAddr>) -> (FlowMatch, u8, u16) {
    let base = FlowMatch {
        eth_src: mac,
        ..Default::default()
    };
    match t {
        Tuple::Untagged { port } => (
            FlowMatch {
                in_port: Some(port),
                ..base
            },
            TABLE_CLASSIFY,
            4,
        ),
        Tuple::CTagged { port, vlan } => (
            FlowMatch {
                in_port: Some(port),
                metadata: Some(vlan as u64),
                ..base
            },
            TABLE_ELINE,
            4,
        ),
        Tuple::STagged { port, outer, inner } => (
            FlowMatch {
                in_port: Some(port),
                metadata: Some(outer as u64),
                vlan_vid: Some(VLAN_PRESENT | inner),
                ..base
            },
            TABLE_ELINE,
            4,
        ),
    }
}

/// The action list emitting a packet back out toward `t`, substituting
/// `IN_PORT` for a literal port when `t`'s port equals the packet's
/// ingress port. Used both as a group bucket and as a learned T2 rule's
/// instruction list.
pub fn tuple_action(t: Tuple, in_port: u32) -> Vec<Action> {
    let out = if t.port() == in_port {
        OutputPort::InPort
    } else {
        OutputPort::Port(t.port())
    };
    match t {
        Tuple::Untagged { .. } => vec![Action::Output(out)],
        Tuple::CTagged { vlan, .. } => vec![
            Action::PushVlan {
                ethertype: ETH_TYPE_8021Q,
            },
            Action::SetVlanVid(VLAN_PRESENT | vlan),
            Action::Output(out),
        ],
        Tuple::STagged { outer, inner, .. } => vec![
            Action::PushVlan {
                ethertype: ETH_TYPE_8021Q,
            },
            Action::SetVlanVid(VLAN_PRESENT | inner),
            Action::PushVlan {
                ethertype: ETH_TYPE_8021AD,
            },
            Action::SetVlanVid(VLAN_PRESENT | outer),
            Action::Output(out),
        ],
    }
}

/// The T0 first-tag match: `in_port=port, vlan_vid=PRESENT|vlan`, which
/// pops the outer tag, saves it as metadata, and passes on to T1.
pub fn first_tag_match(port: u32, vlan: u16) -> FlowMatch {
    FlowMatch {
        in_port: Some(port),
        vlan_vid: Some(VLAN_PRESENT | vlan),
        ..Default::default()
    }
}

/// Reconstruct the ingress tuple from a packet-in/flow-removed's matched
/// fields, per spec.md §4.9.
pub fn reconstruct_tuple(m: &MatchedTuple) -> Option<Tuple> {
    if m.table_id == 0 {
        return Some(Tuple::untagged(m.in_port));
    }
    let metadata = m.metadata?;
    let outer = u16::try_from(metadata).ok()?;
    match m.vlan_vid {
        Some(vlan_vid) if vlan_vid & VLAN_PRESENT != 0 => {
            let inner = vlan_vid & 0x0FFF;
            Some(Tuple::s_tagged(m.in_port, outer, inner))
        }
        _ => Some(Tuple::c_tagged(m.in_port, outer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_match_shapes_match_the_spec() {
        let (m, t, p) = tuple_match(Tuple::untagged(6), None);
        assert_eq!((m.in_port, t, p), (Some(6), TABLE_CLASSIFY, 4));

        let (m, t, p) = tuple_match(Tuple::c_tagged(6, 100), None);
        assert_eq!((m.in_port, m.metadata, t, p), (Some(6), Some(100), TABLE_ELINE, 4));

        let (m, t, p) = tuple_match(Tuple::s_tagged(6, 100, 200), None);
        assert_eq!(m.in_port, Some(6));
        assert_eq!(m.metadata, Some(100));
        assert_eq!(m.vlan_vid, Some(VLAN_PRESENT | 200));
        assert_eq!((t, p), (TABLE_ELINE, 4));
    }

    #[test]
    fn tuple_action_substitutes_in_port() {
        let actions = tuple_action(Tuple::untagged(6), 6);
        assert_eq!(actions, vec![Action::Output(OutputPort::InPort)]);

        let actions = tuple_action(Tuple::untagged(6), 1);
        assert_eq!(actions, vec![Action::Output(OutputPort::Port(6))]);
    }

    #[test]
    fn tuple_action_for_double_tag_pushes_inner_then_outer() {
        let actions = tuple_action(Tuple::s_tagged(6, 100, 200), 1);
        assert_eq!(
            actions,
            vec![
                Action::PushVlan { ethertype: ETH_TYPE_8021Q },
                Action::SetVlanVid(VLAN_PRESENT | 200),
                Action::PushVlan { ethertype: ETH_TYPE_8021AD },
                Action::SetVlanVid(VLAN_PRESENT | 100),
                Action::Output(OutputPort::Port(6)),
            ]
        );
    }

    #[test]
    fn reconstruct_tuple_covers_all_three_shapes() {
        assert_eq!(
            reconstruct_tuple(&MatchedTuple {
                table_id: 0,
                in_port: 1,
                metadata: None,
                vlan_vid: None,
            }),
            Some(Tuple::untagged(1))
        );
        assert_eq!(
            reconstruct_tuple(&MatchedTuple {
                table_id: 1,
                in_port: 2,
                metadata: Some(100),
                vlan_vid: None,
            }),
            Some(Tuple::c_tagged(2, 100))
        );
        assert_eq!(
            reconstruct_tuple(&MatchedTuple {
                table_id: 1,
                in_port: 3,
                metadata: Some(100),
                vlan_vid: Some(VLAN_PRESENT | 200),
            }),
            Some(Tuple::s_tagged(3, 100, 200))
        );
    }
}
