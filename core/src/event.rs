// SPDX-License-Identifier: Apache-2.0

use crate::driver::MacAddr;
use crate::dpid::Dpid;

/// Why a flow-removed notification fired. Only `IdleTimeout` carries any
/// meaning for the learning engine (§4.9); the rest are ignored safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowRemovedReason {
    IdleTimeout,
    HardTimeout,
    Delete,
    GroupDelete,
}

/// The ingress-side fields of a flow-removed or packet-in notification,
/// enough to reconstruct the tuple that was matched (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedTuple {
    pub table_id: u8,
    pub in_port: u32,
    /// Present for a table-1/2 match; carries the outer VLAN.
    pub metadata: Option<u64>,
    /// Present when a VLAN tag was matched; carries the raw `vlan_vid`
    /// field including the `OFPVID_PRESENT` bit.
    pub vlan_vid: Option<u16>,
}

/// A typed input event the core consumes. The caller owns the OpenFlow
/// wire codec and constructs these from whatever it decodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchEvent {
    DatapathEnter { dpid: Dpid, ports: Vec<u32> },
    DatapathLeave { dpid: Dpid },
    PortAdd { dpid: Dpid, port_no: u32 },
    PortRemove { dpid: Dpid, port_no: u32 },
    PacketIn {
        dpid: Dpid,
        matched: MatchedTuple,
        eth_src: MacAddr,
        raw_frame: Vec<u8>,
        buffer_id: Option<u32>,
    },
    FlowRemoved {
        dpid: Dpid,
        matched: MatchedTuple,
        eth_src: MacAddr,
        reason: FlowRemovedReason,
    },
}

impl SwitchEvent {
    pub fn dpid(&self) -> Dpid {
        match self {
            Self::DatapathEnter { dpid, .. }
            | Self::DatapathLeave { dpid }
            | Self::PortAdd { dpid, .. }
            | Self::PortRemove { dpid, .. }
            | Self::PacketIn { dpid, .. }
            | Self::FlowRemoved { dpid, .. } => *dpid,
        }
    }
}
