// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dpid::Dpid;
use crate::error::SlicerError;
use crate::group::GroupId;

/// An Ethernet hardware address, formatted the way the original logged
/// MACs: lowercase, colon-separated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddr {
    type Err = SlicerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 6];
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(SlicerError::invalid_argument(format!(
                "mac address must have 6 colon-separated octets, got {s:?}"
            )));
        }
        for (i, p) in parts.iter().enumerate() {
            out[i] = u8::from_str_radix(p, 16)
                .map_err(|_| SlicerError::invalid_argument(format!("bad octet {p:?} in {s:?}")))?;
        }
        Ok(Self(out))
    }
}

/// The output target of an `Action::Output`. `InPort` is substituted for a
/// literal port number when the destination tuple's port equals the
/// packet's ingress port (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPort {
    Port(u32),
    InPort,
    Controller { max_len: u16 },
    Table,
}

/// One action in an apply-actions instruction, or a bare action list used
/// as a group bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    PushVlan { ethertype: u16 },
    SetVlanVid(u16),
    PopVlan,
    SetMetadata(u64),
    Output(OutputPort),
    Group(u32),
}

/// A partial OpenFlow match. Fields left `None` are wildcarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowMatch {
    pub in_port: Option<u32>,
    pub metadata: Option<u64>,
    /// Includes the OFPVID_PRESENT bit (`0x1000`) when a tag is asserted,
    /// matching the wire convention the original used directly.
    pub vlan_vid: Option<u16>,
    pub eth_src: Option<MacAddr>,
    pub eth_dst: Option<MacAddr>,
    pub eth_type: Option<u16>,
}

/// The all-ones cookie marking a group's static broadcast rule, as
/// distinct from the per-tuple cookies used everywhere else (§4.8).
pub const BROADCAST_COOKIE: u64 = 0xFFFF_FFFF_FFFF_FFFF;
/// The default cookie of a plain classifier rule that carries no
/// tuple-ownership meaning.
pub const CLASSIFY_COOKIE: u64 = 0;

/// A flow-mod add/modify command for one of the three tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMod {
    pub table: u8,
    pub priority: u16,
    pub m: FlowMatch,
    pub actions: Vec<Action>,
    pub goto_table: Option<u8>,
    pub cookie: u64,
    pub idle_timeout: u32,
    pub send_flow_removed: bool,
}

impl FlowMod {
    pub fn new(table: u8, priority: u16, m: FlowMatch) -> Self {
        Self {
            table,
            priority,
            m,
            actions: Vec::new(),
            goto_table: None,
            cookie: CLASSIFY_COOKIE,
            idle_timeout: 0,
            send_flow_removed: false,
        }
    }
}

/// A flow-mod delete command. `cookie_mask = 0` (the default) means the
/// cookie is ignored when matching, mirroring an unfiltered delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowDelete {
    pub table: u8,
    pub m: FlowMatch,
    pub cookie: u64,
    pub cookie_mask: u64,
    pub out_port: Option<OutputPort>,
    pub out_group: Option<u32>,
}

impl FlowDelete {
    pub fn new(table: u8, m: FlowMatch) -> Self {
        Self {
            table,
            m,
            cookie: 0,
            cookie_mask: 0,
            out_port: None,
            out_group: None,
        }
    }

    pub fn filtered_by_cookie(table: u8, m: FlowMatch, cookie: u64) -> Self {
        Self {
            table,
            m,
            cookie,
            cookie_mask: u64::MAX,
            out_port: None,
            out_group: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMod {
    pub group_id: GroupId,
    pub buckets: Vec<Vec<Action>>,
    pub modify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    pub in_port: u32,
    pub buffer_id: Option<u32>,
    pub raw_frame: Option<Vec<u8>>,
    pub actions: Vec<Action>,
}

/// Which group(s) a `DeleteGroup` command targets. `All` is the wildcard
/// delete the original emits as `OFPG_ALL` at attach time to wipe
/// whatever a prior controller instance left behind, distinct from
/// retiring one tuple's own group during revalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupTarget {
    All,
    Id(GroupId),
}

/// A batch-unit of switch mutation, as emitted by [`crate::switch::Switch`].
///
/// The core stays synchronous; rather than call an async `SwitchDriver`
/// directly it hands the caller a plain `Vec<Command>` in emission order
/// and lets the caller (which owns the async runtime and the actual wire
/// session) drive each one through `SwitchDriver`. This keeps `core` free
/// of any runtime dependency while still respecting the ordering
/// guarantees of spec.md §5 (delete before add, group-add before the
/// flow-mods that reference it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    InstallFlow(FlowMod),
    DeleteFlow(FlowDelete),
    InstallGroup(GroupMod),
    DeleteGroup(GroupTarget),
    Barrier,
    SendPacketOut(PacketOut),
}

/// The injected collaborator that actually owns the OpenFlow wire session
/// for one datapath. `core` never talks to a switch directly; it only
/// produces [`Command`]s for something implementing this trait to apply.
///
/// Declared `#[async_trait]` so it stays object-safe (`Box<dyn
/// SwitchDriver>` / `&dyn SwitchDriver`) despite async methods — plain
/// return-position `impl Future` is not object-safe, which the core needs
/// to hold one trait object per datapath.
#[async_trait]
pub trait SwitchDriver: Send + Sync {
    async fn install_flow(&self, dpid: Dpid, flow: FlowMod) -> Result<(), SlicerError>;
    async fn delete_flow(&self, dpid: Dpid, del: FlowDelete) -> Result<(), SlicerError>;
    async fn install_group(&self, dpid: Dpid, group: GroupMod) -> Result<(), SlicerError>;
    async fn delete_group(&self, dpid: Dpid, target: GroupTarget) -> Result<(), SlicerError>;
    async fn send_barrier(&self, dpid: Dpid) -> Result<(), SlicerError>;
    async fn send_packet_out(&self, dpid: Dpid, out: PacketOut) -> Result<(), SlicerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_round_trips_through_display_and_parse() {
        let mac = MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:01");
        assert_eq!(MacAddr::from_str("aa:bb:cc:dd:ee:01").unwrap(), mac);
    }

    #[test]
    fn mac_parse_rejects_wrong_octet_count() {
        assert!(MacAddr::from_str("aa:bb:cc").is_err());
    }
}
