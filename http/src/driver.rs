// SPDX-License-Identifier: Apache-2.0

//! A `SwitchDriver` stand-in that only logs the commands it is handed. The
//! real OpenFlow wire session is external and out of scope (spec.md §1);
//! this plays the same role as the teacher's `plugin_demo`, a no-op stand-in
//! proving the trait boundary without a real backend behind it.

use async_trait::async_trait;

use ofslicer::{
    Dpid, FlowDelete, FlowMod, GroupMod, GroupTarget, PacketOut, SlicerError, SwitchDriver,
};

#[derive(Debug, Default)]
pub struct LoggingDriver;

#[async_trait]
impl SwitchDriver for LoggingDriver {
    async fn install_flow(&self, dpid: Dpid, flow: FlowMod) -> Result<(), SlicerError> {
        log::info!("{dpid}: install_flow table={} priority={} cookie={:#x}", flow.table, flow.priority, flow.cookie);
        Ok(())
    }

    async fn delete_flow(&self, dpid: Dpid, del: FlowDelete) -> Result<(), SlicerError> {
        log::info!("{dpid}: delete_flow table={} cookie_mask={:#x}", del.table, del.cookie_mask);
        Ok(())
    }

    async fn install_group(&self, dpid: Dpid, group: GroupMod) -> Result<(), SlicerError> {
        log::info!(
            "{dpid}: {} group {} with {} buckets",
            if group.modify { "modify" } else { "install" },
            group.group_id.0,
            group.buckets.len()
        );
        Ok(())
    }

    async fn delete_group(&self, dpid: Dpid, target: GroupTarget) -> Result<(), SlicerError> {
        match target {
            GroupTarget::All => log::info!("{dpid}: delete_group all"),
            GroupTarget::Id(group_id) => log::info!("{dpid}: delete_group {}", group_id.0),
        }
        Ok(())
    }

    async fn send_barrier(&self, dpid: Dpid) -> Result<(), SlicerError> {
        log::debug!("{dpid}: barrier");
        Ok(())
    }

    async fn send_packet_out(&self, dpid: Dpid, out: PacketOut) -> Result<(), SlicerError> {
        log::debug!("{dpid}: packet_out in_port={}", out.in_port);
        Ok(())
    }
}
