// SPDX-License-Identifier: Apache-2.0

//! Owns one [`ofslicer::Switch`] per datapath and drives the [`Command`]s it
//! emits through an injected [`SwitchDriver`]. This is the single-threaded
//! cooperative domain spec.md §5 asks for: mutations against one datapath
//! serialize on that datapath's own `tokio::sync::Mutex`, while two
//! datapaths proceed independently of each other.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use ofslicer::{Command, Dpid, MacAddr, SlicerError, Switch, SwitchDriver, SwitchEvent, Tuple};

/// The three fields a `POST .../config/{dpid}` body may carry, already
/// deserialized and tuple-validated (spec.md §4.10/§6).
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    pub disused: Vec<Tuple>,
    pub slices: Vec<Vec<Tuple>>,
    pub learn: Option<LearnRequest>,
}

#[derive(Debug, Clone)]
pub struct LearnRequest {
    pub mac: MacAddr,
    pub tuple: Tuple,
    pub timeout: Option<u32>,
}

pub struct Controller {
    switches: Mutex<HashMap<Dpid, Arc<Mutex<Switch>>>>,
    driver: Arc<dyn SwitchDriver>,
}

impl Controller {
    pub fn new(driver: Arc<dyn SwitchDriver>) -> Self {
        Self {
            switches: Mutex::new(HashMap::new()),
            driver,
        }
    }

    async fn switch_for(&self, dpid: Dpid) -> Arc<Mutex<Switch>> {
        let mut switches = self.switches.lock().await;
        switches
            .entry(dpid)
            .or_insert_with(|| Arc::new(Mutex::new(Switch::new(dpid))))
            .clone()
    }

    async fn existing_switch(&self, dpid: Dpid) -> Option<Arc<Mutex<Switch>>> {
        self.switches.lock().await.get(&dpid).cloned()
    }

    /// `GET /slicer/api/v1/config/{dpid}` — `None` means the datapath has
    /// never been seen, which the caller turns into a `404` (spec.md §7).
    pub async fn get_config(&self, dpid: Dpid) -> Option<Vec<Vec<Tuple>>> {
        let sw = self.existing_switch(dpid).await?;
        let sw = sw.lock().await;
        Some(sw.get_config())
    }

    /// `POST /slicer/api/v1/config/{dpid}` — always succeeds for a
    /// well-formed body; an unknown datapath lazily gets a blank state
    /// (spec.md §7). Returns the post-revalidate configuration.
    pub async fn apply(&self, dpid: Dpid, change: ChangeSet) -> Vec<Vec<Tuple>> {
        let sw = self.switch_for(dpid).await;
        let cmds = {
            let mut sw = sw.lock().await;
            for tuple in change.disused {
                sw.discard_tuple(tuple);
            }
            for tuples in &change.slices {
                sw.create_slice(tuples);
            }
            let mut cmds = if let Some(learn) = change.learn {
                sw.learn_mac(learn.tuple, learn.mac, learn.timeout)
            } else {
                Vec::new()
            };
            cmds.extend(sw.revalidate());
            cmds
        };
        self.drive(dpid, cmds).await;
        let sw = sw.lock().await;
        sw.get_config()
    }

    /// Feeds a [`SwitchEvent`] from the (externally owned) OpenFlow wire
    /// session through the matching `Switch`, driving the resulting
    /// commands the same way `apply` does (spec.md §6.2).
    pub async fn handle_event(&self, event: SwitchEvent) {
        let dpid = event.dpid();
        let sw = self.switch_for(dpid).await;
        let cmds = {
            let mut sw = sw.lock().await;
            sw.handle_event(event)
        };
        self.drive(dpid, cmds).await;
    }

    async fn drive(&self, dpid: Dpid, cmds: Vec<Command>) {
        for cmd in cmds {
            if let Err(e) = self.apply_one(dpid, cmd).await {
                // No retry here by design (spec.md §7): a driver refusal is
                // a logged transient, and the next triggering event will
                // re-enqueue through the idempotent revalidate pass.
                log::warn!("{dpid}: switch driver rejected a mutation: {e}");
            }
        }
    }

    async fn apply_one(&self, dpid: Dpid, cmd: Command) -> Result<(), SlicerError> {
        match cmd {
            Command::InstallFlow(flow) => self.driver.install_flow(dpid, flow).await,
            Command::DeleteFlow(del) => self.driver.delete_flow(dpid, del).await,
            Command::InstallGroup(group) => self.driver.install_group(dpid, group).await,
            Command::DeleteGroup(group_id) => self.driver.delete_group(dpid, group_id).await,
            Command::Barrier => self.driver.send_barrier(dpid).await,
            Command::SendPacketOut(out) => self.driver.send_packet_out(dpid, out).await,
        }
    }
}
