// NetVisor: Network Hypervisor for Virtual Big Switches
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # Physical Switch
//!
//! Hypervisor side of a physical switch connection. Messages from the switch are virtualized:
//! replies are handed back to the virtual switch that sent the request, packets are delivered to
//! the tenants owning the ingress port, and port changes are applied to the topology.

use crate::channel::Channel;
use crate::datapath::statistics::StatisticsManager;
use crate::datapath::teardown::Teardown;
use crate::datapath::xid_translator::{XidPair, XidTranslator};
use crate::datapath::{PhysicalPort, Switch, VirtualSwitch};
use crate::hypervisor::Hypervisor;
use crate::message::{OfMessage, Payload, PortDesc, PortReason, PortStatistics, StatsReply};
use crate::types::{
    MappingError, MessageError, PortNumber, PortRef, SwitchError, SwitchId, SwitchState, Xid,
};
use crate::Error;

use arc_swap::ArcSwapOption;
use log::*;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

/// Physical switch connected to the hypervisor.
pub struct PhysicalSwitch {
    switch_id: SwitchId,
    name: String,
    me: Weak<PhysicalSwitch>,
    features: Vec<PortDesc>,
    ports: RwLock<HashMap<PortNumber, PhysicalPort>>,
    state: Mutex<SwitchState>,
    connected: AtomicBool,
    channel: Arc<dyn Channel>,
    translator: XidTranslator,
    port_stats: ArcSwapOption<HashMap<PortNumber, PortStatistics>>,
    stats: StatisticsManager,
    hv: Hypervisor,
}

impl fmt::Debug for PhysicalSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalSwitch")
            .field("switch_id", &self.switch_id)
            .field("name", &self.name)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl PartialEq for PhysicalSwitch {
    fn eq(&self, other: &Self) -> bool {
        self.switch_id == other.switch_id
    }
}

impl Eq for PhysicalSwitch {}

impl Hash for PhysicalSwitch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.switch_id.hash(state)
    }
}

impl PhysicalSwitch {
    /// Create a new physical switch after the handshake on `channel` reported `features`. The
    /// switch is not part of the topology until it is booted.
    pub fn new(
        hv: Hypervisor,
        switch_id: SwitchId,
        name: String,
        features: Vec<PortDesc>,
        channel: Arc<dyn Channel>,
    ) -> Arc<Self> {
        let stats = StatisticsManager::new(hv.settings().stats_interval);
        let translator = XidTranslator::new(hv.settings().xid_capacity);
        Arc::new_cyclic(|me| Self {
            switch_id,
            name,
            me: me.clone(),
            features,
            ports: RwLock::new(HashMap::new()),
            state: Mutex::new(SwitchState::Created),
            connected: AtomicBool::new(true),
            channel,
            translator,
            port_stats: ArcSwapOption::empty(),
            stats,
            hv,
        })
    }

    /// Returns the current state
    pub fn state(&self) -> SwitchState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the connection as lost (or restored). Messages are only sent while connected.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns a copy of the port
    pub fn get_port(&self, port: PortNumber) -> Option<PhysicalPort> {
        self.ports.read().unwrap_or_else(PoisonError::into_inner).get(&port).cloned()
    }

    /// Returns all ports, sorted by port number
    pub fn ports(&self) -> Vec<PhysicalPort> {
        let mut ports: Vec<PhysicalPort> =
            self.ports.read().unwrap_or_else(PoisonError::into_inner).values().cloned().collect();
        ports.sort_by_key(|p| p.port_number());
        ports
    }

    /// Add the port, and register it in the topology.
    pub fn add_port(&self, port: PhysicalPort) -> Result<(), SwitchError> {
        let port_ref = port.port_ref();
        {
            let mut ports = self.ports.write().unwrap_or_else(PoisonError::into_inner);
            if ports.contains_key(&port.port_number()) {
                return Err(SwitchError::PortExists(self.switch_id, port.port_number()));
            }
            ports.insert(port.port_number(), port);
        }
        if let Err(e) = self.hv.network().add_port(port_ref) {
            debug!("Port {} not added to the topology: {}", port_ref, e);
        }
        Ok(())
    }

    /// Remove the port from the switch and from the topology, including attached links.
    pub fn remove_port(&self, port: PortNumber) -> bool {
        let removed =
            self.ports.write().unwrap_or_else(PoisonError::into_inner).remove(&port).is_some();
        if removed {
            self.hv.network().remove_port(PortRef::new(self.switch_id, port));
        }
        removed
    }

    /// Mark the port as edge port (connected to a host) or as internal port.
    pub fn set_edge_port(&self, port: PortNumber, is_edge: bool) -> bool {
        match self.ports.write().unwrap_or_else(PoisonError::into_inner).get_mut(&port) {
            Some(p) => {
                p.set_edge(is_edge);
                true
            }
            None => false,
        }
    }

    /// Allocate a physical transaction id for the request of the virtual switch.
    pub fn translate(&self, msg: &OfMessage, vsw: &dyn VirtualSwitch) -> Xid {
        self.translator.translate(msg.xid, vsw.tenant_id(), vsw.switch_id())
    }

    /// Look up (and forget) the origin of the reply.
    pub fn untranslate(&self, msg: &OfMessage) -> Option<XidPair> {
        self.translator.untranslate(msg.xid)
    }

    /// Returns the number of requests still waiting for a reply
    pub fn outstanding_requests(&self) -> usize {
        self.translator.outstanding()
    }

    /// Replace the port statistics snapshot.
    pub fn set_port_statistics(&self, stats: HashMap<PortNumber, PortStatistics>) {
        self.port_stats.store(Some(Arc::new(stats)));
    }

    /// Returns the last known counters of the port.
    pub fn get_port_statistic(&self, port: PortNumber) -> Option<PortStatistics> {
        self.port_stats.load().as_ref().and_then(|s| s.get(&port).copied())
    }

    /// Returns true if the statistics poller is running
    pub fn is_polling(&self) -> bool {
        self.stats.is_running()
    }

    fn fill_port_map(&self) {
        for desc in self.features.iter() {
            if let Err(e) = self.add_port(PhysicalPort::new(self.switch_id, desc)) {
                warn!("{}", e);
            }
        }
    }

    /// Unregister the switch. Every tenant is torn down by its own thread; the returned handle can
    /// be used to wait for them. Calling this a second time does nothing.
    pub fn unregister_tracked(&self) -> Teardown {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == SwitchState::Unregistered {
                return Teardown::default();
            }
            *state = SwitchState::Unregistered;
        }
        let map = self.hv.map().clone();
        let teardown = Teardown::spawn(self.switch_id, map.list_virtual_networks(), map);
        self.hv.network().remove_switch(self.switch_id);
        self.ports.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.tear_down();
        teardown
    }

    fn tear_down(&self) {
        info!("Switch disconnected with dpid {}, name {}", self.switch_id, self.name);
        self.stats.stop();
        self.set_connected(false);
        self.channel.disconnect();
    }

    fn virtualize(&self, msg: OfMessage) -> Result<(), Error> {
        let msg_type = msg.msg_type();
        if !msg_type.is_virtualizable() {
            return Err(MessageError::NotVirtualizable(msg_type).into());
        }
        if msg_type.is_reply() {
            return self.virtualize_reply(msg);
        }
        match msg.payload {
            Payload::PacketIn { in_port, .. } => {
                self.virtualize_packet_in(in_port, &msg);
                Ok(())
            }
            Payload::PortStatus { reason, ref desc } => {
                self.port_status(reason, desc);
                Ok(())
            }
            _ => Err(MessageError::NotVirtualizable(msg_type).into()),
        }
    }

    fn virtualize_reply(&self, mut msg: OfMessage) -> Result<(), Error> {
        let (msg_type, xid) = (msg.msg_type(), msg.xid);
        match self.untranslate(&msg) {
            Some(pair) => {
                let vsw = self
                    .hv
                    .map()
                    .get_virtual_switch_by_id(pair.tenant_id, pair.switch_id)
                    .ok_or(MappingError::UnknownVirtualSwitch(pair.tenant_id, pair.switch_id))?;
                msg.xid = pair.xid;
                vsw.send_msg(msg);
            }
            None => match msg.payload {
                Payload::StatsReply(StatsReply::Port(stats)) => {
                    self.set_port_statistics(stats.into_iter().collect())
                }
                _ => debug!(
                    "Dropping unsolicited {:?} with xid {} from {}",
                    msg_type, xid, self.switch_id
                ),
            },
        }
        Ok(())
    }

    fn virtualize_packet_in(&self, in_port: PortNumber, msg: &OfMessage) {
        let physical = PortRef::new(self.switch_id, in_port);
        let map = self.hv.map();
        let mut delivered = 0;
        for tenant in map.list_virtual_networks() {
            let vsw = match map.get_virtual_switch(self.switch_id, tenant) {
                Ok(Some(vsw)) => vsw,
                Ok(None) => continue,
                Err(e) => {
                    warn!("{}", e);
                    continue;
                }
            };
            for vport in vsw.ports().into_iter().filter(|p| p.physical_port() == physical) {
                let mut virt = msg.clone();
                virt.set_in_port(vport.port_number());
                vsw.send_msg(virt);
                delivered += 1;
            }
        }
        if delivered == 0 {
            debug!("No tenant owns {}, dropping the packet", physical);
        }
    }

    fn port_status(&self, reason: PortReason, desc: &PortDesc) {
        match reason {
            PortReason::Add => {
                if let Err(e) = self.add_port(PhysicalPort::new(self.switch_id, desc)) {
                    warn!("{}", e);
                }
            }
            PortReason::Delete => {
                if !self.remove_port(desc.port_no) {
                    warn!("{}", SwitchError::PortNotFound(self.switch_id, desc.port_no));
                }
            }
            PortReason::Modify => {
                let mut ports = self.ports.write().unwrap_or_else(PoisonError::into_inner);
                match ports.get_mut(&desc.port_no) {
                    Some(p) => {
                        let mut port = PhysicalPort::new(self.switch_id, desc);
                        port.set_edge(p.is_edge());
                        *p = port;
                    }
                    None => {
                        drop(ports);
                        if let Err(e) = self.add_port(PhysicalPort::new(self.switch_id, desc)) {
                            warn!("{}", e);
                        }
                    }
                }
            }
        }
    }
}

impl Switch for PhysicalSwitch {
    fn switch_id(&self) -> SwitchId {
        self.switch_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn handle_io(&self, msg: OfMessage) {
        if let Err(e) = self.virtualize(msg) {
            match e {
                Error::MessageError(MessageError::NotVirtualizable(_)) => {
                    error!("Received illegal message from {}: {}", self.switch_id, e)
                }
                e => warn!("{}", e),
            }
        }
    }

    fn send_msg(&self, msg: OfMessage) {
        if self.is_connected() {
            self.channel.write(vec![msg]);
        } else {
            debug!("Switch {} is not connected, dropping {:?}", self.switch_id, msg.msg_type());
        }
    }

    fn boot(&self) -> Result<(), Error> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match *state {
                SwitchState::Created => *state = SwitchState::Booted,
                SwitchState::Booted => return Ok(()),
                SwitchState::Unregistered => {
                    return Err(SwitchError::InvalidState(self.switch_id, *state).into())
                }
            }
        }
        if let Some(me) = self.me.upgrade() {
            self.hv.network().add_switch(me);
        }
        info!("Switch connected with dpid {}, name {}", self.switch_id, self.name);
        self.fill_port_map();
        self.stats.start(self.me.clone());
        Ok(())
    }

    fn unregister(&self) {
        let teardown = self.unregister_tracked();
        debug!("Tearing down {} tenants of {} in the background", teardown.len(), self.switch_id);
    }
}
