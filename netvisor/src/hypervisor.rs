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

//! # Hypervisor
//!
//! The [`Hypervisor`] bundles the handles shared by all switches: the physical topology, the
//! tenant map and the [`Settings`]. It is cheap to clone, and every switch keeps its own copy.

use crate::channel::Channel;
use crate::datapath::xid_translator::MAX_OUTSTANDING;
use crate::datapath::{BigSwitch, PhysicalSwitch, SingleSwitch, Switch, VirtualSwitch};
use crate::index::ROUTE_ID_CAPACITY;
use crate::message::PortDesc;
use crate::network::{PhysicalNetwork, TenantMap, VirtualNetworkMap};
use crate::routing::Routable;
use crate::types::{SwitchError, SwitchId, TenantId};
use crate::Error;

use log::*;
use std::sync::Arc;
use std::time::Duration;

/// Runtime settings of the hypervisor
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Interval between two port statistics requests. No statistics are polled if `None`.
    pub stats_interval: Option<Duration>,
    /// Number of route ids available to each big switch
    pub route_id_capacity: usize,
    /// Number of outstanding requests per physical switch
    pub xid_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stats_interval: None,
            route_id_capacity: ROUTE_ID_CAPACITY,
            xid_capacity: MAX_OUTSTANDING,
        }
    }
}

/// Shared handles of the hypervisor.
#[derive(Debug, Clone)]
pub struct Hypervisor {
    network: Arc<PhysicalNetwork>,
    map: Arc<dyn TenantMap>,
    settings: Settings,
}

impl Default for Hypervisor {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Hypervisor {
    /// Create a new hypervisor with an empty topology and an in-memory tenant map.
    pub fn new(settings: Settings) -> Self {
        Self::with_map(Arc::new(VirtualNetworkMap::new()), settings)
    }

    /// Create a new hypervisor using the given tenant map.
    pub fn with_map(map: Arc<dyn TenantMap>, settings: Settings) -> Self {
        Self { network: Arc::new(PhysicalNetwork::new()), map, settings }
    }

    /// Returns the physical topology
    pub fn network(&self) -> &Arc<PhysicalNetwork> {
        &self.network
    }

    /// Returns the tenant map
    pub fn map(&self) -> &Arc<dyn TenantMap> {
        &self.map
    }

    /// Returns the settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Create and boot the physical switch after its handshake completed on `channel`.
    pub fn connect_physical_switch<S: Into<String>>(
        &self,
        switch_id: SwitchId,
        name: S,
        ports: Vec<PortDesc>,
        channel: Arc<dyn Channel>,
    ) -> Result<Arc<PhysicalSwitch>, Error> {
        let sw = PhysicalSwitch::new(self.clone(), switch_id, name.into(), ports, channel);
        sw.boot()?;
        Ok(sw)
    }

    fn check_physical(&self, physical: &[SwitchId]) -> Result<(), SwitchError> {
        match physical.iter().find(|p| self.network.get_switch(**p).is_none()) {
            Some(p) => Err(SwitchError::UnknownPhysicalSwitch(*p)),
            None => Ok(()),
        }
    }

    /// Create a big switch of the tenant, spanning the given physical switches, and register it
    /// in the tenant map. Ports must be added before the switch is booted.
    pub fn create_big_switch<S: Into<String>>(
        &self,
        tenant: TenantId,
        switch_id: SwitchId,
        name: S,
        physical: &[SwitchId],
        routing: Arc<dyn Routable>,
    ) -> Result<Arc<BigSwitch>, Error> {
        self.check_physical(physical)?;
        let sw = Arc::new(BigSwitch::new(self.clone(), tenant, switch_id, name.into(), routing));
        self.map.add_virtual_switch(sw.clone(), physical)?;
        info!(
            "Created big switch {} of {} on {} physical switches",
            switch_id,
            tenant,
            physical.len()
        );
        Ok(sw)
    }

    /// Create a virtual switch of the tenant, backed by a single physical switch.
    pub fn create_single_switch<S: Into<String>>(
        &self,
        tenant: TenantId,
        switch_id: SwitchId,
        name: S,
        physical: SwitchId,
    ) -> Result<Arc<SingleSwitch>, Error> {
        self.check_physical(&[physical])?;
        let sw =
            Arc::new(SingleSwitch::new(self.clone(), tenant, switch_id, name.into(), physical));
        self.map.add_virtual_switch(sw.clone(), &[physical])?;
        info!("Created virtual switch {} of {} on {}", switch_id, tenant, physical);
        Ok(sw)
    }

    /// Unregister every physical switch, and wait until all virtual switches mapped onto them
    /// are torn down. Virtual switches still left in the tenant map afterwards are unregistered as
    /// well. Calling this again does nothing.
    ///
    /// The topology and the tenant map own the switches, while every switch holds a clone of the
    /// hypervisor. Switches are only freed once they are unregistered, so this must be called
    /// before the hypervisor is dropped. [`Deployment`](crate::config::Deployment) does so when
    /// it is dropped.
    pub fn shutdown(&self) {
        for id in self.network.get_switches() {
            if let Some(sw) = self.network.get_switch(id) {
                for (tenant, result) in sw.unregister_tracked().join() {
                    if let Err(e) = result {
                        warn!("Teardown of {} failed: {}", tenant, e);
                    }
                }
            }
        }
        for tenant in self.map.list_virtual_networks() {
            for vsw in self.map.list_virtual_switches(tenant) {
                debug!("Unregistering {} of {}, which is left in the tenant map", vsw.name(), tenant);
                vsw.unregister();
            }
        }
    }

    /// Returns the virtual switch of the tenant
    pub fn virtual_switch(
        &self,
        tenant: TenantId,
        switch_id: SwitchId,
    ) -> Option<Arc<dyn VirtualSwitch>> {
        self.map.get_virtual_switch_by_id(tenant, switch_id)
    }
}
