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

//! # Tenant Map
//!
//! Mapping between the virtual elements of every tenant and the physical resources backing them.
//! The map is shared between all switches, and must be safe for concurrent use.

use crate::datapath::{SwitchRoute, VirtualSwitch};
use crate::types::{MappingError, PhysicalLink, PortNumber, RouteId, SwitchId, TenantId};

use log::*;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Store of all tenant to resource mappings.
pub trait TenantMap: fmt::Debug + Send + Sync {
    /// Register a new virtual network (tenant).
    fn add_virtual_network(&self, tenant: TenantId);

    /// Returns all registered tenants.
    fn list_virtual_networks(&self) -> BTreeSet<TenantId>;

    /// Register a virtual switch, backed by the given physical switches. A tenant can only have a
    /// single virtual switch on every physical switch.
    fn add_virtual_switch(
        &self,
        switch: Arc<dyn VirtualSwitch>,
        physical: &[SwitchId],
    ) -> Result<(), MappingError>;

    /// Remove a virtual switch and all its mappings. This is a no-op if the switch is not
    /// registered.
    fn remove_virtual_switch(&self, tenant: TenantId, switch_id: SwitchId);

    /// Returns the virtual switch of the tenant on the physical switch, or `None` if the tenant
    /// has no virtual switch on it.
    fn get_virtual_switch(
        &self,
        physical: SwitchId,
        tenant: TenantId,
    ) -> Result<Option<Arc<dyn VirtualSwitch>>, MappingError>;

    /// Returns the virtual switch with the given id.
    fn get_virtual_switch_by_id(
        &self,
        tenant: TenantId,
        switch_id: SwitchId,
    ) -> Option<Arc<dyn VirtualSwitch>>;

    /// Returns all virtual switches of the tenant, sorted by their id.
    fn list_virtual_switches(&self, tenant: TenantId) -> Vec<Arc<dyn VirtualSwitch>>;

    /// Register the physical links which realize the route.
    fn add_route(&self, route: &SwitchRoute, path: &[PhysicalLink]);

    /// Remove the physical links of the route.
    fn remove_route(&self, route: &SwitchRoute);

    /// Returns the physical links of the route, if it is registered.
    fn get_route(&self, route: &SwitchRoute) -> Option<Vec<PhysicalLink>>;
}

type RouteKey = (TenantId, SwitchId, RouteId, PortNumber, PortNumber);

fn route_key(route: &SwitchRoute) -> RouteKey {
    (route.tenant_id(), route.switch_id(), route.route_id(), route.src_port(), route.dst_port())
}

#[derive(Default)]
struct MapInner {
    tenants: BTreeSet<TenantId>,
    virtual_switches: HashMap<(TenantId, SwitchId), Arc<dyn VirtualSwitch>>,
    physical_to_virtual: HashMap<SwitchId, HashMap<TenantId, SwitchId>>,
    virtual_to_physical: HashMap<(TenantId, SwitchId), Vec<SwitchId>>,
    routes: HashMap<RouteKey, Vec<PhysicalLink>>,
}

/// In-memory implementation of the [`TenantMap`].
#[derive(Default)]
pub struct VirtualNetworkMap {
    inner: RwLock<MapInner>,
}

impl fmt::Debug for VirtualNetworkMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.read();
        f.debug_struct("VirtualNetworkMap")
            .field("tenants", &m.tenants)
            .field("virtual_switches", &m.virtual_to_physical)
            .field("routes", &m.routes.len())
            .finish()
    }
}

impl VirtualNetworkMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MapInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MapInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the number of registered routes (each direction counts once).
    pub fn route_count(&self) -> usize {
        self.read().routes.len()
    }

    /// Returns the number of registered routes of the given virtual switch.
    pub fn route_count_of(&self, tenant: TenantId, switch_id: SwitchId) -> usize {
        self.read().routes.keys().filter(|k| k.0 == tenant && k.1 == switch_id).count()
    }

    /// Returns the physical switches backing the virtual switch.
    pub fn get_physical_switches(&self, tenant: TenantId, switch_id: SwitchId) -> Vec<SwitchId> {
        self.read().virtual_to_physical.get(&(tenant, switch_id)).cloned().unwrap_or_default()
    }
}

impl TenantMap for VirtualNetworkMap {
    fn add_virtual_network(&self, tenant: TenantId) {
        self.write().tenants.insert(tenant);
    }

    fn list_virtual_networks(&self) -> BTreeSet<TenantId> {
        self.read().tenants.clone()
    }

    fn add_virtual_switch(
        &self,
        switch: Arc<dyn VirtualSwitch>,
        physical: &[SwitchId],
    ) -> Result<(), MappingError> {
        let (tenant, id) = (switch.tenant_id(), switch.switch_id());
        let mut m = self.write();
        if m.virtual_switches.contains_key(&(tenant, id)) {
            return Err(MappingError::VirtualSwitchExists(tenant, id));
        }
        for p in physical {
            if let Some(other) = m.physical_to_virtual.get(p).and_then(|t| t.get(&tenant)) {
                return Err(MappingError::PhysicalSwitchTaken(*p, tenant, *other));
            }
        }
        for p in physical {
            m.physical_to_virtual.entry(*p).or_default().insert(tenant, id);
        }
        m.tenants.insert(tenant);
        m.virtual_to_physical.insert((tenant, id), physical.to_vec());
        m.virtual_switches.insert((tenant, id), switch);
        Ok(())
    }

    fn remove_virtual_switch(&self, tenant: TenantId, switch_id: SwitchId) {
        let mut m = self.write();
        let physical = m.virtual_to_physical.remove(&(tenant, switch_id)).unwrap_or_default();
        for p in physical {
            if let Some(tenants) = m.physical_to_virtual.get_mut(&p) {
                tenants.remove(&tenant);
                if tenants.is_empty() {
                    m.physical_to_virtual.remove(&p);
                }
            }
        }
        m.virtual_switches.remove(&(tenant, switch_id));
        let before = m.routes.len();
        m.routes.retain(|k, _| !(k.0 == tenant && k.1 == switch_id));
        if m.routes.len() != before {
            warn!("Virtual switch {} of {} was removed with routes still registered", switch_id, tenant);
        }
    }

    fn get_virtual_switch(
        &self,
        physical: SwitchId,
        tenant: TenantId,
    ) -> Result<Option<Arc<dyn VirtualSwitch>>, MappingError> {
        let m = self.read();
        let id = match m.physical_to_virtual.get(&physical).and_then(|t| t.get(&tenant)) {
            Some(id) => *id,
            None => return Ok(None),
        };
        match m.virtual_switches.get(&(tenant, id)) {
            Some(sw) => Ok(Some(sw.clone())),
            None => Err(MappingError::InconsistentMapping(format!(
                "physical switch {} maps to the unknown virtual switch {} of {}",
                physical, id, tenant
            ))),
        }
    }

    fn get_virtual_switch_by_id(
        &self,
        tenant: TenantId,
        switch_id: SwitchId,
    ) -> Option<Arc<dyn VirtualSwitch>> {
        self.read().virtual_switches.get(&(tenant, switch_id)).cloned()
    }

    fn list_virtual_switches(&self, tenant: TenantId) -> Vec<Arc<dyn VirtualSwitch>> {
        let m = self.read();
        let mut switches: Vec<(SwitchId, Arc<dyn VirtualSwitch>)> = m
            .virtual_switches
            .iter()
            .filter(|((t, _), _)| *t == tenant)
            .map(|((_, id), sw)| (*id, sw.clone()))
            .collect();
        switches.sort_by_key(|(id, _)| *id);
        switches.into_iter().map(|(_, sw)| sw).collect()
    }

    fn add_route(&self, route: &SwitchRoute, path: &[PhysicalLink]) {
        self.write().routes.insert(route_key(route), path.to_vec());
    }

    fn remove_route(&self, route: &SwitchRoute) {
        if self.write().routes.remove(&route_key(route)).is_none() {
            debug!("Removed {} which was not registered", route);
        }
    }

    fn get_route(&self, route: &SwitchRoute) -> Option<Vec<PhysicalLink>> {
        self.read().routes.get(&route_key(route)).cloned()
    }
}
