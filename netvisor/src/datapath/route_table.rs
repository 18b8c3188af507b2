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

//! # Route Table
//!
//! Every big switch stores its internal routes in a two-level map, from the ingress port to the
//! egress port to the route. Routes are always created in pairs: the route from the ingress to the
//! egress port, and the reverse route. Both share the same route id.

use crate::index::IdAllocator;
use crate::network::TenantMap;
use crate::routing::PathPair;
use crate::types::{PhysicalLink, PortNumber, RouteId, RoutingError, SwitchId, TenantId};
use crate::Error;

use log::*;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Directed route between two ports of a big switch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SwitchRoute {
    route_id: RouteId,
    switch_id: SwitchId,
    tenant_id: TenantId,
    src_port: PortNumber,
    dst_port: PortNumber,
    priority: u8,
    path: Vec<PhysicalLink>,
}

impl SwitchRoute {
    /// Returns the route id, shared with the reverse route
    pub fn route_id(&self) -> RouteId {
        self.route_id
    }

    /// Returns the id of the big switch
    pub fn switch_id(&self) -> SwitchId {
        self.switch_id
    }

    /// Returns the tenant owning the route
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the ingress port
    pub fn src_port(&self) -> PortNumber {
        self.src_port
    }

    /// Returns the egress port
    pub fn dst_port(&self) -> PortNumber {
        self.dst_port
    }

    /// Returns the priority of the route
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Returns the physical links, ordered from the ingress to the egress port
    pub fn path(&self) -> &[PhysicalLink] {
        &self.path
    }
}

impl fmt::Display for SwitchRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of switch {} ({}): {} -> {} [{}]",
            self.route_id,
            self.switch_id,
            self.tenant_id,
            self.src_port,
            self.dst_port,
            self.path.iter().map(|l| l.to_string()).collect::<Vec<_>>().join(", ")
        )
    }
}

/// Map from the ingress port to the egress port to the route.
pub type RouteMap = HashMap<PortNumber, HashMap<PortNumber, Arc<SwitchRoute>>>;

/// Routes of a single big switch, together with the allocator of the route ids. Each pair of
/// ports maps to at most one route.
#[derive(Debug)]
pub struct RouteTable {
    switch_id: SwitchId,
    tenant_id: TenantId,
    routes: RouteMap,
    ids: IdAllocator,
}

impl RouteTable {
    /// Create an empty route table with `capacity` route ids.
    pub fn new(switch_id: SwitchId, tenant_id: TenantId, capacity: usize) -> Self {
        Self { switch_id, tenant_id, routes: HashMap::new(), ids: IdAllocator::new(capacity) }
    }

    /// Returns the route from `ingress` to `egress`, if it exists.
    pub fn get(&self, ingress: PortNumber, egress: PortNumber) -> Option<Arc<SwitchRoute>> {
        self.routes.get(&ingress).and_then(|m| m.get(&egress)).cloned()
    }

    /// Create the route between `ingress` and `egress`, and its reverse. Both routes are
    /// registered in the tenant map before they are stored in the table. Returns the route from
    /// `ingress` to `egress`.
    pub fn create_route(
        &mut self,
        map: &dyn TenantMap,
        ingress: PortNumber,
        egress: PortNumber,
        paths: PathPair,
    ) -> Result<Arc<SwitchRoute>, Error> {
        if self.get(ingress, egress).is_some() || self.get(egress, ingress).is_some() {
            return Err(RoutingError::RouteExists(ingress, egress).into());
        }
        let route_id = RouteId(self.ids.acquire()?);
        let PathPair { path, revpath, priority } = paths;
        let route = Arc::new(self.build(route_id, ingress, egress, priority, path));
        let rev_route = Arc::new(self.build(route_id, egress, ingress, priority, revpath));

        map.add_route(&route, route.path());
        map.add_route(&rev_route, rev_route.path());

        self.routes.entry(ingress).or_default().insert(egress, route.clone());
        self.routes.entry(egress).or_default().insert(ingress, rev_route.clone());

        info!("Added {}", route);
        info!("Added {}", rev_route);
        Ok(route)
    }

    fn build(
        &self,
        route_id: RouteId,
        src_port: PortNumber,
        dst_port: PortNumber,
        priority: u8,
        path: Vec<PhysicalLink>,
    ) -> SwitchRoute {
        SwitchRoute {
            route_id,
            switch_id: self.switch_id,
            tenant_id: self.tenant_id,
            src_port,
            dst_port,
            priority,
            path,
        }
    }

    /// Returns the cached route from `ingress` to `egress`. If there is none, the paths are
    /// computed with `compute`, and a new pair of routes is created.
    pub fn get_or_compute<F>(
        &mut self,
        map: &dyn TenantMap,
        ingress: PortNumber,
        egress: PortNumber,
        compute: F,
    ) -> Result<Arc<SwitchRoute>, Error>
    where
        F: FnOnce() -> Result<PathPair, RoutingError>,
    {
        if let Some(route) = self.get(ingress, egress) {
            return Ok(route);
        }
        let paths = compute()?;
        self.create_route(map, ingress, egress, paths)
    }

    /// Returns all routes starting or ending at `port`, in both directions. Routes from a port to
    /// itself are ignored.
    pub fn routes_by_port(&self, port: PortNumber) -> HashSet<Arc<SwitchRoute>> {
        self.iter()
            .filter(|r| r.src_port != r.dst_port)
            .filter(|r| r.src_port == port || r.dst_port == port)
            .cloned()
            .collect()
    }

    /// Returns the route and its reverse with the given route id.
    pub fn routes_by_id(&self, route_id: RouteId) -> HashSet<Arc<SwitchRoute>> {
        self.iter().filter(|r| r.route_id == route_id).cloned().collect()
    }

    /// Remove the routes with the given id. Their links are removed from the tenant map before the
    /// route id is released. Returns `false` if no route has this id.
    pub fn unregister(&mut self, map: &dyn TenantMap, route_id: RouteId) -> bool {
        let routes = self.routes_by_id(route_id);
        if routes.is_empty() {
            return false;
        }
        for route in routes.iter() {
            map.remove_route(route);
            self.remove_entry(route.src_port, route.dst_port);
            info!("Removed {}", route);
        }
        self.ids.release(route_id.0);
        true
    }

    fn remove_entry(&mut self, ingress: PortNumber, egress: PortNumber) {
        if let Some(m) = self.routes.get_mut(&ingress) {
            m.remove(&egress);
            if m.is_empty() {
                self.routes.remove(&ingress);
            }
        }
    }

    /// Remove all routes from the table and from the tenant map.
    pub fn remove_all(&mut self, map: &dyn TenantMap) {
        let mut route_ids = HashSet::new();
        for route in self.iter() {
            map.remove_route(route);
            route_ids.insert(route.route_id);
        }
        for route_id in route_ids {
            self.ids.release(route_id.0);
        }
        self.routes.clear();
    }

    /// Returns a copy of the route map
    pub fn route_map(&self) -> RouteMap {
        self.routes.clone()
    }

    /// Iterate over all routes (each direction separately).
    pub fn iter(&self) -> impl Iterator<Item = &Arc<SwitchRoute>> {
        self.routes.values().flat_map(|m| m.values())
    }

    /// Returns the number of routes (each direction counts once).
    pub fn len(&self) -> usize {
        self.routes.values().map(|m| m.len()).sum()
    }

    /// Returns true if there are no routes
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns the number of route ids in use
    pub fn ids_in_use(&self) -> usize {
        self.ids.used()
    }
}
