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

//! # Big Switch
//!
//! A big switch presents many physical switches to the tenant as one virtual switch. Packets
//! entering the big switch on one physical switch are carried to the physical switch of the
//! egress port along an internal route. Routes are computed by a pluggable [`Routable`] strategy,
//! for all port pairs at boot (unless the strategy does no routing at all) and on demand for pairs
//! still missing afterwards. They are cached in the [`RouteTable`] of the switch.

use crate::datapath::route_table::RouteMap;
use crate::datapath::virtual_switch::{devirtualize, VirtualSwitchBase};
use crate::datapath::{RouteTable, SwitchRoute, VirtualSwitch};
use crate::datapath::{Switch, VirtualPort};
use crate::hypervisor::Hypervisor;
use crate::message::OfMessage;
use crate::routing::{PathPair, Routable};
use crate::types::{
    MessageError, PhysicalLink, PortNumber, RouteId, RoutingError, SwitchId, TenantId, Xid,
};
use crate::Error;

use itertools::iproduct;
use log::*;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Virtual switch spanning multiple physical switches.
pub struct BigSwitch {
    base: VirtualSwitchBase,
    routing: Arc<dyn Routable>,
    routes: Mutex<RouteTable>,
}

impl fmt::Debug for BigSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigSwitch")
            .field("base", &self.base)
            .field("routing", &self.routing().routing_type())
            .field("routes", &self.routes.try_lock().map(|r| r.len()).ok())
            .finish()
    }
}

impl BigSwitch {
    pub(crate) fn new(
        hv: Hypervisor,
        tenant_id: TenantId,
        switch_id: SwitchId,
        name: String,
        routing: Arc<dyn Routable>,
    ) -> Self {
        let capacity = hv.settings().route_id_capacity;
        Self {
            base: VirtualSwitchBase::new(hv, tenant_id, switch_id, name),
            routing,
            routes: Mutex::new(RouteTable::new(switch_id, tenant_id, capacity)),
        }
    }

    fn routes(&self) -> MutexGuard<'_, RouteTable> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the routing strategy
    pub fn routing(&self) -> Arc<dyn Routable> {
        self.routing.clone()
    }

    fn port_pair(
        &self,
        ingress: PortNumber,
        egress: PortNumber,
    ) -> Result<(VirtualPort, VirtualPort), RoutingError> {
        let src = self.get_port(ingress).ok_or(RoutingError::UnknownPort(ingress))?;
        let dst = self.get_port(egress).ok_or(RoutingError::UnknownPort(egress))?;
        Ok((src, dst))
    }

    /// Returns the route from `ingress` to `egress`. If it is not cached yet, it is computed with
    /// the routing strategy, and both the route and its reverse are stored.
    ///
    /// The routing strategy is called while the route table is locked, so it must not call back
    /// into the route methods of this switch.
    pub fn get_route(
        &self,
        ingress: PortNumber,
        egress: PortNumber,
    ) -> Result<Arc<SwitchRoute>, Error> {
        let (src, dst) = self.port_pair(ingress, egress)?;
        let routing = self.routing();
        let hv = self.base.hypervisor();
        self.routes().get_or_compute(hv.map().as_ref(), ingress, egress, || {
            routing.compute_path(hv.network(), self, &src, &dst)
        })
    }

    /// Create the route between two ports along explicitly given paths. If `revpath` is empty, the
    /// path is used in the reverse direction. Fails if a route between the ports already exists.
    pub fn create_route(
        &self,
        ingress: PortNumber,
        egress: PortNumber,
        path: Vec<PhysicalLink>,
        revpath: Vec<PhysicalLink>,
        priority: u8,
    ) -> Result<Arc<SwitchRoute>, Error> {
        self.port_pair(ingress, egress)?;
        let mut paths =
            if revpath.is_empty() { PathPair::symmetric(path) } else { PathPair::new(path, revpath) };
        paths.priority = priority;
        self.routes().create_route(self.base.hypervisor().map().as_ref(), ingress, egress, paths)
    }

    /// Remove both routes with the given id. Returns `false` if there is no such route.
    pub fn unregister_route(&self, route_id: RouteId) -> bool {
        self.routes().unregister(self.base.hypervisor().map().as_ref(), route_id)
    }

    /// Returns all cached routes starting or ending at the port. Nothing is computed.
    pub fn routes_by_port(&self, port: PortNumber) -> HashSet<Arc<SwitchRoute>> {
        self.routes().routes_by_port(port)
    }

    /// Returns the two routes sharing the id.
    pub fn routes_by_id(&self, route_id: RouteId) -> HashSet<Arc<SwitchRoute>> {
        self.routes().routes_by_id(route_id)
    }

    /// Returns a copy of all cached routes
    pub fn route_map(&self) -> RouteMap {
        self.routes().route_map()
    }

    /// Returns the number of cached routes, counting each direction.
    pub fn route_count(&self) -> usize {
        self.routes().len()
    }

    /// Try to reroute around the failed physical switch. Returns true if the big switch can keep
    /// operating. Rerouting is not supported, so the switch must be unregistered.
    pub fn try_recovery(&self, failed: SwitchId) -> bool {
        debug!("Big switch {} cannot recover from the failure of {}", self.base.name(), failed);
        false
    }

    fn precompute_routes(&self) {
        let ports = self.ports();
        for (src, dst) in iproduct!(ports.iter(), ports.iter()) {
            if src.port_number() == dst.port_number()
                || src.physical_switch() == dst.physical_switch()
            {
                continue;
            }
            if let Err(e) = self.get_route(src.port_number(), dst.port_number()) {
                warn!(
                    "No route on {} from {} to {}: {}",
                    self.base.name(),
                    src.port_number(),
                    dst.port_number(),
                    e
                );
            }
        }
    }
}

impl Switch for BigSwitch {
    fn switch_id(&self) -> SwitchId {
        self.base.switch_id()
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    fn is_connected(&self) -> bool {
        self.base.is_connected()
    }

    fn handle_io(&self, msg: OfMessage) {
        if let Err(e) = devirtualize(self, msg) {
            error!("{}", e);
        }
    }

    fn send_msg(&self, msg: OfMessage) {
        self.base.send_msg(msg)
    }

    fn boot(&self) -> Result<(), Error> {
        self.base.check_bootable()?;
        if self.routing().routing_type().precompute() {
            self.precompute_routes();
        }
        Ok(self.base.boot()?)
    }

    fn unregister(&self) {
        if !self.base.begin_unregister() {
            return;
        }
        self.routes().remove_all(self.base.hypervisor().map().as_ref());
        self.base.finish_unregister();
    }
}

impl VirtualSwitch for BigSwitch {
    fn base(&self) -> &VirtualSwitchBase {
        &self.base
    }

    fn as_big_switch(&self) -> Option<&BigSwitch> {
        Some(self)
    }

    fn send_south(&self, msg: OfMessage, in_port: Option<PortNumber>) {
        let port = match in_port.and_then(|p| self.get_port(p)) {
            Some(port) => port,
            None => {
                error!(
                    "Cannot send {:?} of {}: the ingress port is not known",
                    msg.msg_type(),
                    self.base.name()
                );
                return;
            }
        };
        match self.base.hypervisor().network().get_switch(port.physical_switch()) {
            Some(sw) => sw.send_msg(msg),
            None => warn!("Physical switch {} of {} is gone", port.physical_switch(), self.base.name()),
        }
    }

    fn translate_xid(&self, msg: &OfMessage, in_port: Option<PortNumber>) -> Xid {
        in_port
            .and_then(|p| self.get_port(p))
            .and_then(|p| self.base.hypervisor().network().get_switch(p.physical_switch()))
            .map(|sw| sw.translate(msg, self))
            .unwrap_or(msg.xid)
    }

    fn output_port(
        &self,
        in_port: Option<PortNumber>,
        out_port: PortNumber,
    ) -> Result<PortNumber, Error> {
        let egress = self.get_port(out_port).ok_or(MessageError::UnknownPort(out_port))?;
        let ingress = match in_port {
            Some(p) => self.get_port(p).ok_or(MessageError::UnknownPort(p))?,
            None => return Ok(egress.physical_port().port_number),
        };
        if ingress.physical_switch() == egress.physical_switch() {
            return Ok(egress.physical_port().port_number);
        }
        let route = self
            .get_route(ingress.port_number(), out_port)
            .map_err(|_| MessageError::NoRoute(ingress.port_number(), out_port))?;
        route
            .path()
            .first()
            .map(|link| link.src.port_number)
            .ok_or_else(|| MessageError::NoRoute(ingress.port_number(), out_port).into())
    }
}
