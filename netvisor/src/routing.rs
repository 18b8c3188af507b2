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

//! # Routing Strategies
//!
//! A big switch uses a routing strategy to find the physical path between two of its ports. This
//! module only defines the interface and strategies which do not search the topology themselves:
//!
//! - [`NoRouting`]: Routes are only created manually (see
//!   [`BigSwitch::create_route`](crate::datapath::BigSwitch::create_route)).
//! - [`PathTable`]: Paths are supplied by the operator for each pair of physical ports. They are
//!   checked against the topology before they are used.

use crate::datapath::{BigSwitch, Switch, VirtualPort};
use crate::network::PhysicalNetwork;
use crate::types::{PhysicalLink, PortRef, RoutingError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Priority assigned to routes if none is given.
pub const DEFAULT_PRIORITY: u8 = 1;

/// Governs when the routes of a big switch are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingType {
    /// No routing at all. Routes must be created manually.
    None,
    /// Routes do not change at runtime, they are computed for all port pairs at boot.
    Static,
    /// Routes are computed at boot, and lazily on first use for pairs which had no path yet.
    OnDemand,
}

impl RoutingType {
    /// Returns true if routes should be computed for all port pairs when the switch boots.
    pub fn precompute(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Inputs required to build a route and its reverse.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPair {
    /// Physical links from the ingress to the egress port
    pub path: Vec<PhysicalLink>,
    /// Physical links from the egress back to the ingress port
    pub revpath: Vec<PhysicalLink>,
    /// Ranking key if multiple routes exist for the same ports
    pub priority: u8,
}

impl PathPair {
    /// Create a new path pair with the default priority
    pub fn new(path: Vec<PhysicalLink>, revpath: Vec<PhysicalLink>) -> Self {
        Self { path, revpath, priority: DEFAULT_PRIORITY }
    }

    /// Create a new path pair, where the reverse path uses every link in the opposite direction.
    pub fn symmetric(path: Vec<PhysicalLink>) -> Self {
        let revpath = reverse_path(&path);
        Self::new(path, revpath)
    }
}

/// Returns the path in the opposite direction
pub fn reverse_path(path: &[PhysicalLink]) -> Vec<PhysicalLink> {
    path.iter().rev().map(PhysicalLink::reversed).collect()
}

/// Strategy to connect two ports of a big switch.
pub trait Routable: fmt::Debug + Send + Sync {
    /// Returns when routes of this strategy are computed.
    fn routing_type(&self) -> RoutingType;

    /// Compute the path between the two ports of the big switch.
    fn compute_path(
        &self,
        network: &PhysicalNetwork,
        switch: &BigSwitch,
        ingress: &VirtualPort,
        egress: &VirtualPort,
    ) -> Result<PathPair, RoutingError>;
}

/// Strategy that never finds a path.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRouting;

impl Routable for NoRouting {
    fn routing_type(&self) -> RoutingType {
        RoutingType::None
    }

    fn compute_path(
        &self,
        _network: &PhysicalNetwork,
        switch: &BigSwitch,
        ingress: &VirtualPort,
        egress: &VirtualPort,
    ) -> Result<PathPair, RoutingError> {
        Err(RoutingError::NoPathFound(
            switch.switch_id(),
            ingress.port_number(),
            egress.port_number(),
        ))
    }
}

#[derive(Debug, Clone)]
struct PathEntry {
    path: Vec<PhysicalLink>,
    revpath: Option<Vec<PhysicalLink>>,
    priority: u8,
}

/// Strategy using paths given by the operator. Paths are stored for pairs of physical ports, and
/// are used for both directions. If no reverse path is given, the reverse path uses the links of
/// the path in the opposite direction. Ports on the same physical switch are connected without
/// any link.
#[derive(Debug, Clone)]
pub struct PathTable {
    routing_type: RoutingType,
    paths: HashMap<(PortRef, PortRef), PathEntry>,
}

impl PathTable {
    /// Create an empty path table. `routing_type` should be either `Static` or `OnDemand`.
    pub fn new(routing_type: RoutingType) -> Self {
        Self { routing_type, paths: HashMap::new() }
    }

    /// Add a path from `src` to `dst`. If `revpath` is `None`, the path is used in reverse for
    /// the other direction. An existing path between the same ports is replaced.
    pub fn add_path(
        &mut self,
        src: PortRef,
        dst: PortRef,
        path: Vec<PhysicalLink>,
        revpath: Option<Vec<PhysicalLink>>,
        priority: u8,
    ) {
        self.paths.insert((src, dst), PathEntry { path, revpath, priority });
    }

    /// Returns the number of stored paths
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns true if no path is stored
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn lookup(&self, src: PortRef, dst: PortRef) -> Option<PathPair> {
        if let Some(e) = self.paths.get(&(src, dst)) {
            let revpath = e.revpath.clone().unwrap_or_else(|| reverse_path(&e.path));
            Some(PathPair { path: e.path.clone(), revpath, priority: e.priority })
        } else if let Some(e) = self.paths.get(&(dst, src)) {
            let path = e.revpath.clone().unwrap_or_else(|| reverse_path(&e.path));
            Some(PathPair { path, revpath: e.path.clone(), priority: e.priority })
        } else {
            None
        }
    }
}

impl Routable for PathTable {
    fn routing_type(&self) -> RoutingType {
        self.routing_type
    }

    fn compute_path(
        &self,
        network: &PhysicalNetwork,
        switch: &BigSwitch,
        ingress: &VirtualPort,
        egress: &VirtualPort,
    ) -> Result<PathPair, RoutingError> {
        let (src, dst) = (ingress.physical_port(), egress.physical_port());
        if src.switch_id == dst.switch_id {
            return Ok(PathPair::new(Vec::new(), Vec::new()));
        }
        let pair = self.lookup(src, dst).ok_or_else(|| {
            RoutingError::NoPathFound(switch.switch_id(), ingress.port_number(), egress.port_number())
        })?;
        check_path(network, src, dst, &pair.path)?;
        check_path(network, dst, src, &pair.revpath)?;
        Ok(pair)
    }
}

/// Check that the path leads from the physical switch of `src` to the one of `dst`, that the
/// links are contiguous and that every link exists in the topology.
pub fn check_path(
    network: &PhysicalNetwork,
    src: PortRef,
    dst: PortRef,
    path: &[PhysicalLink],
) -> Result<(), RoutingError> {
    match (path.first(), path.last()) {
        (Some(first), Some(last)) => {
            if first.src.switch_id != src.switch_id || last.dst.switch_id != dst.switch_id {
                return Err(RoutingError::InvalidPath(src, dst, "path does not connect the ports"));
            }
        }
        _ if src.switch_id == dst.switch_id => return Ok(()),
        _ => return Err(RoutingError::InvalidPath(src, dst, "path is empty")),
    }
    if path.windows(2).any(|w| w[0].dst.switch_id != w[1].src.switch_id) {
        return Err(RoutingError::InvalidPath(src, dst, "links are not contiguous"));
    }
    if !path.iter().all(|l| network.has_link(l)) {
        return Err(RoutingError::InvalidPath(src, dst, "link is not part of the topology"));
    }
    Ok(())
}
