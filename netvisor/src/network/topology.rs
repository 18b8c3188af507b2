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

//! # Physical Topology
//!
//! Index of all physical switches, their ports and the links between them. The topology is shared
//! by reference between all switches, discovery and the routing strategies.

use crate::datapath::{PhysicalSwitch, Switch};
use crate::types::{PhysicalLink, PortNumber, PortRef, SwitchError, SwitchId};

use log::*;
use petgraph::prelude::*;
use petgraph::stable_graph::StableGraph;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

type IndexType = u32;
/// Graph of the physical network. Nodes are switches, edges are directed links.
pub type PhysicalGraph = StableGraph<SwitchId, PhysicalLink, Directed, IndexType>;

#[derive(Default)]
struct Topology {
    graph: PhysicalGraph,
    nodes: HashMap<SwitchId, NodeIndex<IndexType>>,
    switches: HashMap<SwitchId, Arc<PhysicalSwitch>>,
    ports: HashMap<SwitchId, BTreeSet<PortNumber>>,
}

/// # Physical Network
/// All methods take `&self`, the topology is synchronized internally.
#[derive(Default)]
pub struct PhysicalNetwork {
    inner: RwLock<Topology>,
}

impl fmt::Debug for PhysicalNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.read();
        f.debug_struct("PhysicalNetwork")
            .field("switches", &t.nodes.keys().collect::<BTreeSet<_>>())
            .field("links", &t.graph.edge_count())
            .finish()
    }
}

impl PhysicalNetwork {
    /// Create an empty topology
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Topology> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Topology> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a physical switch. Returns `false` if a switch with the same id is already present, in
    /// which case the old instance is replaced.
    pub fn add_switch(&self, switch: Arc<PhysicalSwitch>) -> bool {
        let mut t = self.write();
        let id = switch.switch_id();
        let is_new = !t.nodes.contains_key(&id);
        if is_new {
            let idx = t.graph.add_node(id);
            t.nodes.insert(id, idx);
            t.ports.insert(id, BTreeSet::new());
        }
        t.switches.insert(id, switch);
        is_new
    }

    /// Remove a physical switch, together with all its ports and links.
    pub fn remove_switch(&self, id: SwitchId) -> Option<Arc<PhysicalSwitch>> {
        let mut t = self.write();
        if let Some(idx) = t.nodes.remove(&id) {
            t.graph.remove_node(idx);
        }
        t.ports.remove(&id);
        let removed = t.switches.remove(&id);
        if removed.is_some() {
            debug!("Removed switch {} from the topology", id);
        }
        removed
    }

    /// Returns the physical switch, if it is known.
    pub fn get_switch(&self, id: SwitchId) -> Option<Arc<PhysicalSwitch>> {
        self.read().switches.get(&id).cloned()
    }

    /// Returns a sorted list of all switch ids
    pub fn get_switches(&self) -> Vec<SwitchId> {
        let mut switches: Vec<SwitchId> = self.read().switches.keys().copied().collect();
        switches.sort();
        switches
    }

    /// Learn a new physical port. The switch must already be known.
    pub fn add_port(&self, port: PortRef) -> Result<(), SwitchError> {
        let mut t = self.write();
        t.ports
            .get_mut(&port.switch_id)
            .ok_or(SwitchError::UnknownPhysicalSwitch(port.switch_id))?
            .insert(port.port_number);
        Ok(())
    }

    /// Forget a physical port, and remove all links attached to it.
    pub fn remove_port(&self, port: PortRef) -> bool {
        let mut t = self.write();
        let removed =
            t.ports.get_mut(&port.switch_id).map(|p| p.remove(&port.port_number)).unwrap_or(false);
        let attached: Vec<_> = t
            .graph
            .edge_indices()
            .filter(|e| t.graph.edge_weight(*e).map(|l| l.src == port || l.dst == port).unwrap_or(false))
            .collect();
        for e in attached {
            t.graph.remove_edge(e);
        }
        removed
    }

    /// Returns true if the port is known
    pub fn has_port(&self, port: PortRef) -> bool {
        self.read().ports.get(&port.switch_id).map(|p| p.contains(&port.port_number)).unwrap_or(false)
    }

    /// Add a directed link between two known ports. Both ports are no longer considered to be
    /// edge ports afterwards.
    pub fn add_link(&self, link: PhysicalLink) -> Result<(), SwitchError> {
        let (src_sw, dst_sw) = {
            let mut t = self.write();
            for port in [link.src, link.dst].iter() {
                let known = t
                    .ports
                    .get(&port.switch_id)
                    .map(|p| p.contains(&port.port_number))
                    .unwrap_or(false);
                if !known {
                    return Err(SwitchError::UnknownPhysicalPort(*port));
                }
            }
            let src_idx = t.nodes[&link.src.switch_id];
            let dst_idx = t.nodes[&link.dst.switch_id];
            if !t.graph.edges(src_idx).any(|e| *e.weight() == link) {
                t.graph.add_edge(src_idx, dst_idx, link);
                info!("Added link {}", link);
            }
            (
                t.switches.get(&link.src.switch_id).cloned(),
                t.switches.get(&link.dst.switch_id).cloned(),
            )
        };
        // the topology lock is released, since the switch locks its own ports.
        if let Some(sw) = src_sw {
            sw.set_edge_port(link.src.port_number, false);
        }
        if let Some(sw) = dst_sw {
            sw.set_edge_port(link.dst.port_number, false);
        }
        Ok(())
    }

    /// Remove a directed link. Returns `false` if the link did not exist.
    pub fn remove_link(&self, link: &PhysicalLink) -> bool {
        let mut t = self.write();
        let src_idx = match t.nodes.get(&link.src.switch_id) {
            Some(idx) => *idx,
            None => return false,
        };
        let edge = t.graph.edges(src_idx).find(|e| e.weight() == link).map(|e| e.id());
        match edge {
            Some(e) => t.graph.remove_edge(e).is_some(),
            None => false,
        }
    }

    /// Returns true if the link is part of the topology
    pub fn has_link(&self, link: &PhysicalLink) -> bool {
        let t = self.read();
        match t.nodes.get(&link.src.switch_id) {
            Some(idx) => t.graph.edges(*idx).any(|e| e.weight() == link),
            None => false,
        }
    }

    /// Returns a sorted list of all links
    pub fn get_links(&self) -> Vec<PhysicalLink> {
        let t = self.read();
        let mut links: Vec<PhysicalLink> =
            t.graph.edge_indices().filter_map(|e| t.graph.edge_weight(e).copied()).collect();
        links.sort();
        links
    }

    /// Returns a sorted list of all switches reachable over a single link.
    pub fn neighbors(&self, id: SwitchId) -> Vec<SwitchId> {
        let t = self.read();
        let mut neighbors: Vec<SwitchId> = match t.nodes.get(&id) {
            Some(idx) => t.graph.neighbors(*idx).filter_map(|n| t.graph.node_weight(n).copied()).collect(),
            None => Vec::new(),
        };
        neighbors.sort();
        neighbors.dedup();
        neighbors
    }
}
