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

//! Module containing all type definitions shared by the physical and the virtual layer.

use crate::message::MessageType;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Port number, unique within the switch that owns the port.
pub type PortNumber = u16;
/// OpenFlow transaction id
pub type Xid = u32;

/// Switch Identification. For physical switches, this is the datapath id. For virtual switches,
/// the id is only unique within its tenant.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwitchId(pub u64);

impl fmt::Display for SwitchId {
    /// Datapath ids are written as eight colon-separated hex bytes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        for (i, b) in bytes.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Tenant Identification
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub u32);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tenant {}", self.0)
    }
}

/// Route Identification, unique within a single big switch.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteId(pub u32);

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route {}", self.0)
    }
}

/// Non-owning reference to a physical port, resolved through the
/// [`PhysicalNetwork`](crate::network::PhysicalNetwork).
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PortRef {
    /// Datapath id of the physical switch owning the port
    #[serde(rename = "dpid")]
    pub switch_id: SwitchId,
    /// Port number on that switch
    #[serde(rename = "port")]
    pub port_number: PortNumber,
}

impl PortRef {
    /// Create a new port reference
    pub fn new(switch_id: SwitchId, port_number: PortNumber) -> Self {
        Self { switch_id, port_number }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.switch_id, self.port_number)
    }
}

/// Directed physical link between two physical ports.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhysicalLink {
    /// Port where the link starts
    pub src: PortRef,
    /// Port where the link ends
    pub dst: PortRef,
}

impl PhysicalLink {
    /// Create a new directed link
    pub fn new(src: PortRef, dst: PortRef) -> Self {
        Self { src, dst }
    }

    /// Returns the same link in the opposite direction
    pub fn reversed(&self) -> Self {
        Self { src: self.dst, dst: self.src }
    }
}

impl fmt::Display for PhysicalLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

/// Lifecycle of a switch. Transitions are monotonic: `Created -> Booted -> Unregistered`, where
/// `Created -> Unregistered` is allowed as well.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub enum SwitchState {
    /// The switch exists, but was not yet booted
    Created,
    /// The switch is booted and active
    Booted,
    /// The switch was unregistered. It cannot be booted again.
    Unregistered,
}

/// Errors of the index allocator
#[derive(Error, Debug, PartialEq)]
pub enum IndexError {
    /// All ids of the index space are in use
    #[error("All {0} ids are in use")]
    CapacityExhausted(usize),
}

/// Errors of the routing strategies and the route table
#[derive(Error, Debug, PartialEq)]
pub enum RoutingError {
    /// The routing strategy cannot connect the two ports
    #[error("No path found on switch {0} between ports {1} and {2}")]
    NoPathFound(SwitchId, PortNumber, PortNumber),
    /// The given path is not a valid sequence of physical links
    #[error("Invalid path between {0} and {1}: {2}")]
    InvalidPath(PortRef, PortRef, &'static str),
    /// A route between the two ports is already registered
    #[error("A route between ports {0} and {1} already exists")]
    RouteExists(PortNumber, PortNumber),
    /// The port is not part of the switch
    #[error("Port {0} is not part of the big switch")]
    UnknownPort(PortNumber),
}

/// Errors of the tenant mapping store
#[derive(Error, Debug, PartialEq)]
pub enum MappingError {
    /// The mapping store holds references which cannot be resolved
    #[error("Inconsistency in the tenant map: {0}")]
    InconsistentMapping(String),
    /// The virtual switch is not registered
    #[error("Virtual switch {1} of {0} is not registered")]
    UnknownVirtualSwitch(TenantId, SwitchId),
    /// A virtual switch with the same id is already registered for the tenant
    #[error("Virtual switch {1} of {0} is already registered")]
    VirtualSwitchExists(TenantId, SwitchId),
    /// The tenant already has a different virtual switch on the physical switch
    #[error("Physical switch {0} already hosts virtual switch {2} of {1}")]
    PhysicalSwitchTaken(SwitchId, TenantId, SwitchId),
}

/// Errors of the switch life cycle
#[derive(Error, Debug, PartialEq)]
pub enum SwitchError {
    /// The operation is not allowed in the current state of the switch
    #[error("Switch {0} cannot perform this operation in state {1:?}")]
    InvalidState(SwitchId, SwitchState),
    /// The port number is already used on this switch
    #[error("Port {1} already exists on switch {0}")]
    PortExists(SwitchId, PortNumber),
    /// The port number is not used on this switch
    #[error("Port {1} does not exist on switch {0}")]
    PortNotFound(SwitchId, PortNumber),
    /// The physical port is not known in the topology
    #[error("Physical port {0} is not known in the topology")]
    UnknownPhysicalPort(PortRef),
    /// The physical switch is not known in the topology
    #[error("Physical switch {0} is not known in the topology")]
    UnknownPhysicalSwitch(SwitchId),
}

/// Errors while translating a message between the physical and the virtual layer
#[derive(Error, Debug, PartialEq)]
pub enum MessageError {
    /// The message cannot travel from a physical switch towards a tenant
    #[error("Received illegal message from the physical network: {0:?}")]
    NotVirtualizable(MessageType),
    /// The message cannot travel from a tenant towards the physical network
    #[error("Received illegal message from the tenant controller: {0:?}")]
    NotDevirtualizable(MessageType),
    /// The message references a port which is not known
    #[error("Message references the unknown port {0}")]
    UnknownPort(PortNumber),
    /// The message must cross the big switch between two ports without any route.
    #[error("No route between ports {0} and {1}")]
    NoRoute(PortNumber, PortNumber),
}
