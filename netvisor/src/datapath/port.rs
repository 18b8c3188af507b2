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

//! Module defining physical and virtual ports.

use crate::message::PortDesc;
use crate::types::{PortNumber, PortRef, SwitchId, TenantId};
use std::fmt;

/// Port of a physical switch. The physical switch exclusively owns its ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalPort {
    port_number: PortNumber,
    switch_id: SwitchId,
    hw_addr: [u8; 6],
    name: String,
    is_edge: bool,
}

impl PhysicalPort {
    /// Create a new port from its description. Ports are assumed to be edge ports until a link
    /// is discovered on them.
    pub fn new(switch_id: SwitchId, desc: &PortDesc) -> Self {
        Self {
            port_number: desc.port_no,
            switch_id,
            hw_addr: desc.hw_addr,
            name: desc.name.clone(),
            is_edge: true,
        }
    }

    /// Returns the port number
    pub fn port_number(&self) -> PortNumber {
        self.port_number
    }

    /// Returns the datapath id of the switch owning the port
    pub fn switch_id(&self) -> SwitchId {
        self.switch_id
    }

    /// Returns the hardware address
    pub fn hw_addr(&self) -> [u8; 6] {
        self.hw_addr
    }

    /// Returns the interface name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the port connects to an end host (as far as the topology knows).
    pub fn is_edge(&self) -> bool {
        self.is_edge
    }

    pub(crate) fn set_edge(&mut self, is_edge: bool) {
        self.is_edge = is_edge;
    }

    /// Returns the non-owning reference to this port
    pub fn port_ref(&self) -> PortRef {
        PortRef::new(self.switch_id, self.port_number)
    }
}

impl fmt::Display for PhysicalPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.port_ref(), self.name)
    }
}

/// Port of a virtual switch, backed by exactly one physical port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualPort {
    port_number: PortNumber,
    tenant_id: TenantId,
    switch_id: SwitchId,
    physical: PortRef,
}

impl VirtualPort {
    /// Create a new virtual port on the virtual switch `switch_id` of `tenant_id`.
    pub fn new(
        tenant_id: TenantId,
        switch_id: SwitchId,
        port_number: PortNumber,
        physical: PortRef,
    ) -> Self {
        Self { port_number, tenant_id, switch_id, physical }
    }

    /// Returns the virtual port number
    pub fn port_number(&self) -> PortNumber {
        self.port_number
    }

    /// Returns the tenant owning the port
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the id of the virtual switch owning the port
    pub fn switch_id(&self) -> SwitchId {
        self.switch_id
    }

    /// Returns the reference to the physical port backing this virtual port.
    pub fn physical_port(&self) -> PortRef {
        self.physical
    }

    /// Returns the datapath id of the physical switch backing this virtual port.
    pub fn physical_switch(&self) -> SwitchId {
        self.physical.switch_id
    }
}
