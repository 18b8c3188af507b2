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

#[cfg(test)]
mod test_big_switch;
#[cfg(test)]
mod test_map;
#[cfg(test)]
mod test_topology;
#[cfg(test)]
mod test_xid_translator;

#[cfg(test)]
use crate::channel::MemoryChannel;
#[cfg(test)]
use crate::datapath::{BigSwitch, PhysicalSwitch, VirtualSwitch};
#[cfg(test)]
use crate::message::PortDesc;
#[cfg(test)]
use crate::network::VirtualNetworkMap;
#[cfg(test)]
use crate::routing::Routable;
#[cfg(test)]
use crate::types::{PhysicalLink, PortRef, SwitchId, TenantId};
#[cfg(test)]
use crate::{Hypervisor, Settings};
#[cfg(test)]
use lazy_static::lazy_static;
#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
lazy_static! {
    pub(crate) static ref P1: SwitchId = SwitchId(1);
    pub(crate) static ref P2: SwitchId = SwitchId(2);
    pub(crate) static ref T7: TenantId = TenantId(7);
    pub(crate) static ref T8: TenantId = TenantId(8);
    pub(crate) static ref BS1: SwitchId = SwitchId(0x100);
}

/// # Test network
///
/// ```text
///     [1]       [3]     [3]       [1]
/// h1 ----- P1 ------------- P2 ----- h2
///          | [2]       [2] |
///          h3              h4
/// ```
///
/// The link between P1 and P2 exists in both directions.
#[cfg(test)]
pub(crate) struct TestNet {
    pub hv: Hypervisor,
    pub map: Arc<VirtualNetworkMap>,
    pub p1: Arc<PhysicalSwitch>,
    pub p2: Arc<PhysicalSwitch>,
    pub ch1: Arc<MemoryChannel>,
    pub ch2: Arc<MemoryChannel>,
}

#[cfg(test)]
pub(crate) fn port(switch: SwitchId, port: u16) -> PortRef {
    PortRef::new(switch, port)
}

/// Link from P1 port 3 to P2 port 3
#[cfg(test)]
pub(crate) fn link_12() -> PhysicalLink {
    PhysicalLink::new(port(*P1, 3), port(*P2, 3))
}

/// Link from P2 port 3 to P1 port 3
#[cfg(test)]
pub(crate) fn link_21() -> PhysicalLink {
    link_12().reversed()
}

#[cfg(test)]
pub(crate) fn test_net() -> TestNet {
    test_net_with(Settings::default())
}

#[cfg(test)]
pub(crate) fn test_net_with(settings: Settings) -> TestNet {
    let map = Arc::new(VirtualNetworkMap::new());
    let hv = Hypervisor::with_map(map.clone(), settings);
    let ports = || vec![PortDesc::new(1), PortDesc::new(2), PortDesc::new(3)];
    let ch1 = Arc::new(MemoryChannel::new());
    let ch2 = Arc::new(MemoryChannel::new());
    let p1 = hv.connect_physical_switch(*P1, "P1", ports(), ch1.clone()).unwrap();
    let p2 = hv.connect_physical_switch(*P2, "P2", ports(), ch2.clone()).unwrap();
    hv.network().add_link(link_12()).unwrap();
    hv.network().add_link(link_21()).unwrap();
    TestNet { hv, map, p1, p2, ch1, ch2 }
}

/// Big switch `BS1` of tenant 7 spanning P1 and P2 (not yet booted), with port 1 on P1 port 1,
/// port 2 on P2 port 1, and port 3 on P1 port 2.
#[cfg(test)]
pub(crate) fn big_switch(
    net: &TestNet,
    routing: Arc<dyn Routable>,
) -> (Arc<BigSwitch>, Arc<MemoryChannel>) {
    let bs = net.hv.create_big_switch(*T7, *BS1, "BS1", &[*P1, *P2], routing).unwrap();
    bs.add_port(1, port(*P1, 1)).unwrap();
    bs.add_port(2, port(*P2, 1)).unwrap();
    bs.add_port(3, port(*P1, 2)).unwrap();
    let ctrl = Arc::new(MemoryChannel::new());
    bs.connect_controller(ctrl.clone());
    (bs, ctrl)
}
