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

use super::{link_12, link_21, port, test_net, P1, P2};
use crate::channel::MemoryChannel;
use crate::datapath::{PhysicalSwitch, Switch};
use crate::message::PortDesc;
use crate::network::PhysicalNetwork;
use crate::types::{PhysicalLink, SwitchError, SwitchId};
use crate::Hypervisor;
use std::sync::Arc;

fn switch(id: SwitchId) -> Arc<PhysicalSwitch> {
    PhysicalSwitch::new(
        Hypervisor::default(),
        id,
        format!("s{}", id.0),
        vec![PortDesc::new(1)],
        Arc::new(MemoryChannel::new()),
    )
}

/// Three switches in a line, with ports 1 and 2 each, and links `1 -> 2 -> 3`.
fn line() -> PhysicalNetwork {
    let net = PhysicalNetwork::new();
    for id in 1..=3 {
        net.add_switch(switch(SwitchId(id)));
        net.add_port(port(SwitchId(id), 1)).unwrap();
        net.add_port(port(SwitchId(id), 2)).unwrap();
    }
    net.add_link(PhysicalLink::new(port(SwitchId(1), 2), port(SwitchId(2), 1))).unwrap();
    net.add_link(PhysicalLink::new(port(SwitchId(2), 2), port(SwitchId(3), 1))).unwrap();
    net
}

#[test]
fn add_switch() {
    let net = PhysicalNetwork::new();
    assert!(net.add_switch(switch(SwitchId(2))));
    assert!(net.add_switch(switch(SwitchId(1))));
    assert!(!net.add_switch(switch(SwitchId(2))));
    assert_eq!(net.get_switches(), vec![SwitchId(1), SwitchId(2)]);
    assert_eq!(net.get_switch(SwitchId(1)).map(|s| s.name().to_string()), Some("s1".to_string()));
    assert!(net.get_switch(SwitchId(3)).is_none());
}

#[test]
fn ports() {
    let net = PhysicalNetwork::new();
    assert_eq!(net.add_port(port(*P1, 1)), Err(SwitchError::UnknownPhysicalSwitch(*P1)));
    net.add_switch(switch(*P1));
    net.add_port(port(*P1, 1)).unwrap();
    assert!(net.has_port(port(*P1, 1)));
    assert!(!net.has_port(port(*P1, 2)));
    assert!(net.remove_port(port(*P1, 1)));
    assert!(!net.remove_port(port(*P1, 1)));
    assert!(!net.has_port(port(*P1, 1)));
}

#[test]
fn links() {
    let net = line();
    let l12 = PhysicalLink::new(port(SwitchId(1), 2), port(SwitchId(2), 1));
    assert_eq!(net.get_links().len(), 2);
    assert!(net.has_link(&l12));
    assert!(!net.has_link(&l12.reversed()));

    // adding a link twice keeps a single edge
    net.add_link(l12).unwrap();
    assert_eq!(net.get_links().len(), 2);

    let unknown = PhysicalLink::new(port(SwitchId(1), 5), port(SwitchId(2), 1));
    assert_eq!(net.add_link(unknown), Err(SwitchError::UnknownPhysicalPort(port(SwitchId(1), 5))));

    assert!(net.remove_link(&l12));
    assert!(!net.remove_link(&l12));
    assert!(!net.has_link(&l12));
}

#[test]
fn neighbors() {
    let net = line();
    assert_eq!(net.neighbors(SwitchId(1)), vec![SwitchId(2)]);
    assert_eq!(net.neighbors(SwitchId(2)), vec![SwitchId(3)]);
    assert!(net.neighbors(SwitchId(3)).is_empty());
    assert!(net.neighbors(SwitchId(4)).is_empty());
}

#[test]
fn remove_port_removes_links() {
    let net = line();
    net.add_link(PhysicalLink::new(port(SwitchId(3), 1), port(SwitchId(2), 2))).unwrap();
    assert_eq!(net.get_links().len(), 3);
    assert!(net.remove_port(port(SwitchId(2), 2)));
    assert_eq!(
        net.get_links(),
        vec![PhysicalLink::new(port(SwitchId(1), 2), port(SwitchId(2), 1))]
    );
}

#[test]
fn remove_switch_removes_links() {
    let net = line();
    assert!(net.remove_switch(SwitchId(2)).is_some());
    assert!(net.remove_switch(SwitchId(2)).is_none());
    assert!(net.get_links().is_empty());
    assert!(!net.has_port(port(SwitchId(2), 1)));
    assert_eq!(net.get_switches(), vec![SwitchId(1), SwitchId(3)]);
    assert!(net.neighbors(SwitchId(1)).is_empty());
}

#[test]
fn links_mark_internal_ports() {
    let net = test_net();
    assert_eq!(net.hv.network().get_links(), vec![link_12(), link_21()]);
    assert_eq!(net.p2.get_port(3).map(|p| p.is_edge()), Some(false));
    assert_eq!(net.p2.get_port(1).map(|p| p.is_edge()), Some(true));
    assert_eq!(net.hv.network().neighbors(*P1), vec![*P2]);
    assert_eq!(net.hv.network().neighbors(*P2), vec![*P1]);
}
