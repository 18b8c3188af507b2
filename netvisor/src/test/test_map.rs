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

use super::{big_switch, link_12, test_net, BS1, P1, P2, T7, T8};
use crate::datapath::Switch;
use crate::network::{TenantMap, VirtualNetworkMap};
use crate::routing::NoRouting;
use crate::types::{MappingError, SwitchId, TenantId};
use crate::Error;
use maplit::btreeset;
use std::sync::Arc;

#[test]
fn virtual_networks() {
    let map = VirtualNetworkMap::new();
    assert!(map.list_virtual_networks().is_empty());
    map.add_virtual_network(TenantId(3));
    map.add_virtual_network(TenantId(1));
    map.add_virtual_network(TenantId(3));
    assert_eq!(map.list_virtual_networks(), btreeset![TenantId(1), TenantId(3)]);
}

#[test]
fn register_virtual_switch() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(NoRouting));
    assert_eq!(net.map.list_virtual_networks(), btreeset![*T7]);
    assert_eq!(net.map.get_physical_switches(*T7, *BS1), vec![*P1, *P2]);

    for p in [*P1, *P2].iter() {
        let vsw = net.map.get_virtual_switch(*p, *T7).unwrap().unwrap();
        assert_eq!(vsw.switch_id(), *BS1);
        assert!(vsw.as_big_switch().is_some());
    }
    assert!(net.map.get_virtual_switch(*P1, *T8).unwrap().is_none());
    assert!(net.map.get_virtual_switch(SwitchId(9), *T7).unwrap().is_none());

    let by_id = net.map.get_virtual_switch_by_id(*T7, *BS1).unwrap();
    assert_eq!(by_id.name(), bs.name());
    assert!(net.map.get_virtual_switch_by_id(*T8, *BS1).is_none());
}

#[test]
fn virtual_switch_exists() {
    let net = test_net();
    big_switch(&net, Arc::new(NoRouting));
    match net.hv.create_big_switch(*T7, *BS1, "again", &[*P2], Arc::new(NoRouting)) {
        Err(Error::MappingError(MappingError::VirtualSwitchExists(t, s))) => {
            assert_eq!((t, s), (*T7, *BS1))
        }
        r => panic!("Unexpected result: {:?}", r),
    }
}

#[test]
fn physical_switch_taken() {
    let net = test_net();
    big_switch(&net, Arc::new(NoRouting));
    match net.hv.create_single_switch(*T7, SwitchId(0x101), "VS", *P2) {
        Err(Error::MappingError(MappingError::PhysicalSwitchTaken(p, t, s))) => {
            assert_eq!((p, t, s), (*P2, *T7, *BS1))
        }
        r => panic!("Unexpected result: {:?}", r),
    }
    // the failed registration leaves no trace
    assert!(net.map.get_virtual_switch_by_id(*T7, SwitchId(0x101)).is_none());

    // other tenants may share the physical switch
    net.hv.create_single_switch(*T8, SwitchId(0x101), "VS", *P2).unwrap();
    let vsw = net.map.get_virtual_switch(*P2, *T8).unwrap().unwrap();
    assert_eq!(vsw.tenant_id(), *T8);
}

#[test]
fn list_virtual_switches() {
    let net = test_net();
    big_switch(&net, Arc::new(NoRouting));
    // P2 is already taken by BS1 for tenant 7
    assert!(net.hv.create_single_switch(*T7, SwitchId(0x10), "VS", *P2).is_err());
    net.hv.create_single_switch(*T8, SwitchId(0x20), "VS", *P2).unwrap();
    net.hv.create_single_switch(*T8, SwitchId(0x10), "VS", *P1).unwrap();

    let ids = |t: TenantId| -> Vec<SwitchId> {
        net.map.list_virtual_switches(t).iter().map(|s| s.switch_id()).collect()
    };
    assert_eq!(ids(*T7), vec![*BS1]);
    assert_eq!(ids(*T8), vec![SwitchId(0x10), SwitchId(0x20)]);
    assert!(ids(TenantId(99)).is_empty());
}

#[test]
fn remove_virtual_switch() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(NoRouting));
    bs.create_route(1, 2, vec![link_12()], vec![], 1).unwrap();
    assert_eq!(net.map.route_count(), 2);

    net.map.remove_virtual_switch(*T7, *BS1);
    assert!(net.map.get_virtual_switch_by_id(*T7, *BS1).is_none());
    assert!(net.map.get_virtual_switch(*P1, *T7).unwrap().is_none());
    assert!(net.map.get_physical_switches(*T7, *BS1).is_empty());
    assert_eq!(net.map.route_count(), 0);
    // the tenant itself stays registered
    assert_eq!(net.map.list_virtual_networks(), btreeset![*T7]);

    // removing twice is a no-op
    net.map.remove_virtual_switch(*T7, *BS1);

    // the physical switches are free again
    net.hv.create_single_switch(*T7, SwitchId(0x101), "VS", *P1).unwrap();
}

#[test]
fn routes_of_a_virtual_switch() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(NoRouting));
    let route = bs.create_route(1, 2, vec![link_12()], vec![], 1).unwrap();
    assert_eq!(net.map.get_route(&route), Some(vec![link_12()]));
    assert_eq!(net.map.route_count_of(*T7, *BS1), 2);
    assert_eq!(net.map.route_count_of(*T8, *BS1), 0);

    net.map.remove_route(&route);
    assert!(net.map.get_route(&route).is_none());
    assert_eq!(net.map.route_count_of(*T7, *BS1), 1);
    // removing an unknown route is harmless
    net.map.remove_route(&route);
    assert_eq!(net.map.route_count(), 1);
}
