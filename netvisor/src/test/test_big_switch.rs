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

use super::{big_switch, link_12, link_21, port, test_net, BS1, P1, P2, T7, T8};
use crate::datapath::xid_translator::MIN_XID;
use crate::datapath::{Switch, VirtualSwitch};
use crate::message::{OfMessage, Payload, StatsReply, StatsRequest};
use crate::network::TenantMap;
use crate::routing::{NoRouting, PathTable, RoutingType};
use crate::types::{PhysicalLink, RouteId, RoutingError, SwitchError, SwitchState};
use crate::Error;
use maplit::hashset;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

fn path_table(routing_type: RoutingType) -> PathTable {
    let mut table = PathTable::new(routing_type);
    table.add_path(port(*P1, 1), port(*P2, 1), vec![link_12()], None, 1);
    table
}

#[test]
fn create_and_unregister_route() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(NoRouting));
    let path_a = vec![link_12()];
    let path_b = vec![link_21()];

    let route = bs.create_route(1, 2, path_a.clone(), path_b.clone(), 1).unwrap();
    assert_eq!(route.route_id(), RouteId(0));
    assert_eq!(route.priority(), 1);
    assert_eq!(bs.get_route(1, 2).unwrap().path(), path_a.as_slice());
    assert_eq!(bs.get_route(2, 1).unwrap().path(), path_b.as_slice());
    assert_eq!(net.map.route_count_of(*T7, *BS1), 2);

    assert!(bs.unregister_route(RouteId(0)));
    assert!(bs.route_map().is_empty());
    assert_eq!(net.map.route_count(), 0);
    assert!(!bs.unregister_route(RouteId(0)));
}

#[test]
fn create_route_with_symmetric_path() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(NoRouting));
    bs.create_route(1, 2, vec![link_12()], vec![], 3).unwrap();
    let reverse = bs.get_route(2, 1).unwrap();
    assert_eq!(reverse.path(), &[link_21()]);
    assert_eq!(reverse.priority(), 3);
}

#[test]
fn create_route_unknown_port() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(NoRouting));
    match bs.create_route(1, 9, vec![link_12()], vec![], 1) {
        Err(Error::RoutingError(RoutingError::UnknownPort(9))) => {}
        r => panic!("Unexpected result: {:?}", r),
    }
}

#[test]
fn no_routing() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(NoRouting));
    bs.boot().unwrap();
    assert_eq!(bs.state(), SwitchState::Booted);
    assert_eq!(bs.route_count(), 0);
    match bs.get_route(1, 2) {
        Err(Error::RoutingError(RoutingError::NoPathFound(id, 1, 2))) => assert_eq!(id, *BS1),
        r => panic!("Unexpected result: {:?}", r),
    }
}

#[test]
fn boot_precomputes_static_routes() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(path_table(RoutingType::Static)));
    bs.boot().unwrap();
    // port 3 has no path to port 2, and ports 1 and 3 are on the same physical switch
    let routes = bs.route_map();
    assert_eq!(bs.route_count(), 2);
    assert!(routes[&1].contains_key(&2));
    assert!(routes[&2].contains_key(&1));
    assert!(routes.get(&3).is_none());
    assert_eq!(net.map.route_count_of(*T7, *BS1), 2);
}

#[test]
fn boot_precomputes_all_pairs() {
    let net = test_net();
    let mut table = path_table(RoutingType::Static);
    table.add_path(port(*P1, 2), port(*P2, 1), vec![link_12()], Some(vec![link_21()]), 1);
    let (bs, _) = big_switch(&net, Arc::new(table));
    bs.boot().unwrap();
    assert_eq!(bs.route_count(), 4);
    assert_eq!(bs.routes_by_port(2).len(), 4);
    assert_eq!(bs.routes_by_port(1).len(), 2);
    let ids: Vec<RouteId> = bs.routes_by_port(3).iter().map(|r| r.route_id()).collect();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], ids[1]);
    assert_eq!(bs.routes_by_id(ids[0]).len(), 2);
}

#[test]
fn on_demand_routes() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(path_table(RoutingType::OnDemand)));
    assert_eq!(bs.route_count(), 0);
    let route = bs.get_route(2, 1).unwrap();
    assert_eq!(route.path(), &[link_21()]);
    assert!(Arc::ptr_eq(&route, &bs.get_route(2, 1).unwrap()));
    assert_eq!(bs.route_count(), 2);
}

#[test]
fn boot_precomputes_on_demand_routes() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(path_table(RoutingType::OnDemand)));
    bs.boot().unwrap();
    assert_eq!(bs.route_count(), 2);
    assert_eq!(net.map.route_count_of(*T7, *BS1), 2);
    // the cached route is returned, nothing is computed again
    let cached = bs.route_map()[&2][&1].clone();
    assert!(Arc::ptr_eq(&cached, &bs.get_route(2, 1).unwrap()));
    assert_eq!(bs.route_count(), 2);
}

#[test]
fn invalid_path_is_rejected() {
    let net = test_net();
    let mut table = PathTable::new(RoutingType::OnDemand);
    // link does not exist in the topology
    let bogus = PhysicalLink::new(port(*P1, 2), port(*P2, 2));
    table.add_path(port(*P1, 1), port(*P2, 1), vec![bogus], None, 1);
    let (bs, _) = big_switch(&net, Arc::new(table));
    match bs.get_route(1, 2) {
        Err(Error::RoutingError(RoutingError::InvalidPath(_, _, _))) => {}
        r => panic!("Unexpected result: {:?}", r),
    }
    assert_eq!(bs.route_count(), 0);
}

#[test]
fn concurrent_get_route() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(path_table(RoutingType::OnDemand)));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let bs = bs.clone();
            thread::spawn(move || {
                if i % 2 == 0 {
                    bs.get_route(1, 2).unwrap().route_id()
                } else {
                    bs.get_route(2, 1).unwrap().route_id()
                }
            })
        })
        .collect();
    let ids: Vec<RouteId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.iter().all(|id| *id == RouteId(0)));
    assert_eq!(bs.route_count(), 2);
    assert_eq!(net.map.route_count(), 2);
}

#[test]
fn remove_port_keeps_routes() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(path_table(RoutingType::Static)));
    bs.boot().unwrap();
    assert!(bs.remove_port(2));
    assert!(!bs.remove_port(2));
    assert!(bs.get_port(2).is_none());
    assert_eq!(bs.routes_by_port(2).len(), 2);
}

#[test]
fn add_port_unknown_physical_port() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(NoRouting));
    assert_eq!(bs.add_port(4, port(*P1, 9)), Err(SwitchError::UnknownPhysicalPort(port(*P1, 9))));
    assert_eq!(bs.add_port(1, port(*P2, 2)), Err(SwitchError::PortExists(*BS1, 1)));
    assert_eq!(bs.ports().len(), 3);
}

#[test]
fn unregister() {
    let net = test_net();
    let (bs, ctrl) = big_switch(&net, Arc::new(path_table(RoutingType::Static)));
    bs.boot().unwrap();
    assert_eq!(net.map.route_count(), 2);

    bs.unregister();
    assert_eq!(bs.state(), SwitchState::Unregistered);
    assert_eq!(bs.route_count(), 0);
    assert_eq!(net.map.route_count(), 0);
    assert!(bs.ports().is_empty());
    assert!(ctrl.is_disconnected());
    assert!(net.map.get_virtual_switch_by_id(*T7, *BS1).is_none());
    assert!(net.map.get_virtual_switch(*P1, *T7).unwrap().is_none());

    // unregister is idempotent, and the switch cannot boot again
    bs.unregister();
    assert_eq!(bs.state(), SwitchState::Unregistered);
    match bs.boot() {
        Err(Error::SwitchError(SwitchError::InvalidState(id, SwitchState::Unregistered))) => {
            assert_eq!(id, *BS1)
        }
        r => panic!("Unexpected result: {:?}", r),
    }
}

#[test]
fn try_recovery_fails() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(NoRouting));
    assert!(!bs.try_recovery(*P1));
}

#[test]
fn devirtualize_across_physical_switches() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(path_table(RoutingType::Static)));
    bs.boot().unwrap();

    let flow_mod = Payload::FlowMod { in_port: Some(1), out_ports: vec![2], priority: 10 };
    bs.handle_io(OfMessage::new(5, flow_mod));
    let sent = net.ch1.take();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].xid >= MIN_XID);
    assert_eq!(
        sent[0].payload,
        Payload::FlowMod { in_port: Some(1), out_ports: vec![3], priority: 10 }
    );
    assert!(net.ch2.is_empty());
}

#[test]
fn devirtualize_on_one_physical_switch() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(NoRouting));
    bs.boot().unwrap();

    let packet_out = Payload::PacketOut { in_port: Some(3), out_ports: vec![1], data: vec![1, 2] };
    bs.handle_io(OfMessage::new(5, packet_out));
    let sent = net.ch1.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].payload,
        Payload::PacketOut { in_port: Some(2), out_ports: vec![1], data: vec![1, 2] }
    );
}

#[test]
fn devirtualize_without_route_is_dropped() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(NoRouting));
    bs.boot().unwrap();

    let flow_mod = Payload::FlowMod { in_port: Some(1), out_ports: vec![2], priority: 10 };
    bs.handle_io(OfMessage::new(5, flow_mod));
    assert!(net.ch1.is_empty());
    assert!(net.ch2.is_empty());
    assert_eq!(net.p1.outstanding_requests(), 0);
}

#[test]
fn request_without_ingress_port_is_dropped() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(NoRouting));
    bs.boot().unwrap();

    let barrier = OfMessage::new(77, Payload::BarrierRequest);
    assert_eq!(bs.translate_xid(&barrier, None), 77);
    assert_eq!(bs.translate_xid(&barrier, Some(42)), 77);
    bs.handle_io(barrier);
    assert!(net.ch1.is_empty());
    assert!(net.ch2.is_empty());
}

#[test]
fn not_devirtualizable_is_dropped() {
    let net = test_net();
    let (bs, ctrl) = big_switch(&net, Arc::new(NoRouting));
    bs.boot().unwrap();
    let packet_in = Payload::PacketIn { in_port: 1, buffer_id: None, data: vec![] };
    bs.handle_io(OfMessage::new(1, packet_in));
    assert!(net.ch1.is_empty());
    assert!(net.ch2.is_empty());
    assert!(ctrl.is_empty());
    assert!(bs.is_connected());
}

#[test]
fn reply_reaches_the_tenant() {
    let net = test_net();
    let (bs, ctrl) = big_switch(&net, Arc::new(NoRouting));
    bs.boot().unwrap();

    bs.handle_io(OfMessage::new(42, Payload::StatsRequest(StatsRequest::Port(Some(2)))));
    let sent = net.ch2.take();
    assert_eq!(sent.len(), 1);
    // the virtual port 2 is backed by port 1 on P2
    assert_eq!(sent[0].payload, Payload::StatsRequest(StatsRequest::Port(Some(1))));
    let xid = sent[0].xid;
    assert_eq!(net.p2.outstanding_requests(), 1);

    let reply = StatsReply::Port(vec![(1, Default::default())]);
    net.p2.handle_io(OfMessage::new(xid, Payload::StatsReply(reply.clone())));
    let received = ctrl.take();
    assert_eq!(received, vec![OfMessage::new(42, Payload::StatsReply(reply))]);
    assert_eq!(net.p2.outstanding_requests(), 0);
}

#[test]
fn messages_are_dropped_before_boot() {
    let net = test_net();
    let (bs, ctrl) = big_switch(&net, Arc::new(NoRouting));
    bs.send_msg(OfMessage::new(1, Payload::BarrierReply));
    assert!(ctrl.is_empty());
    bs.boot().unwrap();
    bs.send_msg(OfMessage::new(1, Payload::BarrierReply));
    assert_eq!(ctrl.len(), 1);
}

#[test]
fn routes_of_two_tenants() {
    let net = test_net();
    let (bs, _) = big_switch(&net, Arc::new(path_table(RoutingType::Static)));
    let other = net
        .hv
        .create_big_switch(*T8, *BS1, "BS2", &[*P1, *P2], Arc::new(NoRouting))
        .unwrap();
    other.add_port(1, port(*P1, 1)).unwrap();
    other.add_port(2, port(*P2, 1)).unwrap();
    other.create_route(1, 2, vec![link_12()], vec![], 1).unwrap();
    bs.boot().unwrap();
    other.boot().unwrap();
    assert_eq!(net.map.route_count(), 4);
    assert_eq!(net.map.list_virtual_networks().len(), 2);

    bs.unregister();
    assert_eq!(net.map.route_count(), 2);
    assert_eq!(other.route_map()[&1].keys().copied().collect::<Vec<_>>(), vec![2]);
    let dst_ports: HashSet<_> = other.routes_by_port(1).iter().map(|r| r.dst_port()).collect();
    assert_eq!(dst_ports, hashset![1, 2]);
}
