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

//! # Network
//!
//! Shared collaborators of all switches: the [`PhysicalNetwork`] indexing the physical topology,
//! and the [`TenantMap`] mapping virtual elements onto physical resources.

pub mod map;
pub mod topology;

pub use map::{TenantMap, VirtualNetworkMap};
pub use topology::{PhysicalGraph, PhysicalNetwork};
