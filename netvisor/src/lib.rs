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

#![deny(missing_docs)]

//! # NetVisor: Network Hypervisor for Virtual Big Switches
//! This library slices a physical OpenFlow network between multiple tenants. Every tenant
//! controller sees its own virtual switches, and the hypervisor translates the messages between the
//! virtual and the physical network.
//!
//! ## Structure
//!
//! - **[`datapath`]**: The switches. A [`PhysicalSwitch`](datapath::PhysicalSwitch) virtualizes the
//!   messages of a real switch, and hands them to the tenants. A
//!   [`BigSwitch`](datapath::BigSwitch) presents many physical switches as one, and carries
//!   packets between them along internal routes, which are stored in its
//!   [`RouteTable`](datapath::RouteTable).
//! - **[`network`]**: The physical topology and the tenant map, which records which virtual switch
//!   is mapped onto which physical switch.
//! - **[`routing`]**: Strategies that decide how two ports of a big switch are connected.
//! - **[`index`]**: Allocator of small integer ids, used for the route ids.
//! - **[`message`]**: The OpenFlow messages exchanged with switches and tenant controllers.
//! - **[`channel`]**: The transport to switches and tenant controllers.
//! - **[`hypervisor`]**: The shared handles and settings, used to create switches.
//! - **[`config`]**: JSON description of a complete deployment.
//!
//! ## Failure of a Physical Switch
//!
//! When a physical switch disconnects, it is unregistered. Every tenant is handled in a separate
//! thread: Big switches may try to recover, and every virtual switch that cannot recover is
//! unregistered as well, which releases its routes and route ids. See
//! [`PhysicalSwitch::unregister_tracked`](datapath::PhysicalSwitch::unregister_tracked).

mod test;

pub mod channel;
pub mod config;
pub mod datapath;
mod error;
pub mod hypervisor;
pub mod index;
pub mod message;
pub mod network;
pub mod routing;
pub mod types;

pub use error::Error;
pub use hypervisor::{Hypervisor, Settings};
