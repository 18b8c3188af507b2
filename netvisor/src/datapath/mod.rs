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

//! # Datapath
//!
//! This module contains the switches managed by the hypervisor: the [`PhysicalSwitch`], which
//! represents a real switch connected to the hypervisor, and the virtual switches presented to the
//! tenant controllers ([`SingleSwitch`] and [`BigSwitch`]).

use crate::message::OfMessage;
use crate::types::SwitchId;
use crate::Error;
use std::fmt;

mod big_switch;
mod physical_switch;
mod port;
pub mod route_table;
pub mod statistics;
mod teardown;
mod virtual_switch;
pub mod xid_translator;

pub use big_switch::BigSwitch;
pub use physical_switch::PhysicalSwitch;
pub use port::{PhysicalPort, VirtualPort};
pub use route_table::{RouteTable, SwitchRoute};
pub use statistics::StatisticsManager;
pub use teardown::{Teardown, TeardownOutcome};
pub use virtual_switch::{SingleSwitch, VirtualSwitch, VirtualSwitchBase};
pub use xid_translator::{XidPair, XidTranslator};

/// Common interface of physical and virtual switches.
pub trait Switch: fmt::Debug + Send + Sync {
    /// Returns the datapath id
    fn switch_id(&self) -> SwitchId;

    /// Returns the name of the switch
    fn name(&self) -> &str;

    /// Returns true if the control channel is connected
    fn is_connected(&self) -> bool;

    /// Handle a message received on the control channel of this switch.
    fn handle_io(&self, msg: OfMessage);

    /// Send a message on the control channel of this switch.
    fn send_msg(&self, msg: OfMessage);

    /// Start operating the switch.
    fn boot(&self) -> Result<(), Error>;

    /// Stop operating the switch, and release every resource it holds. Unregistering twice has no
    /// effect.
    fn unregister(&self);
}
