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

//! # Virtual Switches
//!
//! A virtual switch is presented to exactly one tenant controller. It is either a
//! [`SingleSwitch`], backed by one physical switch, or a [`BigSwitch`], whose datapath spans
//! multiple physical switches. Both share the state stored in [`VirtualSwitchBase`].

use crate::channel::Channel;
use crate::datapath::{BigSwitch, Switch, VirtualPort};
use crate::hypervisor::Hypervisor;
use crate::message::OfMessage;
use crate::types::{
    MessageError, PortNumber, PortRef, SwitchError, SwitchId, SwitchState, TenantId, Xid,
};
use crate::Error;

use log::*;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Switch presented to a tenant controller.
pub trait VirtualSwitch: Switch {
    /// Returns the state shared by all virtual switches
    fn base(&self) -> &VirtualSwitchBase;

    /// Send a message of the tenant to the physical switch responsible for `in_port`.
    fn send_south(&self, msg: OfMessage, in_port: Option<PortNumber>);

    /// Translate the transaction id of the message. The new id is allocated on the physical switch
    /// responsible for `in_port`. If that switch is not known, the original id is returned.
    fn translate_xid(&self, msg: &OfMessage, in_port: Option<PortNumber>) -> Xid;

    /// Returns the physical port number to which the physical switch responsible for `in_port`
    /// must send a packet leaving the virtual switch on `out_port`.
    fn output_port(&self, in_port: Option<PortNumber>, out_port: PortNumber)
        -> Result<PortNumber, Error>;

    /// Returns the big switch, if this is one.
    fn as_big_switch(&self) -> Option<&BigSwitch> {
        None
    }

    /// Returns the tenant of the virtual switch
    fn tenant_id(&self) -> TenantId {
        self.base().tenant_id
    }

    /// Returns the virtual port
    fn get_port(&self, port: PortNumber) -> Option<VirtualPort> {
        self.base().get_port(port)
    }

    /// Returns all ports, sorted by port number
    fn ports(&self) -> Vec<VirtualPort> {
        self.base().ports()
    }

    /// Add a new port, backed by the physical port `physical`.
    fn add_port(&self, port: PortNumber, physical: PortRef) -> Result<VirtualPort, SwitchError> {
        self.base().add_port(port, physical)
    }

    /// Remove the port. Returns `false` if the port did not exist. Routes using the port are not
    /// removed.
    fn remove_port(&self, port: PortNumber) -> bool {
        self.base().remove_port(port)
    }

    /// Attach the channel towards the tenant controller.
    fn connect_controller(&self, channel: Arc<dyn Channel>) {
        self.base().connect_controller(channel)
    }

    /// Returns the current state of the switch
    fn state(&self) -> SwitchState {
        self.base().state()
    }
}

/// State shared by all virtual switches.
pub struct VirtualSwitchBase {
    switch_id: SwitchId,
    tenant_id: TenantId,
    name: String,
    ports: RwLock<HashMap<PortNumber, VirtualPort>>,
    state: Mutex<SwitchState>,
    active: AtomicBool,
    connected: AtomicBool,
    channel: RwLock<Option<Arc<dyn Channel>>>,
    hv: Hypervisor,
}

impl fmt::Debug for VirtualSwitchBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualSwitch")
            .field("switch_id", &self.switch_id)
            .field("tenant_id", &self.tenant_id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("ports", &self.ports().len())
            .finish()
    }
}

impl VirtualSwitchBase {
    pub(crate) fn new(hv: Hypervisor, tenant_id: TenantId, switch_id: SwitchId, name: String) -> Self {
        Self {
            switch_id,
            tenant_id,
            name,
            ports: RwLock::new(HashMap::new()),
            state: Mutex::new(SwitchState::Created),
            active: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            channel: RwLock::new(None),
            hv,
        }
    }

    /// Returns the id of the virtual switch
    pub fn switch_id(&self) -> SwitchId {
        self.switch_id
    }

    /// Returns the name of the virtual switch
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the shared handles of the hypervisor
    pub fn hypervisor(&self) -> &Hypervisor {
        &self.hv
    }

    /// Returns the current state of the switch
    pub fn state(&self) -> SwitchState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true if the switch is booted and not yet unregistered
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Returns true if a tenant controller is connected
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn get_port(&self, port: PortNumber) -> Option<VirtualPort> {
        self.ports.read().unwrap_or_else(PoisonError::into_inner).get(&port).copied()
    }

    fn ports(&self) -> Vec<VirtualPort> {
        let mut ports: Vec<VirtualPort> =
            self.ports.read().unwrap_or_else(PoisonError::into_inner).values().copied().collect();
        ports.sort_by_key(|p| p.port_number());
        ports
    }

    fn add_port(&self, port: PortNumber, physical: PortRef) -> Result<VirtualPort, SwitchError> {
        if !self.hv.network().has_port(physical) {
            return Err(SwitchError::UnknownPhysicalPort(physical));
        }
        let mut ports = self.ports.write().unwrap_or_else(PoisonError::into_inner);
        if ports.contains_key(&port) {
            return Err(SwitchError::PortExists(self.switch_id, port));
        }
        let vport = VirtualPort::new(self.tenant_id, self.switch_id, port, physical);
        ports.insert(port, vport);
        debug!("Added port {} on virtual switch {} mapped to {}", port, self.name, physical);
        Ok(vport)
    }

    fn remove_port(&self, port: PortNumber) -> bool {
        self.ports.write().unwrap_or_else(PoisonError::into_inner).remove(&port).is_some()
    }

    fn connect_controller(&self, channel: Arc<dyn Channel>) {
        *self.channel.write().unwrap_or_else(PoisonError::into_inner) = Some(channel);
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Fails if the switch can no longer be booted.
    pub(crate) fn check_bootable(&self) -> Result<(), SwitchError> {
        match self.state() {
            SwitchState::Unregistered => {
                Err(SwitchError::InvalidState(self.switch_id, SwitchState::Unregistered))
            }
            _ => Ok(()),
        }
    }

    /// Generic boot sequence of a virtual switch. Booting an already booted switch does nothing.
    pub(crate) fn boot(&self) -> Result<(), SwitchError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            SwitchState::Created => {
                *state = SwitchState::Booted;
                self.active.store(true, Ordering::SeqCst);
                info!(
                    "Booted virtual switch {} ({}) of {} with {} ports",
                    self.name,
                    self.switch_id,
                    self.tenant_id,
                    self.ports.read().unwrap_or_else(PoisonError::into_inner).len()
                );
                Ok(())
            }
            SwitchState::Booted => Ok(()),
            SwitchState::Unregistered => {
                Err(SwitchError::InvalidState(self.switch_id, SwitchState::Unregistered))
            }
        }
    }

    /// Mark the switch as unregistered. Returns `false` if it was already unregistered, in which
    /// case the caller must not clean up again.
    pub(crate) fn begin_unregister(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == SwitchState::Unregistered {
            return false;
        }
        *state = SwitchState::Unregistered;
        self.active.store(false, Ordering::SeqCst);
        true
    }

    /// Generic unregistration: remove the switch from the tenant map, drop all ports and disconnect
    /// the tenant controller.
    pub(crate) fn finish_unregister(&self) {
        self.hv.map().remove_virtual_switch(self.tenant_id, self.switch_id);
        self.ports.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.connected.store(false, Ordering::SeqCst);
        if let Some(channel) = self.channel.write().unwrap_or_else(PoisonError::into_inner).take() {
            channel.disconnect();
        }
        info!("Unregistered virtual switch {} ({}) of {}", self.name, self.switch_id, self.tenant_id);
    }

    /// Send the message to the tenant controller. The message is dropped if the switch is not
    /// active or no controller is connected.
    pub(crate) fn send_msg(&self, msg: OfMessage) {
        if !(self.is_connected() && self.is_active()) {
            debug!("Virtual switch {} is not connected, dropping {:?}", self.name, msg.msg_type());
            return;
        }
        if let Some(channel) = self.channel.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            channel.write(vec![msg]);
        }
    }
}

/// Translate a message of the tenant controller and send it to the physical network.
pub(crate) fn devirtualize(sw: &dyn VirtualSwitch, mut msg: OfMessage) -> Result<(), Error> {
    let msg_type = msg.msg_type();
    if !msg_type.is_devirtualizable() {
        return Err(MessageError::NotDevirtualizable(msg_type).into());
    }
    let in_port = msg.in_port();
    let ingress = match in_port {
        Some(p) => Some(sw.get_port(p).ok_or(MessageError::UnknownPort(p))?),
        None => None,
    };
    if let Some(out_ports) = msg.out_ports_mut() {
        for port in out_ports.iter_mut() {
            *port = sw.output_port(in_port, *port)?;
        }
    }
    if let Some(vport) = ingress {
        msg.set_in_port(vport.physical_port().port_number);
    }
    msg.xid = sw.translate_xid(&msg, in_port);
    sw.send_south(msg, in_port);
    Ok(())
}

/// Virtual switch backed by a single physical switch.
#[derive(Debug)]
pub struct SingleSwitch {
    base: VirtualSwitchBase,
    physical: SwitchId,
}

impl SingleSwitch {
    pub(crate) fn new(
        hv: Hypervisor,
        tenant_id: TenantId,
        switch_id: SwitchId,
        name: String,
        physical: SwitchId,
    ) -> Self {
        Self { base: VirtualSwitchBase::new(hv, tenant_id, switch_id, name), physical }
    }

    /// Returns the datapath id of the physical switch
    pub fn physical_switch(&self) -> SwitchId {
        self.physical
    }
}

impl Switch for SingleSwitch {
    fn switch_id(&self) -> SwitchId {
        self.base.switch_id
    }

    fn name(&self) -> &str {
        &self.base.name
    }

    fn is_connected(&self) -> bool {
        self.base.is_connected()
    }

    fn handle_io(&self, msg: OfMessage) {
        if let Err(e) = devirtualize(self, msg) {
            error!("{}", e);
        }
    }

    fn send_msg(&self, msg: OfMessage) {
        self.base.send_msg(msg)
    }

    fn boot(&self) -> Result<(), Error> {
        Ok(self.base.boot()?)
    }

    fn unregister(&self) {
        if self.base.begin_unregister() {
            self.base.finish_unregister();
        }
    }
}

impl VirtualSwitch for SingleSwitch {
    fn base(&self) -> &VirtualSwitchBase {
        &self.base
    }

    fn send_south(&self, msg: OfMessage, _in_port: Option<PortNumber>) {
        match self.base.hv.network().get_switch(self.physical) {
            Some(sw) => sw.send_msg(msg),
            None => warn!("Physical switch {} of {} is gone", self.physical, self.base.name),
        }
    }

    fn translate_xid(&self, msg: &OfMessage, _in_port: Option<PortNumber>) -> Xid {
        match self.base.hv.network().get_switch(self.physical) {
            Some(sw) => sw.translate(msg, self),
            None => msg.xid,
        }
    }

    fn output_port(
        &self,
        _in_port: Option<PortNumber>,
        out_port: PortNumber,
    ) -> Result<PortNumber, Error> {
        self.get_port(out_port)
            .map(|p| p.physical_port().port_number)
            .ok_or_else(|| MessageError::UnknownPort(out_port).into())
    }
}
