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

//! # Deployment Configuration
//!
//! A deployment is described in JSON: the physical switches with their ports, the links between
//! them, and the big switches of every tenant. Links are always added in both directions.
//!
//! ```json
//! {
//!   "settings": { "stats_interval_ms": 5000 },
//!   "switches": [
//!     { "dpid": 1, "name": "s1", "ports": [1, 2] },
//!     { "dpid": 2, "name": "s2", "ports": [1, 2] }
//!   ],
//!   "links": [ { "src": { "dpid": 1, "port": 2 }, "dst": { "dpid": 2, "port": 2 } } ],
//!   "tenants": [ {
//!     "tenant": 1,
//!     "switches": [ {
//!       "switch_id": 100,
//!       "name": "bs1",
//!       "physical": [1, 2],
//!       "routing": "static",
//!       "ports": [
//!         { "port": 1, "physical": { "dpid": 1, "port": 1 } },
//!         { "port": 2, "physical": { "dpid": 2, "port": 1 } }
//!       ],
//!       "paths": [ {
//!         "src": { "dpid": 1, "port": 1 },
//!         "dst": { "dpid": 2, "port": 1 },
//!         "path": [ { "src": { "dpid": 1, "port": 2 }, "dst": { "dpid": 2, "port": 2 } } ]
//!       } ]
//!     } ]
//!   } ]
//! }
//! ```

use crate::channel::{Channel, LogChannel};
use crate::datapath::{BigSwitch, PhysicalSwitch, Switch, VirtualSwitch};
use crate::hypervisor::{Hypervisor, Settings};
use crate::message::PortDesc;
use crate::routing::{NoRouting, PathTable, Routable, RoutingType, DEFAULT_PRIORITY};
use crate::types::{PhysicalLink, PortNumber, PortRef, SwitchId, TenantId};
use crate::Error;

use log::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors in the deployment description
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file cannot be read
    #[error("Cannot read the configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid JSON, or does not match the expected structure
    #[error("Cannot parse the configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// A physical switch is referenced, but never declared
    #[error("Unknown physical switch {0}")]
    UnknownSwitch(SwitchId),
    /// A physical port is referenced, but never declared
    #[error("Unknown physical port {0}")]
    UnknownPort(PortRef),
    /// A virtual port is mapped onto a physical switch the virtual switch does not span
    #[error("Virtual switch {1} of {0} does not span {2}")]
    PortOutsideSwitch(TenantId, SwitchId, PortRef),
}

/// Runtime settings. Missing values use the defaults of [`Settings`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Interval of the port statistics poller, in milliseconds
    pub stats_interval_ms: Option<u64>,
    /// Number of route ids per big switch
    pub route_id_capacity: Option<usize>,
    /// Number of outstanding requests per physical switch
    pub xid_capacity: Option<usize>,
}

impl SettingsConfig {
    /// Returns the settings, filling in the defaults
    pub fn settings(&self) -> Settings {
        let default = Settings::default();
        Settings {
            stats_interval: self.stats_interval_ms.map(Duration::from_millis),
            route_id_capacity: self.route_id_capacity.unwrap_or(default.route_id_capacity),
            xid_capacity: self.xid_capacity.unwrap_or(default.xid_capacity),
        }
    }
}

/// Physical switch and its ports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchConfig {
    /// Datapath id
    pub dpid: SwitchId,
    /// Name of the switch
    pub name: String,
    /// Port numbers
    pub ports: Vec<PortNumber>,
}

/// Port of a virtual switch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualPortConfig {
    /// Virtual port number
    pub port: PortNumber,
    /// Backing physical port
    pub physical: PortRef,
}

/// Path between two physical ports, used by the routing strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathConfig {
    /// First physical port
    pub src: PortRef,
    /// Second physical port
    pub dst: PortRef,
    /// Links from `src` to `dst`
    pub path: Vec<PhysicalLink>,
    /// Links from `dst` back to `src`. The reversed path is used if missing.
    #[serde(default)]
    pub revpath: Option<Vec<PhysicalLink>>,
    /// Priority of the resulting routes
    #[serde(default = "default_priority")]
    pub priority: u8,
}

/// Route created explicitly between two virtual ports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Ingress virtual port
    pub src_port: PortNumber,
    /// Egress virtual port
    pub dst_port: PortNumber,
    /// Links from the ingress to the egress port
    pub path: Vec<PhysicalLink>,
    /// Links of the reverse route. The reversed path is used if empty.
    #[serde(default)]
    pub revpath: Vec<PhysicalLink>,
    /// Priority of the routes
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

fn default_routing() -> RoutingType {
    RoutingType::OnDemand
}

/// Big switch of a tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigSwitchConfig {
    /// Datapath id presented to the tenant
    pub switch_id: SwitchId,
    /// Name of the switch
    pub name: String,
    /// Physical switches spanned by the big switch
    pub physical: Vec<SwitchId>,
    /// When routes are computed
    #[serde(default = "default_routing")]
    pub routing: RoutingType,
    /// Virtual ports
    #[serde(default)]
    pub ports: Vec<VirtualPortConfig>,
    /// Paths known to the routing strategy
    #[serde(default)]
    pub paths: Vec<PathConfig>,
    /// Routes created before the switch boots
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// Virtual network of a tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Tenant id
    pub tenant: TenantId,
    /// Big switches of the tenant
    #[serde(default)]
    pub switches: Vec<BigSwitchConfig>,
}

/// Description of a complete deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HypervisorConfig {
    /// Runtime settings
    #[serde(default)]
    pub settings: SettingsConfig,
    /// Physical switches
    #[serde(default)]
    pub switches: Vec<SwitchConfig>,
    /// Links between physical switches (added in both directions)
    #[serde(default)]
    pub links: Vec<PhysicalLink>,
    /// Tenants
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,
}

/// Running deployment, built from a [`HypervisorConfig`].
#[derive(Debug)]
pub struct Deployment {
    /// Shared handles
    pub hypervisor: Hypervisor,
    /// Physical switches, in the order they were declared
    pub physical: Vec<Arc<PhysicalSwitch>>,
    /// Big switches of all tenants, in the order they were declared
    pub big_switches: Vec<Arc<BigSwitch>>,
}

impl HypervisorConfig {
    /// Read the configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Parse the configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check that every referenced switch and port is declared.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let switches: HashSet<SwitchId> = self.switches.iter().map(|s| s.dpid).collect();
        let ports: HashSet<PortRef> = self
            .switches
            .iter()
            .flat_map(|s| s.ports.iter().map(move |p| PortRef::new(s.dpid, *p)))
            .collect();
        let check_port = |p: &PortRef| {
            if ports.contains(p) {
                Ok(())
            } else {
                Err(ConfigError::UnknownPort(*p))
            }
        };
        for link in self.links.iter() {
            check_port(&link.src)?;
            check_port(&link.dst)?;
        }
        for tenant in self.tenants.iter() {
            for vsw in tenant.switches.iter() {
                if let Some(p) = vsw.physical.iter().find(|p| !switches.contains(p)) {
                    return Err(ConfigError::UnknownSwitch(*p));
                }
                for port in vsw.ports.iter() {
                    check_port(&port.physical)?;
                    if !vsw.physical.contains(&port.physical.switch_id) {
                        return Err(ConfigError::PortOutsideSwitch(
                            tenant.tenant,
                            vsw.switch_id,
                            port.physical,
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Build the deployment, logging every message sent on any channel.
    pub fn build(&self) -> Result<Deployment, Error> {
        self.build_with(|name| -> Arc<dyn Channel> { Arc::new(LogChannel::new(name)) })
    }

    /// Build the deployment. `channel` is called with the name of every physical and virtual
    /// switch, and returns the channel towards the switch (or the tenant controller).
    pub fn build_with<F>(&self, mut channel: F) -> Result<Deployment, Error>
    where
        F: FnMut(&str) -> Arc<dyn Channel>,
    {
        self.validate()?;
        // partially built deployments are shut down when dropped on error
        let mut deployment = Deployment {
            hypervisor: Hypervisor::new(self.settings.settings()),
            physical: Vec::with_capacity(self.switches.len()),
            big_switches: Vec::new(),
        };
        let hypervisor = deployment.hypervisor.clone();

        for s in self.switches.iter() {
            let ports = s.ports.iter().map(|p| PortDesc::new(*p)).collect();
            let sw = hypervisor.connect_physical_switch(s.dpid, &s.name, ports, channel(&s.name))?;
            deployment.physical.push(sw);
        }

        for link in self.links.iter() {
            hypervisor.network().add_link(*link)?;
            hypervisor.network().add_link(link.reversed())?;
        }

        for tenant in self.tenants.iter() {
            hypervisor.map().add_virtual_network(tenant.tenant);
            for vsw in tenant.switches.iter() {
                let sw = hypervisor.create_big_switch(
                    tenant.tenant,
                    vsw.switch_id,
                    &vsw.name,
                    &vsw.physical,
                    routing_strategy(vsw),
                )?;
                for port in vsw.ports.iter() {
                    sw.add_port(port.port, port.physical)?;
                }
                sw.connect_controller(channel(&vsw.name));
                for route in vsw.routes.iter() {
                    sw.create_route(
                        route.src_port,
                        route.dst_port,
                        route.path.clone(),
                        route.revpath.clone(),
                        route.priority,
                    )?;
                }
                sw.boot()?;
                deployment.big_switches.push(sw);
            }
        }

        info!(
            "Deployed {} physical switches and {} big switches",
            deployment.physical.len(),
            deployment.big_switches.len()
        );
        Ok(deployment)
    }
}

fn routing_strategy(vsw: &BigSwitchConfig) -> Arc<dyn Routable> {
    if vsw.routing == RoutingType::None {
        return Arc::new(NoRouting);
    }
    let mut table = PathTable::new(vsw.routing);
    for p in vsw.paths.iter() {
        table.add_path(p.src, p.dst, p.path.clone(), p.revpath.clone(), p.priority);
    }
    Arc::new(table)
}

impl Drop for Deployment {
    fn drop(&mut self) {
        self.hypervisor.shutdown();
    }
}

impl Deployment {
    /// Returns the physical switch with the given datapath id
    pub fn physical_switch(&self, id: SwitchId) -> Option<&Arc<PhysicalSwitch>> {
        self.physical.iter().find(|s| s.switch_id() == id)
    }

    /// Returns the number of cached routes of every big switch
    pub fn route_counts(&self) -> HashMap<(TenantId, SwitchId), usize> {
        self.big_switches
            .iter()
            .map(|s| ((s.tenant_id(), s.switch_id()), s.route_count()))
            .collect()
    }
}
