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

//! # Teardown of Virtual Switches
//!
//! When a physical switch disappears, every virtual switch mapped onto it must either recover or
//! be unregistered. Each tenant is handled by its own thread. The returned [`Teardown`] lets the
//! caller wait for all of them and inspect the outcome.

use crate::datapath::VirtualSwitch;
use crate::network::TenantMap;
use crate::types::{MappingError, SwitchId, TenantId};
use crate::Error;

use log::*;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Result of the teardown for one tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// The big switch of the tenant rerouted around the failed physical switch.
    Recovered,
    /// The virtual switch of the tenant was unregistered.
    Unregistered,
    /// The tenant has no virtual switch on the physical switch.
    NotMapped,
}

#[derive(Debug)]
enum Task {
    Running(JoinHandle<Result<TeardownOutcome, MappingError>>),
    Done(Result<TeardownOutcome, MappingError>),
}

/// Handles of the teardown threads started by unregistering a physical switch.
#[derive(Debug, Default)]
pub struct Teardown {
    tasks: Vec<(TenantId, Task)>,
}

impl Teardown {
    /// Start one teardown thread for every tenant.
    pub(crate) fn spawn<I>(physical: SwitchId, tenants: I, map: Arc<dyn TenantMap>) -> Self
    where
        I: IntoIterator<Item = TenantId>,
    {
        let tasks = tenants
            .into_iter()
            .map(|tenant| {
                let task_map = map.clone();
                let spawned = thread::Builder::new()
                    .name(format!("teardown-{}-{}", physical.0, tenant.0))
                    .spawn(move || tear_down(physical, tenant, task_map.as_ref()));
                let task = match spawned {
                    Ok(handle) => Task::Running(handle),
                    Err(e) => {
                        error!("Cannot start the teardown thread of {}: {}", tenant, e);
                        Task::Done(tear_down(physical, tenant, map.as_ref()))
                    }
                };
                (tenant, task)
            })
            .collect();
        Self { tasks }
    }

    /// Returns the number of tenants handled
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if no tenant is handled
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns the handled tenants
    pub fn tenants(&self) -> Vec<TenantId> {
        self.tasks.iter().map(|(t, _)| *t).collect()
    }

    /// Wait for all teardown threads, and return the outcome for every tenant.
    pub fn join(self) -> Vec<(TenantId, Result<TeardownOutcome, Error>)> {
        self.tasks
            .into_iter()
            .map(|(tenant, task)| {
                let result = match task {
                    Task::Running(handle) => match handle.join() {
                        Ok(r) => r.map_err(Error::from),
                        Err(_) => Err(Error::TeardownPanicked(tenant)),
                    },
                    Task::Done(r) => r.map_err(Error::from),
                };
                (tenant, result)
            })
            .collect()
    }
}

fn tear_down(
    physical: SwitchId,
    tenant: TenantId,
    map: &dyn TenantMap,
) -> Result<TeardownOutcome, MappingError> {
    let vsw = match map.get_virtual_switch(physical, tenant) {
        Ok(Some(vsw)) => vsw,
        Ok(None) => return Ok(TeardownOutcome::NotMapped),
        Err(e) => {
            warn!("Inconsistent mapping of {} on {}: {}", tenant, physical, e);
            return Err(e);
        }
    };
    if let Some(big) = vsw.as_big_switch() {
        if big.try_recovery(physical) {
            info!("{} of {} recovered from the failure of {}", big.base().name(), tenant, physical);
            return Ok(TeardownOutcome::Recovered);
        }
    }
    vsw.unregister();
    Ok(TeardownOutcome::Unregistered)
}
