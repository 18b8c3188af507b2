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

//! Module containing all error types

use crate::config::ConfigError;
use crate::types::{IndexError, MappingError, MessageError, RoutingError, SwitchError, TenantId};
use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// No more ids can be allocated
    #[error("Index Error: {0}")]
    IndexError(#[from] IndexError),
    /// Error while computing or storing routes
    #[error("Routing Error: {0}")]
    RoutingError(#[from] RoutingError),
    /// The tenant map is inconsistent, or a virtual switch is missing
    #[error("Mapping Error: {0}")]
    MappingError(#[from] MappingError),
    /// Invalid operation on a switch or its ports
    #[error("Switch Error: {0}")]
    SwitchError(#[from] SwitchError),
    /// A message could not be translated
    #[error("Message Error: {0}")]
    MessageError(#[from] MessageError),
    /// The deployment description is invalid
    #[error("Config Error: {0}")]
    ConfigError(#[from] ConfigError),
    /// The teardown thread of a tenant panicked
    #[error("The teardown of {0} panicked")]
    TeardownPanicked(TenantId),
}
