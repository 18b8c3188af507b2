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

//! # Transport Channels
//!
//! Writes are fire-and-forget: a switch hands its messages to the channel, and replies arrive
//! later as independent inbound messages.

use crate::message::OfMessage;
use log::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Transport towards a physical switch or towards a tenant controller.
pub trait Channel: fmt::Debug + Send + Sync {
    /// Write the messages on the channel.
    fn write(&self, msgs: Vec<OfMessage>);

    /// Close the channel.
    fn disconnect(&self);
}

/// Channel keeping every written message in memory.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    sent: Mutex<Vec<OfMessage>>,
    disconnected: AtomicBool,
}

impl MemoryChannel {
    /// Create a new, empty channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return all messages written so far.
    pub fn take(&self) -> Vec<OfMessage> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns the number of messages written and not yet taken.
    pub fn len(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if no message is waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `disconnect` was called on the channel.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

impl Channel for MemoryChannel {
    fn write(&self, msgs: Vec<OfMessage>) {
        if self.is_disconnected() {
            return;
        }
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).extend(msgs);
    }

    fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

/// Channel which only logs the messages written to it.
#[derive(Debug)]
pub struct LogChannel {
    name: String,
}

impl LogChannel {
    /// Create a new channel, labelled with the given name in the log output.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

impl Channel for LogChannel {
    fn write(&self, msgs: Vec<OfMessage>) {
        for msg in msgs {
            info!("[{}] xid {}: {:?}", self.name, msg.xid, msg.payload);
        }
    }

    fn disconnect(&self) {
        info!("[{}] disconnected", self.name);
    }
}
