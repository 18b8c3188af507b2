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

//! # Statistics Poller
//!
//! Periodically requests the port counters of a physical switch. The requests use transaction ids
//! below [`MIN_XID`], which are never handed out to tenants. Hence, the replies cannot be
//! untranslated, and the physical switch installs them as its new port statistics snapshot.

use crate::datapath::xid_translator::MIN_XID;
use crate::datapath::{PhysicalSwitch, Switch};
use crate::message::{OfMessage, Payload, StatsRequest};
use crate::types::Xid;

use log::*;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug)]
struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Background poller of the port statistics of one physical switch.
#[derive(Debug)]
pub struct StatisticsManager {
    interval: Option<Duration>,
    worker: Mutex<Option<Worker>>,
}

impl StatisticsManager {
    /// Create a new poller. If `interval` is `None`, the poller never runs.
    pub fn new(interval: Option<Duration>) -> Self {
        Self { interval, worker: Mutex::new(None) }
    }

    /// Returns true if the background thread is running
    pub fn is_running(&self) -> bool {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Start polling the switch. The thread stops on its own as soon as the switch is dropped.
    pub fn start(&self, switch: Weak<PhysicalSwitch>) {
        let interval = match self.interval {
            Some(i) => i,
            None => return,
        };
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return;
        }
        let name = match switch.upgrade() {
            Some(sw) => format!("stats-{}", sw.switch_id().0),
            None => return,
        };
        let (stop, rx) = mpsc::channel::<()>();
        let spawned = thread::Builder::new().name(name).spawn(move || {
            let mut xid: Xid = 0;
            loop {
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
                let sw = match switch.upgrade() {
                    Some(sw) => sw,
                    None => break,
                };
                xid = (xid + 1) % MIN_XID;
                sw.send_msg(OfMessage::new(xid, Payload::StatsRequest(StatsRequest::Port(None))));
            }
        });
        match spawned {
            Ok(handle) => *worker = Some(Worker { stop, handle }),
            Err(e) => error!("Cannot start the statistics poller: {}", e),
        }
    }

    /// Stop polling, and wait for the background thread to finish.
    pub fn stop(&self) {
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(Worker { stop, handle }) = worker {
            // the thread may have stopped already, in which case sending fails
            let _ = stop.send(());
            if handle.join().is_err() {
                warn!("Statistics poller panicked");
            }
        }
    }
}
