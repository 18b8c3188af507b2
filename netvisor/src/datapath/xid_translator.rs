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

//! # Transaction Id Translation
//!
//! Many tenants share the control connection of a single physical switch. Their transaction ids
//! may collide, so every request sent to the physical switch gets a fresh transaction id, and the
//! reply is mapped back to the tenant using the [`XidTranslator`] of that physical switch.

use crate::types::{SwitchId, TenantId, Xid};
use log::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

/// Transaction ids below this value are never handed out by the translator. They are reserved for
/// requests issued by the hypervisor itself.
pub const MIN_XID: Xid = 256;
/// Maximum number of outstanding translations per physical switch.
pub const MAX_OUTSTANDING: usize = 1 << 14;

/// Origin of a translated transaction: the virtual switch and its original transaction id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XidPair {
    /// Transaction id used by the tenant
    pub xid: Xid,
    /// Tenant of the virtual switch
    pub tenant_id: TenantId,
    /// Id of the virtual switch that sent the request
    pub switch_id: SwitchId,
}

#[derive(Debug)]
struct XidTable {
    next: Xid,
    seq: u64,
    capacity: usize,
    pairs: HashMap<Xid, (u64, XidPair)>,
    // insertion order, used to evict the oldest outstanding translation
    order: VecDeque<(Xid, u64)>,
}

impl XidTable {
    fn advance(&mut self) -> Xid {
        let xid = self.next;
        self.next = if self.next == Xid::MAX { MIN_XID } else { self.next + 1 };
        xid
    }

    fn evict_oldest(&mut self) {
        while let Some((xid, seq)) = self.order.pop_front() {
            if self.pairs.get(&xid).map(|(s, _)| *s == seq).unwrap_or(false) {
                if let Some((_, pair)) = self.pairs.remove(&xid) {
                    debug!("Dropping the unanswered translation {} -> {:?}", xid, pair);
                }
                return;
            }
        }
    }
}

/// Translator between tenant transaction ids and the transaction ids used on one physical switch.
#[derive(Debug)]
pub struct XidTranslator {
    table: Mutex<XidTable>,
}

impl Default for XidTranslator {
    fn default() -> Self {
        Self::new(MAX_OUTSTANDING)
    }
}

impl XidTranslator {
    /// Create a new translator keeping at most `capacity` outstanding translations. If more
    /// translations are created, the oldest one is dropped.
    pub fn new(capacity: usize) -> Self {
        Self {
            table: Mutex::new(XidTable {
                next: MIN_XID,
                seq: 0,
                capacity: capacity.max(1),
                pairs: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Allocate a new transaction id for the request `xid` of the virtual switch, and remember
    /// the translation. Ids of translations that are still outstanding are skipped.
    pub fn translate(&self, xid: Xid, tenant_id: TenantId, switch_id: SwitchId) -> Xid {
        let mut t = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if t.pairs.len() >= t.capacity {
            t.evict_oldest();
        }
        // terminates, since there are fewer outstanding translations than ids
        let mut new_xid = t.advance();
        while t.pairs.contains_key(&new_xid) {
            new_xid = t.advance();
        }
        t.seq += 1;
        let seq = t.seq;
        t.pairs.insert(new_xid, (seq, XidPair { xid, tenant_id, switch_id }));
        t.order.push_back((new_xid, seq));
        // drop stale entries of already answered translations
        if t.order.len() > 2 * t.capacity {
            let XidTable { pairs, order, .. } = &mut *t;
            order.retain(|(x, s)| pairs.get(x).map(|(ps, _)| ps == s).unwrap_or(false));
        }
        new_xid
    }

    /// Look up and remove the translation of `xid`. Returns `None` if the id was never handed
    /// out, or if the reply was already handled.
    pub fn untranslate(&self, xid: Xid) -> Option<XidPair> {
        let mut t = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        t.pairs.remove(&xid).map(|(_, pair)| pair)
    }

    /// Returns the number of outstanding translations
    pub fn outstanding(&self) -> usize {
        self.table.lock().unwrap_or_else(PoisonError::into_inner).pairs.len()
    }
}
