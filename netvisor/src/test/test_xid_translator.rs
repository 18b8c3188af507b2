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

use crate::datapath::xid_translator::{XidPair, XidTranslator, MIN_XID};
use crate::types::{SwitchId, TenantId};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

#[test]
fn untranslate_once() {
    let t = XidTranslator::default();
    let xid = t.translate(42, TenantId(7), SwitchId(100));
    assert!(xid >= MIN_XID);
    assert_eq!(t.outstanding(), 1);
    assert_eq!(
        t.untranslate(xid),
        Some(XidPair { xid: 42, tenant_id: TenantId(7), switch_id: SwitchId(100) })
    );
    assert_eq!(t.untranslate(xid), None);
    assert_eq!(t.outstanding(), 0);
}

#[test]
fn unsolicited_xid() {
    let t = XidTranslator::default();
    assert_eq!(t.untranslate(0), None);
    assert_eq!(t.untranslate(MIN_XID), None);
}

#[test]
fn tenants_do_not_collide() {
    let t = XidTranslator::default();
    let a = t.translate(1, TenantId(1), SwitchId(100));
    let b = t.translate(1, TenantId(2), SwitchId(100));
    assert_ne!(a, b);
    assert_eq!(t.untranslate(b).map(|p| p.tenant_id), Some(TenantId(2)));
    assert_eq!(t.untranslate(a).map(|p| p.tenant_id), Some(TenantId(1)));
}

#[test]
fn evict_oldest() {
    let t = XidTranslator::new(2);
    let a = t.translate(1, TenantId(1), SwitchId(1));
    let b = t.translate(2, TenantId(1), SwitchId(1));
    let c = t.translate(3, TenantId(1), SwitchId(1));
    assert_eq!(t.outstanding(), 2);
    assert_eq!(t.untranslate(a), None);
    assert_eq!(t.untranslate(b).map(|p| p.xid), Some(2));
    assert_eq!(t.untranslate(c).map(|p| p.xid), Some(3));
}

#[test]
fn answered_translations_are_not_evicted() {
    let t = XidTranslator::new(2);
    let a = t.translate(1, TenantId(1), SwitchId(1));
    assert!(t.untranslate(a).is_some());
    let b = t.translate(2, TenantId(1), SwitchId(1));
    let c = t.translate(3, TenantId(1), SwitchId(1));
    assert_eq!(t.outstanding(), 2);
    assert!(t.untranslate(b).is_some());
    assert!(t.untranslate(c).is_some());
}

#[test]
fn concurrent_translate() {
    let t = Arc::new(XidTranslator::default());
    let handles: Vec<_> = (0..4u32)
        .map(|tenant| {
            let t = t.clone();
            thread::spawn(move || {
                (0..200)
                    .map(|i| (t.translate(i, TenantId(tenant), SwitchId(1)), i))
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let results: Vec<Vec<_>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let xids: HashSet<_> = results.iter().flatten().map(|(x, _)| *x).collect();
    assert_eq!(xids.len(), 800);
    for (tenant, translated) in results.into_iter().enumerate() {
        for (xid, original) in translated {
            let pair = t.untranslate(xid).unwrap();
            assert_eq!(pair.tenant_id, TenantId(tenant as u32));
            assert_eq!(pair.xid, original);
        }
    }
    assert_eq!(t.outstanding(), 0);
}
