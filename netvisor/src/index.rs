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

//! # Index Allocator
//!
//! Bounded set of small integer ids, handing out the smallest unused id first. Released ids can
//! be acquired again.

use crate::types::IndexError;
use log::*;
use std::sync::{Mutex, PoisonError};

/// Number of route ids available on a single big switch.
pub const ROUTE_ID_CAPACITY: usize = 1 << 24;

const WORD_BITS: usize = 64;

/// Allocator for ids in the range `0..capacity`. The used ids are stored in a bitset, which only
/// grows as far as the largest id in use.
#[derive(Debug)]
pub struct IdAllocator {
    capacity: usize,
    words: Mutex<Vec<u64>>,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(ROUTE_ID_CAPACITY)
    }
}

impl IdAllocator {
    /// Create a new allocator, where the ids `0..capacity` are all unused.
    pub fn new(capacity: usize) -> Self {
        Self { capacity, words: Mutex::new(Vec::new()) }
    }

    /// Returns the number of ids in the index space
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Acquire the smallest id which is currently not in use.
    pub fn acquire(&self) -> Result<u32, IndexError> {
        let mut words = self.words.lock().unwrap_or_else(PoisonError::into_inner);
        let word_idx = words.iter().position(|w| *w != u64::MAX).unwrap_or_else(|| words.len());
        let bit = if word_idx < words.len() { words[word_idx].trailing_ones() as usize } else { 0 };
        let id = word_idx * WORD_BITS + bit;
        if id >= self.capacity {
            return Err(IndexError::CapacityExhausted(self.capacity));
        }
        if word_idx == words.len() {
            words.push(0);
        }
        words[word_idx] |= 1 << bit;
        Ok(id as u32)
    }

    /// Return the id to the set of unused ids. Returns `false` if the id was not in use, in
    /// which case nothing is changed.
    pub fn release(&self, id: u32) -> bool {
        let mut words = self.words.lock().unwrap_or_else(PoisonError::into_inner);
        let (word_idx, bit) = (id as usize / WORD_BITS, id as usize % WORD_BITS);
        match words.get_mut(word_idx) {
            Some(w) if *w & (1 << bit) != 0 => {
                *w &= !(1 << bit);
            }
            _ => {
                warn!("Released id {} which was not in use", id);
                return false;
            }
        }
        // shrink the bitset
        while words.last() == Some(&0) {
            words.pop();
        }
        true
    }

    /// Returns true if the id is currently in use
    pub fn is_used(&self, id: u32) -> bool {
        let words = self.words.lock().unwrap_or_else(PoisonError::into_inner);
        let (word_idx, bit) = (id as usize / WORD_BITS, id as usize % WORD_BITS);
        words.get(word_idx).map(|w| w & (1 << bit) != 0).unwrap_or(false)
    }

    /// Returns the number of ids currently in use
    pub fn used(&self) -> usize {
        let words = self.words.lock().unwrap_or_else(PoisonError::into_inner);
        words.iter().map(|w| w.count_ones() as usize).sum()
    }
}
