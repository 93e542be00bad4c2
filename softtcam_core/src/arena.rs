//! Slot arena backing trie nodes and match entries.
//!
//! Elements are addressed by stable `u32` slot indices. Freed slots are
//! recycled LIFO. The slot index doubles as the element's storage address
//! for the reordering subsystem, which permutes occupied slots in place.

use std::ops::{Index, IndexMut};

pub struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Arena<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Place `value` in a free slot (recycled first) and return its index.
    pub fn alloc(&mut self, value: T) -> u32 {
        self.live += 1;
        match self.free.pop() {
            Some(idx) => {
                debug_assert!(self.slots[idx as usize].is_none());
                self.slots[idx as usize] = Some(value);
                idx
            }
            None => {
                let idx = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
                debug_assert!(idx < u32::MAX, "arena index space exhausted");
                self.slots.push(Some(value));
                idx
            }
        }
    }

    /// Vacate a slot, returning its element. `None` if the slot was empty.
    pub fn free(&mut self, idx: u32) -> Option<T> {
        let value = self.slots.get_mut(idx as usize)?.take()?;
        self.free.push(idx);
        self.live -= 1;
        Some(value)
    }

    pub fn get(&self, idx: u32) -> Option<&T> {
        self.slots.get(idx as usize)?.as_ref()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Occupied plus vacant slots, i.e. the address range in use.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Occupied slots in address order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|v| (i as u32, v)))
    }

    /// Move every element from slot `i` to slot `remap[i]`, letting
    /// `rewrite` fix up the element's internal links on the way.
    ///
    /// `remap` must be a permutation of the occupied slots; the free list
    /// stays valid because the occupied set does not change.
    pub fn relocate<F>(&mut self, remap: &[Option<u32>], mut rewrite: F)
    where
        F: FnMut(&mut T),
    {
        let mut moved: Vec<Option<T>> = Vec::with_capacity(self.slots.len());
        moved.resize_with(self.slots.len(), || None);
        for (old, slot) in self.slots.iter_mut().enumerate() {
            if let Some(mut value) = slot.take() {
                rewrite(&mut value);
                let new = remap.get(old).copied().flatten().unwrap_or(old as u32);
                debug_assert!(moved[new as usize].is_none(), "relocation is not a permutation");
                moved[new as usize] = Some(value);
            }
        }
        self.slots = moved;
    }
}

impl<T> Index<u32> for Arena<T> {
    type Output = T;

    fn index(&self, idx: u32) -> &T {
        match self.slots.get(idx as usize) {
            Some(Some(v)) => v,
            _ => panic!("dangling arena index {idx}"),
        }
    }
}

impl<T> IndexMut<u32> for Arena<T> {
    fn index_mut(&mut self, idx: u32) -> &mut T {
        match self.slots.get_mut(idx as usize) {
            Some(Some(v)) => v,
            _ => panic!("dangling arena index {idx}"),
        }
    }
}

/// Translate a slot index through a relocation table; unmapped slots stay put.
#[inline]
pub fn through(remap: &[Option<u32>], idx: u32) -> u32 {
    remap.get(idx as usize).copied().flatten().unwrap_or(idx)
}
