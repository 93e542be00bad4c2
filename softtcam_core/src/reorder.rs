//! Storage-layout reordering for cache-locality experiments.
//!
//! Both sorts permute the occupied node and entry slots of a whole pool,
//! rewriting every link (children, parent, entry list, engine roots)
//! through the resulting relocation tables. Logical trie content is
//! untouched, so lookups return the same values before and after.

use crate::arena::{through, Arena};
use crate::helpers::KeyBits;
use crate::types::{Entry, EntryId, Node, NodeId, TcamPool};
use log::{debug, info};
use metrics::counter;
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write;
use std::mem::size_of;

/// Elements that count their own reads.
trait Instrumented {
    fn counter(&self) -> u64;
    fn reset_counter(&self);
}

impl<K> Instrumented for Node<K> {
    fn counter(&self) -> u64 {
        self.access_counter.get()
    }
    fn reset_counter(&self) {
        self.access_counter.set(0);
    }
}

impl<V> Instrumented for Entry<V> {
    fn counter(&self) -> u64 {
        self.access_counter.get()
    }
    fn reset_counter(&self) {
        self.access_counter.set(0);
    }
}

/// Occupied slots, hottest first. Ties keep address order.
fn access_order<T: Instrumented>(arena: &Arena<T>) -> Vec<u32> {
    let mut slots: Vec<(u32, u64)> = arena.iter().map(|(i, t)| (i, t.counter())).collect();
    slots.sort_by(|a, b| b.1.cmp(&a.1));
    slots.into_iter().map(|(i, _)| i).collect()
}

/// Occupied slots, lowest address first.
fn address_order<T>(arena: &Arena<T>) -> Vec<u32> {
    arena.iter().map(|(i, _)| i).collect()
}

/// Address order regrouped so that consecutive picks come from different
/// pages: bucket slots by page, then take one slot per page round-robin.
fn page_interleaved(address_order: &[u32], slot_bytes: usize, page_size: usize) -> Vec<u32> {
    let page_size = page_size.max(1);
    let mut pages: BTreeMap<usize, VecDeque<u32>> = BTreeMap::new();
    for &idx in address_order {
        pages
            .entry(idx as usize * slot_bytes / page_size)
            .or_default()
            .push_back(idx);
    }
    let mut out = Vec::with_capacity(address_order.len());
    while out.len() < address_order.len() {
        for queue in pages.values_mut() {
            if let Some(idx) = queue.pop_front() {
                out.push(idx);
            }
        }
    }
    out
}

/// Table sending slot `from[i]` to slot `to[i]`.
fn relocation_table(from: &[u32], to: &[u32], slots: usize) -> Vec<Option<u32>> {
    debug_assert_eq!(from.len(), to.len());
    let mut table = vec![None; slots];
    for (&old, &new) in from.iter().zip(to) {
        table[old as usize] = Some(new);
    }
    table
}

impl<K: KeyBits, V> TcamPool<K, V> {
    /// Pack hot elements into the lowest addresses: the most accessed node
    /// takes the first occupied slot, the next one the second, and so on.
    pub fn sort_best(&mut self) {
        info!(
            "[SORT_BEST] relocating {} nodes, {} entries",
            self.nodes.len(),
            self.entries.len()
        );
        let nm = relocation_table(
            &access_order(&self.nodes),
            &address_order(&self.nodes),
            self.nodes.slot_count(),
        );
        let em = relocation_table(
            &access_order(&self.entries),
            &address_order(&self.entries),
            self.entries.slot_count(),
        );
        self.apply_relocation(&nm, &em);
        counter!("softtcam_reorders_total").increment(1);
    }

    /// Spread hot elements across distinct pages to produce a worst-case
    /// access pattern for comparison with `sort_best`.
    pub fn sort_worst(&mut self) {
        info!(
            "[SORT_WORST] relocating {} nodes, {} entries (page size {})",
            self.nodes.len(),
            self.entries.len(),
            self.config.page_size
        );
        let node_targets = page_interleaved(
            &address_order(&self.nodes),
            size_of::<Option<Node<K>>>(),
            self.config.page_size,
        );
        let entry_targets = page_interleaved(
            &address_order(&self.entries),
            size_of::<Option<Entry<V>>>(),
            self.config.page_size,
        );
        let nm = relocation_table(&access_order(&self.nodes), &node_targets, self.nodes.slot_count());
        let em = relocation_table(
            &access_order(&self.entries),
            &entry_targets,
            self.entries.slot_count(),
        );
        self.apply_relocation(&nm, &em);
        counter!("softtcam_reorders_total").increment(1);
    }

    fn apply_relocation(&mut self, nm: &[Option<u32>], em: &[Option<u32>]) {
        self.nodes.relocate(nm, |node| {
            node.parent = node.parent.map(|p| NodeId(through(nm, p.0)));
            for child in node.children.iter_mut().flatten() {
                *child = NodeId(through(nm, child.0));
            }
            node.entries = node.entries.map(|e| EntryId(through(em, e.0)));
        });
        self.entries.relocate(em, |entry| {
            entry.node = entry.node.map(|n| NodeId(through(nm, n.0)));
            entry.next = entry.next.map(|e| EntryId(through(em, e.0)));
            entry.prev = entry.prev.map(|e| EntryId(through(em, e.0)));
        });
        self.engines.remap_roots(|r| NodeId(through(nm, r.0)));
        debug!("[REORDER] relocation applied to {} engines", self.engines.len());
    }

    /// Zero every node and entry access counter in the pool.
    pub fn clear_access_counters(&self) {
        for (_, node) in self.nodes.iter() {
            node.reset_counter();
        }
        for (_, entry) in self.entries.iter() {
            entry.reset_counter();
        }
    }

    /// Node slots in address order with their access counters.
    pub fn node_access_profile(&self) -> Vec<(NodeId, u64)> {
        self.nodes.iter().map(|(i, n)| (NodeId(i), n.counter())).collect()
    }

    /// Entry slots in address order with their access counters.
    pub fn entry_access_profile(&self) -> Vec<(EntryId, u64)> {
        self.entries.iter().map(|(i, e)| (EntryId(i), e.counter())).collect()
    }

    /// Summed access counters: `(nodes, entries)`.
    pub fn access_totals(&self) -> (u64, u64) {
        let n = self.nodes.iter().map(|(_, n)| n.counter()).sum();
        let e = self.entries.iter().map(|(_, e)| e.counter()).sum();
        (n, e)
    }

    /// One `N`/`E` line per element followed by the totals.
    pub fn dump_access_counters(&self) -> String {
        let mut out = String::new();
        for (id, count) in self.node_access_profile() {
            let _ = writeln!(out, "N\t{}\t{}", id, count);
        }
        for (id, count) in self.entry_access_profile() {
            let _ = writeln!(out, "E\t{}\t{}", id, count);
        }
        let (n, e) = self.access_totals();
        let _ = writeln!(out, " node total access  : {}", n);
        let _ = writeln!(out, " entry total access : {}", e);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleave_round_robins_pages() {
        // 4 slots per page
        let order: Vec<u32> = (0..10).collect();
        let out = page_interleaved(&order, 16, 64);
        assert_eq!(out, vec![0, 4, 8, 1, 5, 9, 2, 6, 3, 7]);
    }

    #[test]
    fn relocation_table_maps_positionally() {
        let t = relocation_table(&[3, 0, 5], &[0, 3, 5], 6);
        assert_eq!(t, vec![Some(3), None, None, Some(0), None, Some(5)]);
    }
}
