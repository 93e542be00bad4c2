//! Trie node and match entry accessors, plus the entry-list discipline.
//!
//! Every read accessor bumps the element's access counter; the reordering
//! subsystem uses those counters to decide where elements should live.

use crate::errors::Error;
use crate::helpers::KeyBits;
use crate::types::{Branch, Entry, EntryId, Node, NodeId, TcamPool};
use log::trace;
use std::cell::Cell;

#[inline(always)]
fn bump(counter: &Cell<u64>) {
    counter.set(counter.get().wrapping_add(1));
}

impl<K: KeyBits> Node<K> {
    pub fn new(data: K, mask: K, position: u32) -> Self {
        debug_assert!(position <= K::WIDTH);
        Self {
            data,
            mask,
            position,
            parent: None,
            children: [None; 3],
            entries: None,
            access_counter: Cell::new(0),
        }
    }

    #[inline]
    pub fn data(&self) -> K {
        bump(&self.access_counter);
        self.data
    }

    #[inline]
    pub fn mask(&self) -> K {
        bump(&self.access_counter);
        self.mask
    }

    #[inline]
    pub fn position(&self) -> u32 {
        bump(&self.access_counter);
        self.position
    }

    /// A full node commits every key bit and is the only kind that carries entries.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.position() == K::WIDTH
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        bump(&self.access_counter);
        self.parent
    }

    #[inline]
    pub fn child(&self, branch: Branch) -> Option<NodeId> {
        bump(&self.access_counter);
        self.children[branch as usize]
    }

    pub fn n0(&self) -> Option<NodeId> {
        self.child(Branch::Zero)
    }

    pub fn n1(&self) -> Option<NodeId> {
        self.child(Branch::One)
    }

    pub fn ndc(&self) -> Option<NodeId> {
        self.child(Branch::DontCare)
    }

    #[inline]
    pub fn entry_head(&self) -> Option<EntryId> {
        bump(&self.access_counter);
        self.entries
    }

    pub fn child_count(&self) -> usize {
        self.children.iter().flatten().count()
    }

    pub fn access_counter(&self) -> u64 {
        self.access_counter.get()
    }

    pub(crate) fn set_child(&mut self, branch: Branch, child: Option<NodeId>) {
        self.children[branch as usize] = child;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    /// Branch slot currently holding `child`, if it is a child of this node.
    pub(crate) fn branch_of(&self, child: NodeId) -> Option<Branch> {
        Branch::ALL
            .into_iter()
            .find(|b| self.children[*b as usize] == Some(child))
    }
}

impl<V> Entry<V> {
    pub fn new(priority: u32, value: V) -> Self {
        Self {
            priority,
            value,
            node: None,
            next: None,
            prev: None,
            access_counter: Cell::new(0),
        }
    }

    #[inline]
    pub fn priority(&self) -> u32 {
        bump(&self.access_counter);
        self.priority
    }

    #[inline]
    pub fn value(&self) -> &V {
        bump(&self.access_counter);
        &self.value
    }

    #[inline]
    pub fn node(&self) -> Option<NodeId> {
        bump(&self.access_counter);
        self.node
    }

    #[inline]
    pub fn next(&self) -> Option<EntryId> {
        bump(&self.access_counter);
        self.next
    }

    #[inline]
    pub fn prev(&self) -> Option<EntryId> {
        bump(&self.access_counter);
        self.prev
    }

    pub fn access_counter(&self) -> u64 {
        self.access_counter.get()
    }
}

impl<K: KeyBits, V> TcamPool<K, V> {
    /// Splice `entry` into `node`'s list in priority-descending order.
    ///
    /// An entry goes after every existing entry of equal or higher
    /// priority, so earlier insertions keep precedence among ties.
    pub(crate) fn insert_entry(&mut self, node: NodeId, entry: EntryId) -> Result<(), Error> {
        if self.entries[entry.0].node.is_some() {
            return Err(Error::InvalidState("entry already attached to a node"));
        }
        let priority = self.entries[entry.0].priority;
        let head = self.nodes[node.0].entries;

        let after = match head {
            Some(h) if self.entries[h.0].priority() >= priority => {
                let mut prev = h;
                let mut curr = self.entries[h.0].next();
                while let Some(c) = curr {
                    if self.entries[c.0].priority() < priority {
                        break;
                    }
                    prev = c;
                    curr = self.entries[c.0].next();
                }
                Some(prev)
            }
            _ => None,
        };

        let next = match after {
            Some(prev) => self.entries[prev.0].next,
            None => head,
        };
        {
            let e = &mut self.entries[entry.0];
            e.node = Some(node);
            e.prev = after;
            e.next = next;
        }
        match after {
            Some(prev) => self.entries[prev.0].next = Some(entry),
            None => self.nodes[node.0].entries = Some(entry),
        }
        if let Some(n) = next {
            self.entries[n.0].prev = Some(entry);
        }
        trace!("[ENTRY] linked {} (prio {}) into {}", entry, priority, node);
        Ok(())
    }

    /// Unlink `entry` from `node`'s list and release its slot.
    pub(crate) fn erase_entry(&mut self, node: NodeId, entry: EntryId) -> Result<Entry<V>, Error> {
        let mut curr = self.nodes[node.0].entry_head();
        while let Some(c) = curr {
            if c == entry {
                break;
            }
            curr = self.entries[c.0].next();
        }
        if curr.is_none() {
            return Err(Error::InvalidState("entry is not linked to this node"));
        }

        let (prev, next) = {
            let e = &self.entries[entry.0];
            (e.prev, e.next)
        };
        match prev {
            Some(p) => self.entries[p.0].next = next,
            None => self.nodes[node.0].entries = next,
        }
        if let Some(n) = next {
            self.entries[n.0].prev = prev;
        }
        trace!("[ENTRY] unlinked {} from {}", entry, node);
        self.entries
            .free(entry.0)
            .ok_or(Error::InvalidState("entry slot already vacant"))
    }

    /// Priorities of a node's entries in list order (diagnostics and tests).
    pub fn entry_priorities(&self, node: NodeId) -> Vec<u32> {
        let mut out = Vec::new();
        let mut curr = self.nodes.get(node.0).and_then(|n| n.entries);
        while let Some(c) = curr {
            let e = &self.entries[c.0];
            out.push(e.priority);
            curr = e.next;
        }
        out
    }
}
