//! Data structures for the ternary trie

use crate::arena::Arena;
use crate::constants::{DEFAULT_ENTRY_CAPACITY, DEFAULT_NODE_CAPACITY, PAGE_SIZE};
use crate::handle_registry::EngineRegistry;
use crate::helpers::KeyBits;
use std::cell::Cell;
use std::fmt;

/// Slot index of a trie node inside its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub(crate) u32);

/// Slot index of a match entry inside its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntryId(pub(crate) u32);

/// Handle of one engine (one trie) inside a pool. Zero is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineId(pub(crate) u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

/// Branch direction taken at a node's `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Zero = 0,
    One = 1,
    DontCare = 2,
}

impl Branch {
    pub const ALL: [Branch; 3] = [Branch::Zero, Branch::One, Branch::DontCare];

    /// Direction a pattern takes at bit `index`: `DontCare` under a zero
    /// mask bit, otherwise the data bit.
    #[inline]
    pub fn of<K: KeyBits>(data: K, mask: K, index: u32) -> Branch {
        if !mask.bit(index) {
            Branch::DontCare
        } else if data.bit(index) {
            Branch::One
        } else {
            Branch::Zero
        }
    }

    /// Specific (non-wildcard) direction a lookup key takes at `index`.
    #[inline]
    pub fn of_key<K: KeyBits>(key: K, index: u32) -> Branch {
        if key.bit(index) {
            Branch::One
        } else {
            Branch::Zero
        }
    }
}

/// One ternary-prefix segment of the compressed trie.
///
/// `data`/`mask` are fixed at creation; only relocation by the reordering
/// subsystem moves a node to another slot. Every accessor in `node.rs`
/// bumps `access_counter`.
pub struct Node<K> {
    pub(crate) data: K,
    pub(crate) mask: K,
    pub(crate) position: u32, // committed leading bits; WIDTH = full node
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: [Option<NodeId>; 3], // indexed by Branch
    pub(crate) entries: Option<EntryId>,      // head, only on full nodes
    pub(crate) access_counter: Cell<u64>,
}

/// A prioritized payload attached to exactly one full node.
pub struct Entry<V> {
    pub(crate) priority: u32,
    pub(crate) value: V,
    pub(crate) node: Option<NodeId>,
    pub(crate) next: Option<EntryId>,
    pub(crate) prev: Option<EntryId>,
    pub(crate) access_counter: Cell<u64>,
}

/// Sizing and layout knobs for a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub node_capacity: usize,
    pub entry_capacity: usize,
    /// Bucket size in bytes used by `sort_worst`.
    pub page_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            node_capacity: DEFAULT_NODE_CAPACITY,
            entry_capacity: DEFAULT_ENTRY_CAPACITY,
            page_size: PAGE_SIZE,
        }
    }
}

/// Owner of every engine root, node and entry. Reordering operates on a
/// whole pool at once, so every engine sharing it is rewritten together.
pub struct TcamPool<K: KeyBits, V> {
    pub(crate) nodes: Arena<Node<K>>,
    pub(crate) entries: Arena<Entry<V>>,
    pub(crate) engines: EngineRegistry,
    pub(crate) config: PoolConfig,
}

/// Single-engine TCAM owning its own pool.
pub struct SoftTcam<K: KeyBits, V> {
    pub(crate) pool: TcamPool<K, V>,
    pub(crate) engine: EngineId,
}
