//! Software ternary content-addressable memory.
//!
//! Patterns are `(data, mask, priority, value)` tuples stored in a
//! path-compressed trie over the alphabet {0, 1, don't-care}. A lookup
//! returns the value of the highest-priority pattern matching the key.

pub mod arena;
pub mod constants;
pub mod errors;
pub mod handle_registry;
pub mod helpers;
pub mod loader;
pub mod node;
pub mod reorder;
pub mod telemetry;
pub mod types;

pub use errors::{Error, ErrorCode};
pub use helpers::KeyBits;
pub use types::{Branch, EngineId, Entry, EntryId, Node, NodeId, PoolConfig, SoftTcam, TcamPool};

use arena::Arena;
use constants::MAX_KEY_WIDTH;
use handle_registry::EngineRegistry;
use helpers::*;
use log::{debug, info, trace, warn};
use metrics::{counter, gauge};
use once_cell::sync::OnceCell;
use std::fmt::Write;

/// Deferred `ndc` branches of one lookup. Positions on the stack strictly
/// increase from bottom to top, so depth never exceeds the key width.
struct DeferredStack {
    frames: [(NodeId, u32); MAX_KEY_WIDTH],
    len: usize,
}

impl DeferredStack {
    #[inline]
    fn new() -> Self {
        Self {
            frames: [(NodeId(0), 0); MAX_KEY_WIDTH],
            len: 0,
        }
    }

    #[inline]
    fn push(&mut self, node: NodeId, prev: u32) {
        debug_assert!(self.len < MAX_KEY_WIDTH, "deferred stack deeper than key width");
        self.frames[self.len] = (node, prev);
        self.len += 1;
    }

    #[inline]
    fn pop(&mut self) -> Option<(NodeId, u32)> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.frames[self.len])
    }
}

impl<K: KeyBits, V> Default for TcamPool<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: KeyBits, V> TcamPool<K, V> {
    // ---- logging bootstraper -------------------------------------------------
    fn ensure_logging() {
        static INIT: OnceCell<()> = OnceCell::new();
        INIT.get_or_init(|| {
            // Fallback: simple env_logger with RFC‑3339 ts off.
            let _ = env_logger::builder()
                .format_timestamp(None)
                .is_test(std::env::var("RUST_TEST_THREADS").is_ok())
                .try_init();
        });
    }

    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_config(config: PoolConfig) -> Self {
        Self::ensure_logging();
        telemetry::init();
        debug!(
            "[POOL] new pool: width={}, node_capacity={}, entry_capacity={}, page_size={}",
            K::WIDTH,
            config.node_capacity,
            config.entry_capacity,
            config.page_size
        );
        Self {
            nodes: Arena::with_capacity(config.node_capacity),
            entries: Arena::with_capacity(config.entry_capacity),
            engines: EngineRegistry::new(),
            config,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Register a new, empty engine.
    pub fn create_engine(&mut self) -> EngineId {
        let id = self.engines.register();
        debug!("[POOL] created {}", id);
        id
    }

    /// Tear down an engine's whole trie and release its handle.
    pub fn destroy_engine(&mut self, engine: EngineId) -> Result<(), Error> {
        let root = self.engines.unregister(engine)?;
        if let Some(root) = root {
            self.destroy_subtree(root);
        }
        info!("[POOL] destroyed {}", engine);
        self.report_population();
        Ok(())
    }

    /// Drop every pattern of an engine, keeping the handle alive.
    pub fn clear(&mut self, engine: EngineId) -> Result<(), Error> {
        if let Some(root) = self.engines.root(engine)? {
            self.destroy_subtree(root);
            self.engines.set_root(engine, None)?;
        }
        info!("[CLEAR] {} cleared", engine);
        self.report_population();
        Ok(())
    }

    pub fn is_empty(&self, engine: EngineId) -> Result<bool, Error> {
        Ok(self.engines.root(engine)?.is_none())
    }

    pub fn root(&self, engine: EngineId) -> Result<Option<NodeId>, Error> {
        self.engines.root(engine)
    }

    /// Live trie nodes across every engine of the pool.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Live match entries across every engine of the pool.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    pub fn engines(&self) -> impl Iterator<Item = EngineId> + '_ {
        self.engines.ids()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<K>> {
        self.nodes.get(id.0)
    }

    pub fn entry(&self, id: EntryId) -> Option<&Entry<V>> {
        self.entries.get(id.0)
    }

    /// Emit population gauges.
    pub fn report_population(&self) {
        gauge!("softtcam_nodes_live").set(self.nodes.len() as f64);
        gauge!("softtcam_entries_live").set(self.entries.len() as f64);
    }

    fn alloc_node(&mut self, data: K, mask: K, position: u32) -> NodeId {
        NodeId(self.nodes.alloc(Node::new(data, mask, position)))
    }

    fn alloc_leaf(&mut self, data: K, mask: K, priority: u32, value: V) -> Result<NodeId, Error> {
        let node = self.alloc_node(data, mask, K::WIDTH);
        let entry = EntryId(self.entries.alloc(Entry::new(priority, value)));
        self.insert_entry(node, entry)?;
        Ok(node)
    }

    fn link(&mut self, parent: NodeId, branch: Branch, child: NodeId) {
        self.nodes[parent.0].set_child(branch, Some(child));
        self.nodes[child.0].set_parent(Some(parent));
    }

    /// Insert a pattern. Bits where `mask` is zero are wildcards and must
    /// carry zero in `data`.
    pub fn insert(
        &mut self,
        engine: EngineId,
        data: K,
        mask: K,
        priority: u32,
        value: V,
    ) -> Result<(), Error> {
        counter!("softtcam_inserts_total").increment(1);
        debug!(
            "[INSERT] {} data={:x} mask={:x} priority={}",
            engine, data, mask, priority
        );
        let root = self.engines.root(engine)?;
        if let Some(bit) = wildcard_violation(data, mask) {
            warn!("[INSERT] rejected: data bit {} set under wildcard", bit);
            counter!("softtcam_rejected_total").increment(1);
            return Err(Error::WildcardDataMismatch { bit });
        }

        // --- Case 1: Empty trie ---
        let Some(root) = root else {
            let leaf = self.alloc_leaf(data, mask, priority, value)?;
            self.engines.set_root(engine, Some(leaf))?;
            debug!("[INSERT] Case 1: {} becomes root", leaf);
            self.report_population();
            return Ok(());
        };

        let nearest = self.find_nearest_node(root, data, mask);

        // --- Case 2: Exact pattern already stored, add an entry ---
        if let Some(n) = nearest {
            if self.nodes[n.0].is_full() {
                let entry = EntryId(self.entries.alloc(Entry::new(priority, value)));
                self.insert_entry(n, entry)?;
                debug!("[INSERT] Case 2: {} joins {}", entry, n);
                self.report_population();
                return Ok(());
            }
        }

        let leaf = self.alloc_leaf(data, mask, priority, value)?;
        match nearest {
            // --- Case 3: Diverged inside the root's own segment ---
            None => self.insert_between(engine, None, root, leaf)?,
            Some(n) => {
                let branch = Branch::of(data, mask, self.nodes[n.0].position());
                match self.nodes[n.0].child(branch) {
                    // --- Case 4: Free branch slot, attach directly ---
                    None => {
                        self.link(n, branch, leaf);
                        debug!("[INSERT] Case 4: {} attached under {} ({:?})", leaf, n, branch);
                    }
                    // --- Case 5: Diverged inside a child's segment, split ---
                    Some(existing) => self.insert_between(engine, Some(n), existing, leaf)?,
                }
            }
        }
        self.report_population();
        Ok(())
    }

    /// Synthesize an intermediate node holding the common prefix of `more`
    /// and `node`, hang it where `more` was, and re-parent both under it.
    fn insert_between(
        &mut self,
        engine: EngineId,
        less: Option<NodeId>,
        more: NodeId,
        node: NodeId,
    ) -> Result<(), Error> {
        let (more_data, more_mask) = (self.nodes[more.0].data(), self.nodes[more.0].mask());
        let (node_data, node_mask) = (self.nodes[node.0].data(), self.nodes[node.0].mask());
        let position = common_prefix_len(more_data, more_mask, node_data, node_mask);
        if position >= K::WIDTH {
            return Err(Error::InvalidState("split of identical patterns"));
        }
        let keep = K::prefix_mask(position);
        let split = self.alloc_node(node_data & keep, node_mask & keep, position);
        debug!(
            "[INSERT] Split: {} at position {} between {:?} and {}",
            split, position, less, more
        );

        match less {
            None => self.engines.set_root(engine, Some(split))?,
            Some(less) => {
                let branch = Branch::of(node_data, node_mask, self.nodes[less.0].position());
                self.link(less, branch, split);
            }
        }
        self.link(split, Branch::of(more_data, more_mask, position), more);
        self.link(split, Branch::of(node_data, node_mask, position), node);
        Ok(())
    }

    /// Remove the entry `(priority, value)` stored under pattern `(data, mask)`.
    pub fn erase(
        &mut self,
        engine: EngineId,
        data: K,
        mask: K,
        priority: u32,
        value: &V,
    ) -> Result<(), Error>
    where
        V: PartialEq,
    {
        counter!("softtcam_erases_total").increment(1);
        debug!(
            "[ERASE] {} data={:x} mask={:x} priority={}",
            engine, data, mask, priority
        );
        let root = self.engines.root(engine)?;
        let node = root
            .and_then(|r| self.find_nearest_node(r, data, mask))
            .filter(|n| self.nodes[n.0].is_full())
            .ok_or(Error::NotFound)?;

        let mut target = None;
        let mut curr = self.nodes[node.0].entry_head();
        while let Some(c) = curr {
            let e = &self.entries[c.0];
            if e.priority() == priority && e.value() == value {
                target = Some(c);
                break;
            }
            curr = e.next();
        }
        let Some(target) = target else {
            debug!("[ERASE] no entry with priority {} under {}", priority, node);
            return Err(Error::NotFound);
        };

        self.erase_entry(node, target)?;
        if self.nodes[node.0].entry_head().is_none() {
            self.erase_node(engine, node)?;
        }
        self.report_population();
        Ok(())
    }

    /// Destroy an entry-less leaf and prune upwards: childless ancestors
    /// go too, and an ancestor left with a single child is spliced out.
    fn erase_node(&mut self, engine: EngineId, node: NodeId) -> Result<(), Error> {
        let mut cursor = node;
        loop {
            let n = &self.nodes[cursor.0];
            if n.child_count() > 0 || n.entry_head().is_some() {
                return Err(Error::InvalidState("erase of a node still in use"));
            }
            let parent = n.parent();
            self.nodes.free(cursor.0);
            trace!("[ERASE] freed {}", cursor);

            let Some(parent) = parent else {
                self.engines.set_root(engine, None)?;
                debug!("[ERASE] trie of {} is now empty", engine);
                return Ok(());
            };
            let p = &mut self.nodes[parent.0];
            if let Some(branch) = p.branch_of(cursor) {
                p.set_child(branch, None);
            }
            if p.entries.is_some() {
                return Ok(());
            }
            match p.child_count() {
                0 => cursor = parent,
                1 => return self.splice_out(engine, parent),
                _ => return Ok(()),
            }
        }
    }

    /// Replace a unary, entry-less node by its only child.
    fn splice_out(&mut self, engine: EngineId, node: NodeId) -> Result<(), Error> {
        let n = &self.nodes[node.0];
        let Some(child) = n.children.iter().flatten().copied().next() else {
            return Err(Error::InvalidState("splice of a childless node"));
        };
        let grandparent = n.parent();
        self.nodes[child.0].set_parent(grandparent);
        match grandparent {
            None => self.engines.set_root(engine, Some(child))?,
            Some(g) => {
                let g = &mut self.nodes[g.0];
                let branch = g
                    .branch_of(node)
                    .ok_or(Error::InvalidState("parent does not link back to node"))?;
                g.set_child(branch, Some(child));
            }
        }
        self.nodes.free(node.0);
        trace!("[ERASE] spliced {} out, {} moves up", node, child);
        Ok(())
    }

    /// Nearest node compatible with `(data, mask)`:
    /// * the full node storing exactly this pattern, or
    /// * the deepest consistent node whose branch slot for the pattern is free, or
    /// * the parent of the node whose segment diverges from the pattern
    ///   (`None` when the divergence is inside the root's segment).
    fn find_nearest_node(&self, root: NodeId, data: K, mask: K) -> Option<NodeId> {
        let mut cursor = root;
        let mut prev = 0;
        loop {
            let node = &self.nodes[cursor.0];
            let position = node.position();
            if !pattern_matches_span(node.data(), node.mask(), data, mask, prev, position) {
                trace!("[WALK] diverged inside {}", cursor);
                return node.parent();
            }
            if position == K::WIDTH {
                return Some(cursor);
            }
            match node.child(Branch::of(data, mask, position)) {
                Some(next) => {
                    prev = position;
                    cursor = next;
                }
                None => return Some(cursor),
            }
        }
    }

    /// Value of the highest-priority pattern matching `key`.
    pub fn find(&self, engine: EngineId, key: K) -> Result<Option<&V>, Error> {
        let root = self.engines.root(engine)?;
        let found = root.and_then(|r| self.find_entry(r, key));
        trace!("[FIND] {} key={:x} -> {:?}", engine, key, found);
        Ok(found.map(|e| self.entries[e.0].value()))
    }

    /// Backtracking search: descend the key-selected child, deferring any
    /// `ndc` sibling; a mismatching segment only abandons the current path.
    fn find_entry(&self, root: NodeId, key: K) -> Option<EntryId> {
        let mut best: Option<(EntryId, u32)> = None;
        let mut stack = DeferredStack::new();
        let mut pending = Some((root, 0));

        loop {
            let Some((mut id, mut prev)) = pending.take().or_else(|| stack.pop()) else {
                break;
            };
            loop {
                let node = &self.nodes[id.0];
                let position = node.position();
                if !key_matches_span(key, node.data(), node.mask(), prev, position) {
                    break;
                }
                if position == K::WIDTH {
                    if let Some(head) = node.entry_head() {
                        let priority = self.entries[head.0].priority();
                        if best.map_or(true, |(_, p)| priority > p) {
                            best = Some((head, priority));
                        }
                    }
                    break;
                }
                let specific = node.child(Branch::of_key(key, position));
                let step = match (specific, node.ndc()) {
                    (Some(s), Some(w)) => {
                        stack.push(w, position);
                        s
                    }
                    (Some(s), None) => s,
                    (None, Some(w)) => w,
                    (None, None) => break,
                };
                prev = position;
                id = step;
            }
        }
        best.map(|(e, _)| e)
    }

    /// Depth-first structural trace of one engine's trie.
    pub fn dump(&self, engine: EngineId) -> Result<String, Error> {
        let root = self.engines.root(engine)?;
        let mut out = String::new();
        let _ = writeln!(out, "{} nodes={} entries={}", engine, self.nodes.len(), self.entries.len());
        let mut stack: Vec<(NodeId, usize)> = root.map(|r| (r, 0)).into_iter().collect();
        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id.0];
            let position = node.position();
            let link = |n: Option<NodeId>| n.map_or_else(|| "-".to_string(), |n| n.to_string());
            let _ = write!(
                out,
                "{:indent$}{} pos={:<3} {} parent={} n0={} n1={} ndc={}",
                "",
                id,
                position,
                to_ternary_string(node.data(), node.mask()),
                link(node.parent()),
                link(node.n0()),
                link(node.n1()),
                link(node.ndc()),
                indent = depth * 2
            );
            let mut curr = node.entry_head();
            while let Some(c) = curr {
                let e = &self.entries[c.0];
                let _ = write!(out, " [{} prio={}]", c, e.priority());
                curr = e.next();
            }
            out.push('\n');
            // pushed in reverse so n0 is printed first
            for branch in [Branch::DontCare, Branch::One, Branch::Zero] {
                if let Some(child) = node.child(branch) {
                    stack.push((child, depth + 1));
                }
            }
        }
        Ok(out)
    }

    /// Post-order release of a subtree and every entry hanging off it.
    fn destroy_subtree(&mut self, root: NodeId) {
        let mut preorder = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            preorder.push(id);
            stack.extend(self.nodes[id.0].children.iter().flatten().copied());
        }
        // reverse preorder visits every child before its parent
        for id in preorder.into_iter().rev() {
            if let Some(node) = self.nodes.free(id.0) {
                let mut curr = node.entries;
                while let Some(c) = curr {
                    curr = self.entries.free(c.0).and_then(|e| e.next);
                }
            }
        }
    }
}

impl<K: KeyBits, V> Default for SoftTcam<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: KeyBits, V> SoftTcam<K, V> {
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_config(config: PoolConfig) -> Self {
        let mut pool = TcamPool::with_config(config);
        let engine = pool.create_engine();
        Self { pool, engine }
    }

    pub fn insert(&mut self, data: K, mask: K, priority: u32, value: V) -> Result<(), Error> {
        self.pool.insert(self.engine, data, mask, priority, value)
    }

    pub fn erase(&mut self, data: K, mask: K, priority: u32, value: &V) -> Result<(), Error>
    where
        V: PartialEq,
    {
        self.pool.erase(self.engine, data, mask, priority, value)
    }

    pub fn find(&self, key: K) -> Option<&V> {
        self.pool.find(self.engine, key).ok().flatten()
    }

    pub fn dump(&self) -> String {
        self.pool.dump(self.engine).unwrap_or_default()
    }

    pub fn clear(&mut self) -> Result<(), Error> {
        self.pool.clear(self.engine)
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty(self.engine).unwrap_or(true)
    }

    pub fn node_count(&self) -> usize {
        self.pool.node_count()
    }

    pub fn entry_count(&self) -> usize {
        self.pool.entry_count()
    }

    pub fn sort_best(&mut self) {
        self.pool.sort_best();
    }

    pub fn sort_worst(&mut self) {
        self.pool.sort_worst();
    }

    pub fn clear_access_counters(&self) {
        self.pool.clear_access_counters();
    }

    pub fn dump_access_counters(&self) -> String {
        self.pool.dump_access_counters()
    }

    pub fn engine(&self) -> EngineId {
        self.engine
    }

    pub fn pool(&self) -> &TcamPool<K, V> {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut TcamPool<K, V> {
        &mut self.pool
    }
}
