use crate::errors::Error;
use crate::types::{EngineId, NodeId};
use std::collections::HashMap;

/// Live engines of one pool and the root each one owns.
pub struct EngineRegistry {
    roots: HashMap<EngineId, Option<NodeId>>,
    next_id: u64,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            roots: HashMap::new(),
            next_id: 1, // Start from 1, reserve 0 for null/invalid
        }
    }

    /// Register a new, empty engine and return its handle
    pub fn register(&mut self) -> EngineId {
        let id = EngineId(self.next_id);
        self.next_id += 1;
        self.roots.insert(id, None);
        id
    }

    /// Current root of an engine (`None` when its trie is empty)
    pub fn root(&self, id: EngineId) -> Result<Option<NodeId>, Error> {
        if id.0 == 0 {
            return Err(Error::InvalidHandle);
        }
        self.roots.get(&id).copied().ok_or(Error::InvalidHandle)
    }

    pub fn set_root(&mut self, id: EngineId, root: Option<NodeId>) -> Result<(), Error> {
        match self.roots.get_mut(&id) {
            Some(slot) => {
                *slot = root;
                Ok(())
            }
            None => Err(Error::InvalidHandle),
        }
    }

    /// Remove an engine, handing back its root for teardown
    pub fn unregister(&mut self, id: EngineId) -> Result<Option<NodeId>, Error> {
        if id.0 == 0 {
            return Err(Error::InvalidHandle);
        }
        self.roots.remove(&id).ok_or(Error::InvalidHandle)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Rewrite every engine's root, e.g. after nodes were relocated
    pub fn remap_roots<F>(&mut self, mut f: F)
    where
        F: FnMut(NodeId) -> NodeId,
    {
        for root in self.roots.values_mut().flatten() {
            *root = f(*root);
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = EngineId> + '_ {
        self.roots.keys().copied()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
