//! Reuse of decode trees across selective decodes.

use alloc::vec::Vec;
use core::cell::RefCell;

use super::Tree;

/// Bounds on what a [`DecodePool`] keeps around between decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of idle trees held by the pool.
    pub max_retained: usize,
    /// Node capacity (one per decoded sub-message) a returned tree may keep.
    pub max_nodes: usize,
    /// Field capacity a returned tree may keep.
    pub max_fields: usize,
    /// Bytes of copied payload capacity a returned tree may keep.
    pub max_arena_bytes: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_retained: 16,
            max_nodes: 64,
            max_fields: 256,
            max_arena_bytes: 64 * 1024,
        }
    }
}

/// A free list of decode trees for repeated selective decodes.
///
/// A [`DecodeResult`](super::DecodeResult) produced through
/// [`LazyDecoder::decode_in`](super::LazyDecoder::decode_in) borrows the pool
/// and hands its tree back when dropped or closed. A returned tree is fully
/// reset and trimmed to the [`PoolConfig`] bounds before it's kept, so nothing
/// from one decode is visible to the next and a single huge message can't pin
/// its memory forever.
///
/// The pool is single-threaded. Give each thread its own.
#[derive(Debug, Default)]
pub struct DecodePool {
    config: PoolConfig,
    free: RefCell<Vec<Tree>>,
}

impl DecodePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PoolConfig) -> Self {
        DecodePool {
            config,
            free: RefCell::new(Vec::with_capacity(config.max_retained)),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of idle trees waiting for reuse.
    pub fn retained(&self) -> usize {
        self.free.borrow().len()
    }

    /// Drop every idle tree.
    pub fn clear(&self) {
        self.free.borrow_mut().clear();
    }

    pub(crate) fn acquire(&self) -> Tree {
        let mut free = self.free.borrow_mut();
        let tree = free.pop().unwrap_or_default();
        crate::util::trace!(retained = free.len(), "acquired decode tree");
        tree
    }

    pub(crate) fn release(&self, mut tree: Tree) {
        tree.reset(&self.config);
        let mut free = self.free.borrow_mut();
        if free.len() < self.config.max_retained {
            free.push(tree);
        }
        crate::util::trace!(retained = free.len(), "released decode tree");
    }
}
