//! Per-module storage of IR nodes addressed by stable ids.
//!
//! Slots are never reused or removed: a pass that deletes a signal or a block
//! only drops the id from its owner's list, so every id handed out stays valid
//! for the lifetime of the module.

use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Trait for opaque ID types used as arena keys.
pub trait ArenaId: Copy {
    /// Creates an ID from a raw `u32` index.
    fn from_raw(index: u32) -> Self;

    /// Returns the raw `u32` index.
    fn as_raw(self) -> u32;
}

/// Append-only storage of IR nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arena<I: ArenaId, T> {
    items: Vec<T>,
    #[serde(skip)]
    _marker: PhantomData<I>,
}

impl<I: ArenaId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ArenaId, T> Arena<I, T> {
    /// Creates a new, empty arena.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Returns the id the next [`alloc`](Self::alloc) will hand out.
    ///
    /// Nodes that store their own id are built with it before insertion.
    pub fn next_id(&self) -> I {
        I::from_raw(self.items.len() as u32)
    }

    /// Stores a node and returns its id.
    pub fn alloc(&mut self, item: T) -> I {
        let id = self.next_id();
        self.items.push(item);
        id
    }

    /// Stores a node built from its own id.
    pub fn alloc_with(&mut self, build: impl FnOnce(I) -> T) -> I {
        let id = self.next_id();
        self.items.push(build(id));
        id
    }

    /// Returns a reference to the node with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID was not handed out by this arena.
    pub fn get(&self, id: I) -> &T {
        &self.items[id.as_raw() as usize]
    }

    /// Returns a mutable reference to the node with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID was not handed out by this arena.
    pub fn get_mut(&mut self, id: I) -> &mut T {
        &mut self.items[id.as_raw() as usize]
    }

    /// Returns the number of allocated slots, live or not.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing was ever allocated.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over `(ID, &T)` pairs in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (I::from_raw(i as u32), item))
    }

    /// Iterates over `(ID, &mut T)` pairs in allocation order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (I, &mut T)> {
        self.items
            .iter_mut()
            .enumerate()
            .map(|(i, item)| (I::from_raw(i as u32), item))
    }

    /// Iterates over all ids in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = I> {
        (0..self.items.len() as u32).map(I::from_raw)
    }
}

impl<I: ArenaId, T> Index<I> for Arena<I, T> {
    type Output = T;

    fn index(&self, id: I) -> &T {
        self.get(id)
    }
}

impl<I: ArenaId, T> IndexMut<I> for Arena<I, T> {
    fn index_mut(&mut self, id: I) -> &mut T {
        self.get_mut(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{BlockId, SignalId};

    #[test]
    fn next_id_predicts_alloc() {
        let mut arena: Arena<SignalId, &str> = Arena::new();
        let predicted = arena.next_id();
        let id = arena.alloc("clk");
        assert_eq!(predicted, id);
        assert_eq!(arena[id], "clk");
    }

    #[test]
    fn alloc_with_sees_own_id() {
        let mut arena: Arena<BlockId, (BlockId, u32)> = Arena::new();
        arena.alloc((BlockId::from_raw(9), 0));
        let id = arena.alloc_with(|id| (id, 1));
        assert_eq!(arena[id].0, id);
        assert_eq!(id.as_raw(), 1);
    }

    #[test]
    fn ids_stay_stable_after_edits() {
        let mut arena: Arena<SignalId, String> = Arena::new();
        let a = arena.alloc("a".to_string());
        let b = arena.alloc("b".to_string());
        arena[a] = "renamed".to_string();
        assert_eq!(arena[b], "b");
        assert_eq!(arena.ids().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn iter_mut_edits_in_place() {
        let mut arena: Arena<SignalId, u32> = Arena::new();
        arena.alloc(1);
        arena.alloc(2);
        for (_, v) in arena.iter_mut() {
            *v *= 10;
        }
        let values: Vec<u32> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![10, 20]);
    }

    #[test]
    fn serde_roundtrip_keeps_ids() {
        let mut arena: Arena<SignalId, String> = Arena::new();
        arena.alloc("x".to_string());
        let y = arena.alloc("y".to_string());
        let json = serde_json::to_string(&arena).unwrap();
        let restored: Arena<SignalId, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored[y], "y");
    }

    #[test]
    fn default_is_empty() {
        let arena: Arena<SignalId, u32> = Arena::default();
        assert!(arena.is_empty());
    }
}
