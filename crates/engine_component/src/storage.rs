//! Per-category component storage.
//!
//! Each category lives in its own [`ComponentStore`], a sparse set keyed by
//! entity slot. The dense side records the full [`Entity`] next to each value,
//! so a handle from an older generation never reads or overwrites the value of
//! the slot's current occupant.
//!
//! Stores are independent of each other and of the allocator. The world keeps
//! them behind the type-erased [`ErasedStore`] trait and downcasts at the
//! point where a typed view is constructed.

use std::any::Any;

use crate::component::{Component, ComponentTypeId};
use crate::entity::Entity;

const EMPTY: u32 = u32::MAX;

/// Sparse-set storage for a single component category.
#[derive(Debug)]
pub struct ComponentStore<T> {
    /// Slot index → position in the dense arrays, or [`EMPTY`].
    sparse: Vec<u32>,
    /// Owning entity of each dense value.
    entities: Vec<Entity>,
    values: Vec<T>,
}

impl<T> Default for ComponentStore<T> {
    fn default() -> Self {
        Self {
            sparse: Vec::new(),
            entities: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<T: Component> ComponentStore<T> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn dense_index(&self, entity: Entity) -> Option<usize> {
        let dense = *self.sparse.get(entity.index() as usize)?;
        if dense == EMPTY {
            return None;
        }
        let dense = dense as usize;
        (self.entities[dense] == entity).then_some(dense)
    }

    /// Attaches `value` to `entity`, returning the value it replaces.
    ///
    /// A value left behind by an older generation of the same slot is
    /// replaced and not returned.
    pub fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        let slot = entity.index() as usize;
        if slot >= self.sparse.len() {
            self.sparse.resize(slot + 1, EMPTY);
        }

        let dense = self.sparse[slot];
        if dense == EMPTY {
            self.sparse[slot] = self.values.len() as u32;
            self.entities.push(entity);
            self.values.push(value);
            return None;
        }

        let dense = dense as usize;
        let previous_owner = std::mem::replace(&mut self.entities[dense], entity);
        let previous = std::mem::replace(&mut self.values[dense], value);
        (previous_owner == entity).then_some(previous)
    }

    /// Detaches and returns the entity's value, if it has one.
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let dense = self.dense_index(entity)?;
        self.sparse[entity.index() as usize] = EMPTY;

        let last = self.values.len() - 1;
        if dense != last {
            let moved = self.entities[last];
            self.sparse[moved.index() as usize] = dense as u32;
        }
        self.entities.swap_remove(dense);
        Some(self.values.swap_remove(dense))
    }

    /// Returns the entity's value, or `None` if absent or the handle is stale.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.dense_index(entity).map(|dense| &self.values[dense])
    }

    /// Returns the entity's value mutably, or `None` if absent or the handle
    /// is stale.
    #[must_use]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.dense_index(entity).map(|dense| &mut self.values[dense])
    }

    /// Returns `true` if the entity currently has a value in this store.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.dense_index(entity).is_some()
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the store holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(entity, value)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.entities.iter().copied().zip(self.values.iter())
    }

    /// Iterates over `(entity, value)` pairs mutably, in dense order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> + '_ {
        self.entities.iter().copied().zip(self.values.iter_mut())
    }
}

/// Type-erased interface to a [`ComponentStore`].
pub trait ErasedStore: Any + Send + Sync {
    /// The category this store holds.
    fn category(&self) -> ComponentTypeId;

    /// The category's human-readable name.
    fn name(&self) -> &'static str;

    /// Returns `true` if the entity has a value in this store.
    fn contains(&self, entity: Entity) -> bool;

    /// Drops the entity's value, returning `true` if one was present.
    fn remove_entity(&mut self, entity: Entity) -> bool;

    /// Returns the number of stored values.
    fn len(&self) -> usize;

    /// Returns `true` if the store holds no values.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upcast for downcasting to the concrete store.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete store.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStore for ComponentStore<T> {
    fn category(&self) -> ComponentTypeId {
        T::component_type_id()
    }

    fn name(&self) -> &'static str {
        T::type_name()
    }

    fn contains(&self, entity: Entity) -> bool {
        ComponentStore::contains(self, entity)
    }

    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_some()
    }

    fn len(&self) -> usize {
        ComponentStore::len(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn ErasedStore {
    /// Downcasts to the concrete store for `T`.
    #[must_use]
    pub fn downcast_ref<T: Component>(&self) -> Option<&ComponentStore<T>> {
        self.as_any().downcast_ref()
    }

    /// Mutably downcasts to the concrete store for `T`.
    #[must_use]
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut ComponentStore<T>> {
        self.as_any_mut().downcast_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityAllocator;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position(f32);

    impl Component for Position {
        fn type_name() -> &'static str {
            "Position"
        }
    }

    #[test]
    fn test_insert_then_get() {
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate();
        let mut store = ComponentStore::new();
        assert_eq!(store.insert(e, Position(1.0)), None);
        assert_eq!(store.get(e), Some(&Position(1.0)));
    }

    #[test]
    fn test_insert_overwrites() {
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate();
        let mut store = ComponentStore::new();
        store.insert(e, Position(1.0));
        assert_eq!(store.insert(e, Position(2.0)), Some(Position(1.0)));
        assert_eq!(store.get(e), Some(&Position(2.0)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_then_get() {
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate();
        let mut store = ComponentStore::new();
        store.insert(e, Position(1.0));
        assert_eq!(store.remove(e), Some(Position(1.0)));
        assert_eq!(store.get(e), None);
        assert_eq!(store.remove(e), None);
    }

    #[test]
    fn test_swap_remove_keeps_other_values_reachable() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        let c = alloc.allocate();
        let mut store = ComponentStore::new();
        store.insert(a, Position(1.0));
        store.insert(b, Position(2.0));
        store.insert(c, Position(3.0));

        store.remove(a);
        assert_eq!(store.get(b), Some(&Position(2.0)));
        assert_eq!(store.get(c), Some(&Position(3.0)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_stale_handle_misses_new_occupant() {
        let mut alloc = EntityAllocator::new();
        let old = alloc.allocate();
        let mut store = ComponentStore::new();
        store.insert(old, Position(1.0));
        store.remove(old);
        alloc.despawn(old);

        let new = alloc.allocate();
        store.insert(new, Position(5.0));
        assert_eq!(store.get(old), None);
        assert!(store.get_mut(old).is_none());
        assert_eq!(store.remove(old), None);
        assert_eq!(store.get(new), Some(&Position(5.0)));
    }

    #[test]
    fn test_insert_over_leftover_generation_reports_no_previous() {
        let mut alloc = EntityAllocator::new();
        let old = alloc.allocate();
        let mut store = ComponentStore::new();
        store.insert(old, Position(1.0));
        alloc.despawn(old);

        let new = alloc.allocate();
        assert_eq!(store.insert(new, Position(2.0)), None);
        assert_eq!(store.get(new), Some(&Position(2.0)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_erased_downcast() {
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate();
        let mut erased: Box<dyn ErasedStore> = Box::new(ComponentStore::<Position>::new());
        assert_eq!(erased.category(), Position::component_type_id());
        assert_eq!(erased.name(), "Position");

        erased
            .downcast_mut::<Position>()
            .unwrap()
            .insert(e, Position(4.0));
        assert!(erased.contains(e));
        assert!(erased.remove_entity(e));
        assert!(erased.is_empty());
    }

    #[test]
    fn test_iter_mut_updates_values() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        let mut store = ComponentStore::new();
        store.insert(a, Position(1.0));
        store.insert(b, Position(2.0));
        for (_, p) in store.iter_mut() {
            p.0 *= 10.0;
        }
        let values: Vec<_> = store.iter().map(|(e, p)| (e, p.0)).collect();
        assert_eq!(values, vec![(a, 10.0), (b, 20.0)]);
    }
}
