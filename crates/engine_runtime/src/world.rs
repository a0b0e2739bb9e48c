//! World state storage.
//!
//! The [`World`] owns the entity allocator and one type-erased store per
//! component category. It is the only mutable root: operations never see it
//! directly and reach its data through [`Views`](crate::Views) instead.

use std::collections::HashMap;

use engine_component::{
    Component, ComponentStore, ComponentTypeId, EcsError, Entity, EntityAllocator, ErasedStore,
    Query,
};

use crate::commands::EntityBuilder;
use crate::query::match_entities;

pub(crate) type StoreMap = HashMap<ComponentTypeId, Box<dyn ErasedStore>>;

/// Entities and their component stores.
#[derive(Default)]
pub struct World {
    /// Entity slot allocator.
    entities: EntityAllocator,
    /// One store per category, created on first use.
    stores: StoreMap,
}

impl World {
    /// Create a new empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new entity with no components.
    pub fn spawn(&mut self) -> Entity {
        self.entities.allocate()
    }

    /// Allocate a new entity and attach every component in `builder`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CategoryMismatch`] if a component's category is
    /// already stored as a different Rust type. Components attached before
    /// the failing one stay attached.
    pub fn spawn_with(&mut self, builder: EntityBuilder) -> Result<Entity, EcsError> {
        let entity = self.spawn();
        builder.apply(self, entity)?;
        Ok(entity)
    }

    /// Destroy an entity and purge its values from every store.
    ///
    /// Returns `false` if the handle is stale or already despawned.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.entities.despawn(entity) {
            return false;
        }
        self.despawn_cleanup(entity);
        true
    }

    /// Free the entity's slot without touching the stores.
    ///
    /// Deferred despawns run [`World::despawn_cleanup`] once the whole command
    /// batch is applied.
    pub(crate) fn release(&mut self, entity: Entity) -> bool {
        self.entities.despawn(entity)
    }

    /// Remove the entity's values from every store.
    ///
    /// Only values owned by this exact handle are removed, so a slot that was
    /// already reused keeps its new occupant's data. Returns the number of
    /// values removed.
    pub fn despawn_cleanup(&mut self, entity: Entity) -> usize {
        self.stores
            .values_mut()
            .map(|store| store.remove_entity(entity))
            .filter(|&removed| removed)
            .count()
    }

    /// Returns `true` if the handle refers to a live entity.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Create the store for `T` ahead of time.
    ///
    /// Stores are otherwise created on first insert. Registering up front
    /// lets operations that write `T` receive a view before any value exists.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CategoryMismatch`] if the category is already
    /// stored as a different Rust type.
    pub fn register_component<T: Component>(&mut self) -> Result<(), EcsError> {
        self.store_entry::<T>().map(|_| ())
    }

    fn store_entry<T: Component>(&mut self) -> Result<&mut ComponentStore<T>, EcsError> {
        self.stores
            .entry(T::component_type_id())
            .or_insert_with(|| -> Box<dyn ErasedStore> { Box::new(ComponentStore::<T>::new()) })
            .downcast_mut::<T>()
            .ok_or_else(mismatch::<T>)
    }

    /// Attach `value` to `entity`, returning the value it replaces.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if the entity is not alive, or
    /// [`EcsError::CategoryMismatch`] if the category is stored as another type.
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> Result<Option<T>, EcsError> {
        if !self.entities.is_alive(entity) {
            return Err(EcsError::StaleEntity(entity));
        }
        Ok(self.store_entry::<T>()?.insert(entity, value))
    }

    /// Detach and return the entity's `T`, if it has one.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.store_mut::<T>()?.remove(entity)
    }

    /// Returns the entity's `T`, or `None` if absent or the handle is stale.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.store::<T>()?.get(entity)
    }

    /// Returns the entity's `T` mutably, or `None` if absent or stale.
    #[must_use]
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.store_mut::<T>()?.get_mut(entity)
    }

    /// Returns `true` if the entity currently has a `T`.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.get::<T>(entity).is_some()
    }

    /// Returns the store for `T`, if one exists.
    #[must_use]
    pub fn store<T: Component>(&self) -> Option<&ComponentStore<T>> {
        self.stores.get(&T::component_type_id())?.downcast_ref::<T>()
    }

    fn store_mut<T: Component>(&mut self) -> Option<&mut ComponentStore<T>> {
        self.stores
            .get_mut(&T::component_type_id())?
            .downcast_mut::<T>()
    }

    /// Live entities matching `query`, in ascending slot order.
    #[must_use]
    pub fn query(&self, query: &Query) -> Vec<Entity> {
        match_entities(&self.entities, query, |ty| {
            self.stores.get(&ty).map(|store| &**store)
        })
    }

    /// Live entities having every `required` category and no `excluded` one,
    /// in ascending slot order.
    #[must_use]
    pub fn match_entities(
        &self,
        required: &[ComponentTypeId],
        excluded: &[ComponentTypeId],
    ) -> Vec<Entity> {
        let query = Query {
            required: required.iter().copied().collect(),
            excluded: excluded.iter().copied().collect(),
        };
        self.query(&query)
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns the number of categories with a store.
    #[must_use]
    pub fn category_count(&self) -> usize {
        self.stores.len()
    }

    /// Returns the registered name of a category.
    #[must_use]
    pub fn category_name(&self, category: ComponentTypeId) -> Option<&'static str> {
        self.stores.get(&category).map(|store| store.name())
    }

    /// Move a category's store out of the world for the duration of a stage.
    pub(crate) fn take_store(&mut self, category: ComponentTypeId) -> Option<Box<dyn ErasedStore>> {
        self.stores.remove(&category)
    }

    /// Return a store previously moved out with [`World::take_store`].
    pub(crate) fn restore_store(&mut self, store: Box<dyn ErasedStore>) {
        self.stores.insert(store.category(), store);
    }

    pub(crate) fn parts(&self) -> (&EntityAllocator, &StoreMap) {
        (&self.entities, &self.stores)
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.stores.values().map(|store| store.name()).collect();
        names.sort_unstable();
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("categories", &names)
            .finish()
    }
}

pub(crate) fn mismatch<T: Component>() -> EcsError {
    EcsError::CategoryMismatch {
        category: T::component_type_id(),
        expected: std::any::type_name::<T>(),
    }
}
