//! Access-scoped views handed to operations.
//!
//! A [`Views`] is the only way a transform reaches world data. It is built
//! from the operation's [`AccessDeclaration`]: categories the operation writes
//! are moved into the views for the duration of the stage, everything else is
//! shared read-only with the rest of the stage. Asking for a category outside
//! the declaration fails with [`EcsError::UndeclaredAccess`].

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;

use engine_component::{
    AccessDeclaration, Component, ComponentStore, ComponentTypeId, EcsError, Entity,
    EntityAllocator, ErasedStore, Query,
};

use crate::commands::{Command, Commands};
use crate::query::match_entities;
use crate::world::{StoreMap, mismatch};

/// The data one operation may touch during one stage.
pub struct Views<'w> {
    operation: &'w str,
    access: &'w AccessDeclaration,
    tick: u64,
    entities: &'w EntityAllocator,
    /// Stores nobody in the stage writes.
    shared: &'w StoreMap,
    /// Stores this operation writes, held exclusively for the stage.
    owned: HashMap<ComponentTypeId, RefCell<Box<dyn ErasedStore>>>,
    commands: Commands,
}

impl<'w> Views<'w> {
    pub(crate) fn new(
        operation: &'w str,
        access: &'w AccessDeclaration,
        tick: u64,
        entities: &'w EntityAllocator,
        shared: &'w StoreMap,
        owned: StoreMap,
    ) -> Self {
        Self {
            operation,
            access,
            tick,
            entities,
            shared,
            owned: owned
                .into_iter()
                .map(|(ty, store)| (ty, RefCell::new(store)))
                .collect(),
            commands: Commands::default(),
        }
    }

    /// The id of the operation these views belong to.
    #[must_use]
    pub fn operation(&self) -> &str {
        self.operation
    }

    /// The tick currently executing.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Returns `true` if the handle refers to a live entity.
    ///
    /// Entities despawned earlier in the current stage are still alive.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    fn undeclared(&self, category: ComponentTypeId) -> EcsError {
        EcsError::UndeclaredAccess {
            operation: self.operation.to_string(),
            category,
        }
    }

    /// Shared view of `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UndeclaredAccess`] unless `T` is declared as read or write;
    /// [`EcsError::AccessInUse`] if a write view of `T` is currently held.
    pub fn read<T: Component>(&self) -> Result<Read<'_, T>, EcsError> {
        let category = T::component_type_id();
        if !self.access.can_read(category) {
            return Err(self.undeclared(category));
        }

        if let Some(cell) = self.owned.get(&category) {
            let guard = cell
                .try_borrow()
                .map_err(|_| EcsError::AccessInUse { category })?;
            let store = Ref::filter_map(guard, |store| store.downcast_ref::<T>())
                .map_err(|_| mismatch::<T>())?;
            return Ok(Read {
                source: ReadSource::Owned(store),
            });
        }

        let source = match self.shared.get(&category) {
            Some(store) => {
                ReadSource::Shared(store.downcast_ref::<T>().ok_or_else(mismatch::<T>)?)
            }
            None => ReadSource::Empty,
        };
        Ok(Read { source })
    }

    /// Exclusive view of `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UndeclaredAccess`] unless `T` is declared as a write;
    /// [`EcsError::AccessInUse`] if a view of `T` is already held.
    pub fn write<T: Component>(&self) -> Result<Write<'_, T>, EcsError> {
        let category = T::component_type_id();
        if !self.access.can_write(category) {
            return Err(self.undeclared(category));
        }

        let Some(cell) = self.owned.get(&category) else {
            return Ok(Write { store: None });
        };
        let guard = cell
            .try_borrow_mut()
            .map_err(|_| EcsError::AccessInUse { category })?;
        let store = RefMut::filter_map(guard, |store| store.downcast_mut::<T>())
            .map_err(|_| mismatch::<T>())?;
        Ok(Write { store: Some(store) })
    }

    /// Live entities matching `query`, in ascending slot order.
    ///
    /// # Errors
    ///
    /// [`EcsError::UndeclaredAccess`] if the query names a category outside
    /// the declaration; [`EcsError::AccessInUse`] if it names a category
    /// whose write view is currently held.
    pub fn query(&self, query: &Query) -> Result<Vec<Entity>, EcsError> {
        if let Some(category) = query.categories().find(|&ty| !self.access.can_read(ty)) {
            return Err(self.undeclared(category));
        }

        let mut borrowed = Vec::new();
        for category in query.categories() {
            if let Some(cell) = self.owned.get(&category) {
                let guard = cell
                    .try_borrow()
                    .map_err(|_| EcsError::AccessInUse { category })?;
                borrowed.push((category, guard));
            }
        }

        Ok(match_entities(self.entities, query, |ty| {
            match borrowed.iter().find(|(category, _)| *category == ty) {
                Some((_, guard)) => Some(&***guard),
                None => self.shared.get(&ty).map(|store| &**store),
            }
        }))
    }

    /// Queue for structural changes applied after the stage.
    #[must_use]
    pub fn commands(&self) -> &Commands {
        &self.commands
    }

    pub(crate) fn into_parts(self) -> (StoreMap, Vec<Command>) {
        let stores = self
            .owned
            .into_iter()
            .map(|(ty, cell)| (ty, cell.into_inner()))
            .collect();
        (stores, self.commands.into_inner())
    }
}

impl std::fmt::Debug for Views<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Views")
            .field("operation", &self.operation)
            .field("tick", &self.tick)
            .field("access", self.access)
            .finish_non_exhaustive()
    }
}

enum ReadSource<'v, T> {
    Shared(&'v ComponentStore<T>),
    Owned(Ref<'v, ComponentStore<T>>),
    Empty,
}

/// Shared access to one category.
pub struct Read<'v, T> {
    source: ReadSource<'v, T>,
}

impl<T: Component> Read<'_, T> {
    fn store(&self) -> Option<&ComponentStore<T>> {
        match &self.source {
            ReadSource::Shared(store) => Some(*store),
            ReadSource::Owned(store) => Some(&**store),
            ReadSource::Empty => None,
        }
    }

    /// Returns the entity's value, or `None` if absent or stale.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.store()?.get(entity)
    }

    /// Returns `true` if the entity has a value.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.get(entity).is_some()
    }

    /// Iterates over `(entity, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.store().into_iter().flat_map(|store| store.iter())
    }

    /// Returns the number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store().map_or(0, |store| store.len())
    }

    /// Returns `true` if there are no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one category.
///
/// Values can be changed in place. Attaching a value to an entity that lacks
/// one is structural and goes through [`Commands::insert`].
pub struct Write<'v, T> {
    store: Option<RefMut<'v, ComponentStore<T>>>,
}

impl<T: Component> Write<'_, T> {
    /// Returns the entity's value, or `None` if absent or stale.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.store.as_ref()?.get(entity)
    }

    /// Returns the entity's value mutably, or `None` if absent or stale.
    #[must_use]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.store.as_mut()?.get_mut(entity)
    }

    /// Returns `true` if the entity has a value.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.get(entity).is_some()
    }

    /// Iterates over `(entity, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.store.iter().flat_map(|store| store.iter())
    }

    /// Iterates over `(entity, value)` pairs mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> + '_ {
        self.store.iter_mut().flat_map(|store| store.iter_mut())
    }

    /// Returns the number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.as_ref().map_or(0, |store| store.len())
    }

    /// Returns `true` if there are no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::World;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position(f32);
    impl Component for Position {
        fn type_name() -> &'static str {
            "Position"
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity(f32);
    impl Component for Velocity {
        fn type_name() -> &'static str {
            "Velocity"
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Health(f32);
    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    /// Runs `f` against views built the way a stage builds them.
    fn with_views<R>(
        world: &mut World,
        access: &AccessDeclaration,
        f: impl FnOnce(&Views<'_>) -> R,
    ) -> R {
        let owned: StoreMap = access
            .writes
            .iter()
            .filter_map(|&ty| world.take_store(ty).map(|store| (ty, store)))
            .collect();
        let (result, stores) = {
            let (entities, shared) = world.parts();
            let views = Views::new("test", access, 1, entities, shared, owned);
            let result = f(&views);
            (result, views.into_parts().0)
        };
        for store in stores.into_values() {
            world.restore_store(store);
        }
        result
    }

    fn populated() -> (World, Entity, Entity) {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        world.insert(a, Position(0.0)).unwrap();
        world.insert(b, Position(0.0)).unwrap();
        world.insert(a, Velocity(2.0)).unwrap();
        world.insert(a, Health(1.0)).unwrap();
        (world, a, b)
    }

    #[test]
    fn test_write_through_view_lands_in_world() {
        let (mut world, a, b) = populated();
        let access = AccessDeclaration::new().reads::<Velocity>().writes::<Position>();

        with_views(&mut world, &access, |views| {
            let velocities = views.read::<Velocity>().unwrap();
            let mut positions = views.write::<Position>().unwrap();
            for (entity, position) in positions.iter_mut() {
                if let Some(velocity) = velocities.get(entity) {
                    position.0 += velocity.0;
                }
            }
        });

        assert_eq!(world.get::<Position>(a), Some(&Position(2.0)));
        assert_eq!(world.get::<Position>(b), Some(&Position(0.0)));
    }

    #[test]
    fn test_undeclared_read_is_refused() {
        let (mut world, _, _) = populated();
        let access = AccessDeclaration::new().writes::<Position>();

        let err = with_views(&mut world, &access, |views| {
            views.read::<Health>().map(|_| ()).unwrap_err()
        });
        assert_eq!(
            err,
            EcsError::UndeclaredAccess {
                operation: "test".to_string(),
                category: Health::component_type_id(),
            }
        );
    }

    #[test]
    fn test_read_declaration_does_not_grant_write() {
        let (mut world, _, _) = populated();
        let access = AccessDeclaration::new().reads::<Velocity>();

        let result = with_views(&mut world, &access, |views| {
            views.write::<Velocity>().map(|_| ())
        });
        assert!(matches!(result, Err(EcsError::UndeclaredAccess { .. })));
    }

    #[test]
    fn test_write_view_is_exclusive_within_operation() {
        let (mut world, _, _) = populated();
        let access = AccessDeclaration::new().writes::<Position>();

        with_views(&mut world, &access, |views| {
            let held = views.write::<Position>().unwrap();
            assert!(matches!(
                views.write::<Position>().map(|_| ()),
                Err(EcsError::AccessInUse { .. })
            ));
            assert!(matches!(
                views.read::<Position>().map(|_| ()),
                Err(EcsError::AccessInUse { .. })
            ));
            drop(held);
            assert_eq!(views.read::<Position>().unwrap().len(), 2);
        });
    }

    #[test]
    fn test_query_is_scoped_to_declaration() {
        let (mut world, a, _) = populated();
        let access = AccessDeclaration::new().reads::<Velocity>().writes::<Position>();

        with_views(&mut world, &access, |views| {
            let q = Query::new().with_type::<Position>().with_type::<Velocity>();
            assert_eq!(views.query(&q).unwrap(), vec![a]);

            let q = Query::new().with_type::<Position>().without_type::<Health>();
            assert!(matches!(
                views.query(&q),
                Err(EcsError::UndeclaredAccess { .. })
            ));
        });
    }

    #[test]
    fn test_missing_store_yields_empty_views() {
        let mut world = World::new();
        world.spawn();
        let access = AccessDeclaration::new().reads::<Velocity>().writes::<Health>();

        with_views(&mut world, &access, |views| {
            assert!(views.read::<Velocity>().unwrap().is_empty());
            let mut health = views.write::<Health>().unwrap();
            assert!(health.is_empty());
            assert_eq!(health.iter_mut().count(), 0);
        });
    }

    #[test]
    fn test_commands_are_returned_with_parts() {
        let (world, a, _) = populated();
        let access = AccessDeclaration::new();
        let owned = StoreMap::new();
        let (entities, shared) = world.parts();
        let views = Views::new("spawner", &access, 3, entities, shared, owned);
        views.commands().despawn(a);
        assert_eq!(views.tick(), 3);
        assert_eq!(views.operation(), "spawner");
        assert!(views.is_alive(a));
        let (_, commands) = views.into_parts();
        assert_eq!(commands.len(), 1);
    }
}
