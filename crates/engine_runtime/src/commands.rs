//! Deferred structural mutation.
//!
//! Operations never spawn, despawn, or attach/detach components directly
//! while a stage runs: other operations in the same stage hold views over the
//! same stores. They queue the change in [`Commands`] instead, and the tick
//! loop applies every queued command once the stage has finished.

use std::cell::RefCell;

use engine_component::{Component, EcsError, Entity};
use tracing::{debug, warn};

use crate::world::World;

type Apply = Box<dyn FnOnce(&mut World, Entity) -> Result<(), EcsError> + Send>;

fn insert_fn<T: Component>(value: T) -> Apply {
    Box::new(move |world: &mut World, entity: Entity| {
        world.insert(entity, value).map(|_| ())
    })
}

/// Components to attach to a newly spawned entity.
#[derive(Default)]
pub struct EntityBuilder {
    components: Vec<Apply>,
}

impl EntityBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `value` to the entity when it is spawned.
    #[must_use]
    pub fn with<T: Component>(mut self, value: T) -> Self {
        self.components.push(insert_fn(value));
        self
    }

    /// Returns the number of components to attach.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if the builder attaches nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub(crate) fn apply(self, world: &mut World, entity: Entity) -> Result<(), EcsError> {
        for insert in self.components {
            insert(world, entity)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for EntityBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityBuilder")
            .field("components", &self.components.len())
            .finish()
    }
}

pub(crate) enum Command {
    Spawn(EntityBuilder),
    Insert { entity: Entity, apply: Apply },
    Remove { entity: Entity, apply: Apply },
    Despawn(Entity),
}

/// Structural changes queued by one operation during a stage.
#[derive(Default)]
pub struct Commands {
    queue: RefCell<Vec<Command>>,
}

impl Commands {
    /// Spawn an entity with the builder's components after the stage.
    pub fn spawn(&self, builder: EntityBuilder) {
        self.queue.borrow_mut().push(Command::Spawn(builder));
    }

    /// Attach `value` to `entity` after the stage, replacing any prior value.
    pub fn insert<T: Component>(&self, entity: Entity, value: T) {
        self.queue.borrow_mut().push(Command::Insert {
            entity,
            apply: insert_fn(value),
        });
    }

    /// Detach `T` from `entity` after the stage.
    pub fn remove<T: Component>(&self, entity: Entity) {
        let apply: Apply = Box::new(|world: &mut World, entity: Entity| {
            if !world.is_alive(entity) {
                return Err(EcsError::StaleEntity(entity));
            }
            world.remove::<T>(entity);
            Ok(())
        });
        self.queue
            .borrow_mut()
            .push(Command::Remove { entity, apply });
    }

    /// Despawn `entity` after the stage.
    ///
    /// The entity stays alive and queryable until the stage ends.
    pub fn despawn(&self, entity: Entity) {
        self.queue.borrow_mut().push(Command::Despawn(entity));
    }

    /// Returns the number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    pub(crate) fn into_inner(self) -> Vec<Command> {
        self.queue.into_inner()
    }
}

impl std::fmt::Debug for Commands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commands")
            .field("queued", &self.len())
            .finish()
    }
}

/// Counts from applying a stage's command queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct AppliedCommands {
    pub spawned: usize,
    pub despawned: usize,
    pub skipped: usize,
}

/// Every command queued during one stage, in operation order.
#[derive(Default)]
pub(crate) struct CommandQueue {
    commands: Vec<Command>,
}

impl CommandQueue {
    pub fn extend(&mut self, commands: Vec<Command>) {
        self.commands.extend(commands);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Apply the queue, then purge despawned entities from every store.
    ///
    /// Commands naming a dead entity are skipped.
    pub fn apply(self, world: &mut World) -> AppliedCommands {
        let mut applied = AppliedCommands::default();
        let mut despawned = Vec::new();

        for command in self.commands {
            let (entity, result) = match command {
                Command::Spawn(builder) => {
                    let entity = world.spawn();
                    applied.spawned += 1;
                    (entity, builder.apply(world, entity))
                }
                Command::Insert { entity, apply } | Command::Remove { entity, apply } => {
                    (entity, apply(world, entity))
                }
                Command::Despawn(entity) => {
                    if world.release(entity) {
                        despawned.push(entity);
                        (entity, Ok(()))
                    } else {
                        (entity, Err(EcsError::StaleEntity(entity)))
                    }
                }
            };

            match result {
                Ok(()) => {}
                Err(EcsError::StaleEntity(_)) => {
                    applied.skipped += 1;
                    debug!(%entity, "skipped deferred command for dead entity");
                }
                Err(error) => {
                    applied.skipped += 1;
                    warn!(%entity, %error, "deferred command failed");
                }
            }
        }

        for entity in despawned {
            world.despawn_cleanup(entity);
            applied.despawned += 1;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Health(i32);
    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Marker;
    impl Component for Marker {
        fn type_name() -> &'static str {
            "Marker"
        }
    }

    fn queue_of(commands: Commands) -> CommandQueue {
        let mut queue = CommandQueue::default();
        queue.extend(commands.into_inner());
        queue
    }

    #[test]
    fn test_commands_are_deferred_until_applied() {
        let mut world = World::new();
        let e = world.spawn();

        let commands = Commands::default();
        commands.insert(e, Health(10));
        commands.spawn(EntityBuilder::new().with(Health(5)).with(Marker));
        assert_eq!(commands.len(), 2);
        assert_eq!(world.get::<Health>(e), None);
        assert_eq!(world.entity_count(), 1);

        let applied = queue_of(commands).apply(&mut world);
        assert_eq!(applied.spawned, 1);
        assert_eq!(world.get::<Health>(e), Some(&Health(10)));
        assert_eq!(world.entity_count(), 2);
        assert_eq!(world.match_entities(&[Marker::component_type_id()], &[]).len(), 1);
    }

    #[test]
    fn test_despawn_purges_after_queue() {
        let mut world = World::new();
        let e = world.spawn();
        world.insert(e, Health(1)).unwrap();

        let commands = Commands::default();
        commands.despawn(e);
        // Inserting after the despawn in the same batch targets a dead entity.
        commands.insert(e, Marker);

        let applied = queue_of(commands).apply(&mut world);
        assert_eq!(applied.despawned, 1);
        assert_eq!(applied.skipped, 1);
        assert!(!world.is_alive(e));
        assert_eq!(world.store::<Health>().map(|s| s.len()), Some(0));
        assert!(world.store::<Marker>().is_none());
    }

    #[test]
    fn test_stale_commands_are_skipped() {
        let mut world = World::new();
        let e = world.spawn();
        world.despawn(e);

        let commands = Commands::default();
        commands.insert(e, Health(3));
        commands.remove::<Health>(e);
        commands.despawn(e);

        let applied = queue_of(commands).apply(&mut world);
        assert_eq!(applied.skipped, 3);
        assert_eq!(applied.despawned, 0);
    }

    #[test]
    fn test_remove_command() {
        let mut world = World::new();
        let e = world.spawn();
        world.insert(e, Health(3)).unwrap();

        let commands = Commands::default();
        commands.remove::<Health>(e);
        queue_of(commands).apply(&mut world);
        assert!(!world.has::<Health>(e));
        assert!(world.is_alive(e));
    }

    #[test]
    fn test_despawn_then_spawn_keeps_new_occupant() {
        let mut world = World::new();
        let old = world.spawn();
        world.insert(old, Health(1)).unwrap();

        let commands = Commands::default();
        commands.despawn(old);
        commands.spawn(EntityBuilder::new().with(Health(2)));
        queue_of(commands).apply(&mut world);

        let alive = world.match_entities(&[Health::component_type_id()], &[]);
        assert_eq!(alive.len(), 1);
        assert_eq!(alive[0].index(), old.index());
        assert_eq!(world.get::<Health>(alive[0]), Some(&Health(2)));
    }
}
