//! Entity type and allocation utilities.
//!
//! An [`Entity`] is a generational handle: a slot `index` plus the
//! `generation` that slot had when the handle was issued. Despawning bumps the
//! slot's generation, so every handle issued before the despawn is stale from
//! then on and fails lookups instead of aliasing whatever reuses the slot.

use serde::Serialize;

/// A generational entity handle.
///
/// Entities are pure identifiers. They carry no data of their own. Components
/// are attached to entities to give them meaning.
///
/// Only [`EntityAllocator`] creates entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the storage slot this entity occupies.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation of the slot when this handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    alive: bool,
}

/// Allocates and recycles entity slots.
///
/// Freed slots are reused last-in first-out. A reused slot hands out a
/// generation one greater than the last handle issued for it. A slot whose
/// generation is exhausted is retired rather than recycled.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl EntityAllocator {
    /// Creates a new, empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an entity, reusing a freed slot when one is available.
    ///
    /// # Panics
    ///
    /// Panics if no slot is free and every `u32` index has been handed out.
    pub fn allocate(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            self.live += 1;
            return Entity::new(index, slot.generation);
        }

        let Some(index) = next_slot_index(self.slots.len()) else {
            panic!(
                "entity index space exhausted after {} slots",
                self.slots.len()
            );
        };
        self.slots.push(Slot {
            generation: 0,
            alive: true,
        });
        self.live += 1;
        Entity::new(index, 0)
    }

    /// Frees the entity's slot and invalidates every outstanding handle to it.
    ///
    /// Returns `false` without doing anything if the handle is stale or was
    /// already despawned.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }

        let slot = &mut self.slots[entity.index as usize];
        slot.alive = false;
        self.live -= 1;

        // An exhausted generation retires the slot for good.
        if let Some(next) = slot.generation.checked_add(1) {
            slot.generation = next;
            self.free.push(entity.index);
        }
        true
    }

    /// Returns `true` if the handle refers to a live entity.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation)
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no entity is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Returns the number of slots ever allocated.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterates over live entities in ascending slot order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.alive.then(|| Entity::new(index as u32, slot.generation))
        })
    }
}

/// Index of the slot appended after `slots` existing ones, if it fits a `u32`.
fn next_slot_index(slots: usize) -> Option<u32> {
    u32::try_from(slots).ok()
}
