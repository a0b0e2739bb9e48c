//! Query resolution.
//!
//! Resolution is recomputed on every call. Stores change between calls, and
//! during a stage the same query may be answered from the world's stores or
//! from stores an operation has borrowed, so nothing is cached.

use engine_component::{ComponentTypeId, Entity, EntityAllocator, ErasedStore, Query};

/// Live entities matching `query`, in ascending slot order.
///
/// `lookup` resolves a category to its store. A required category without a
/// store matches nothing; an excluded category without a store excludes
/// nothing.
pub(crate) fn match_entities<'s>(
    entities: &EntityAllocator,
    query: &Query,
    lookup: impl Fn(ComponentTypeId) -> Option<&'s dyn ErasedStore>,
) -> Vec<Entity> {
    let mut required = Vec::with_capacity(query.required.len());
    for &ty in &query.required {
        match lookup(ty) {
            Some(store) => required.push(store),
            None => return Vec::new(),
        }
    }
    let excluded: Vec<_> = query.excluded.iter().filter_map(|&ty| lookup(ty)).collect();

    entities
        .iter_alive()
        .filter(|&entity| {
            required.iter().all(|store| store.contains(entity))
                && !excluded.iter().any(|store| store.contains(entity))
        })
        .collect()
}
