//! Entity queries.
//!
//! A [`Query`] names the categories an entity must have and the categories it
//! must not have. Resolving a query against live storage happens in the
//! runtime; this type only carries the requirement.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentTypeId};

/// Required and excluded categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// An entity matches only if it has every one of these.
    pub required: BTreeSet<ComponentTypeId>,
    /// An entity matches only if it has none of these.
    pub excluded: BTreeSet<ComponentTypeId>,
}

impl Query {
    /// Create a query matching every live entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a category.
    #[must_use]
    pub fn with(mut self, type_id: ComponentTypeId) -> Self {
        self.required.insert(type_id);
        self
    }

    /// Exclude a category.
    #[must_use]
    pub fn without(mut self, type_id: ComponentTypeId) -> Self {
        self.excluded.insert(type_id);
        self
    }

    /// Require `T`.
    #[must_use]
    pub fn with_type<T: Component>(self) -> Self {
        self.with(T::component_type_id())
    }

    /// Exclude `T`.
    #[must_use]
    pub fn without_type<T: Component>(self) -> Self {
        self.without(T::component_type_id())
    }

    /// Every category the query inspects, required or excluded.
    pub fn categories(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.required.iter().chain(self.excluded.iter()).copied()
    }
}
