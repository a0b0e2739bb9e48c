//! Access declarations for operations.
//!
//! An [`AccessDeclaration`] states which component categories an operation
//! reads and which it writes. The scheduler uses declarations to decide which
//! operations may share a stage, and views use them to refuse access to
//! anything undeclared.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentTypeId};

/// The category-level read and write sets of one operation.
///
/// A write grants exclusive access and implies read access. A category must
/// not be listed in both sets; see [`AccessDeclaration::self_conflict`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDeclaration {
    /// Categories read through shared views.
    pub reads: BTreeSet<ComponentTypeId>,
    /// Categories written through exclusive views.
    pub writes: BTreeSet<ComponentTypeId>,
}

impl AccessDeclaration {
    /// Create a new empty declaration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a read-only category.
    #[must_use]
    pub fn read(mut self, type_id: ComponentTypeId) -> Self {
        self.reads.insert(type_id);
        self
    }

    /// Add a written category.
    #[must_use]
    pub fn write(mut self, type_id: ComponentTypeId) -> Self {
        self.writes.insert(type_id);
        self
    }

    /// Add `T` as a read-only category.
    #[must_use]
    pub fn reads<T: Component>(self) -> Self {
        self.read(T::component_type_id())
    }

    /// Add `T` as a written category.
    #[must_use]
    pub fn writes<T: Component>(self) -> Self {
        self.write(T::component_type_id())
    }

    /// Returns the first category present in both the read and the write set.
    #[must_use]
    pub fn self_conflict(&self) -> Option<ComponentTypeId> {
        self.reads.intersection(&self.writes).next().copied()
    }

    /// Returns `true` if the declaration grants read access (shared or
    /// exclusive) to the category.
    #[must_use]
    pub fn can_read(&self, type_id: ComponentTypeId) -> bool {
        self.reads.contains(&type_id) || self.writes.contains(&type_id)
    }

    /// Returns `true` if the declaration grants exclusive access to the
    /// category.
    #[must_use]
    pub fn can_write(&self, type_id: ComponentTypeId) -> bool {
        self.writes.contains(&type_id)
    }

    /// Checks whether this declaration conflicts with another.
    ///
    /// ```text
    /// A.writes ∩ B.writes ≠ ∅  OR
    /// A.writes ∩ B.reads  ≠ ∅  OR
    /// B.writes ∩ A.reads  ≠ ∅
    /// ```
    #[must_use]
    pub fn conflicts_with(&self, other: &AccessDeclaration) -> bool {
        !self.writes.is_disjoint(&other.writes)
            || !self.writes.is_disjoint(&other.reads)
            || !other.writes.is_disjoint(&self.reads)
    }
}
