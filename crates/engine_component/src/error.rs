//! ECS error types.

use crate::component::ComponentTypeId;
use crate::entity::Entity;

/// Errors raised by the world, the operation registry, and access-scoped views.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The handle refers to a despawned entity or to an older occupant of a
    /// reused slot.
    #[error("{0} is not alive")]
    StaleEntity(Entity),

    /// An operation asked for a category outside its access declaration.
    #[error("operation '{operation}' did not declare access to {category}")]
    UndeclaredAccess {
        /// The offending operation.
        operation: String,
        /// The undeclared category.
        category: ComponentTypeId,
    },

    /// A declaration lists the same category as both read and written.
    #[error("operation '{operation}' both reads and writes {category}; declare it as a write")]
    SelfConflict {
        /// The misdeclared operation.
        operation: String,
        /// The category appearing in both sets.
        category: ComponentTypeId,
    },

    /// An operation with this id is already registered.
    #[error("operation '{0}' is already registered")]
    DuplicateOperation(String),

    /// No operation with this id is registered.
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    /// The store registered under this category holds a different Rust type.
    #[error("category {category} is not stored as {expected}")]
    CategoryMismatch {
        /// The category id that collided.
        category: ComponentTypeId,
        /// The Rust type the caller asked for.
        expected: &'static str,
    },

    /// The write view for this category is already borrowed by the same
    /// operation.
    #[error("write view for {category} is already in use")]
    AccessInUse {
        /// The category whose view is borrowed.
        category: ComponentTypeId,
    },
}
