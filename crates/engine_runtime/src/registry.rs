//! Operation registry: tracks registered operations and their access
//! declarations.
//!
//! Registration order is significant: the scheduler places operations into
//! stages in the order they were registered.

use engine_component::{AccessDeclaration, EcsError};

use crate::views::Views;

/// The transform an operation runs each tick.
pub type Transform = Box<dyn Fn(&Views<'_>) -> anyhow::Result<()> + Send + Sync>;

/// A registered operation: an id, its declared access, and its transform.
pub struct Operation {
    id: String,
    access: AccessDeclaration,
    transform: Transform,
}

impl Operation {
    /// The operation's id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The operation's declared access.
    #[must_use]
    pub fn access(&self) -> &AccessDeclaration {
        &self.access
    }

    pub(crate) fn run(&self, views: &Views<'_>) -> anyhow::Result<()> {
        (self.transform)(views)
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}

/// Registry of all operations, in registration order.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: Vec<Operation>,
}

impl OperationRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateOperation`] if the id is taken;
    /// [`EcsError::SelfConflict`] if a category is both read and written.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        access: AccessDeclaration,
        transform: Transform,
    ) -> Result<(), EcsError> {
        let id = id.into();
        if self.index_of(&id).is_some() {
            return Err(EcsError::DuplicateOperation(id));
        }
        if let Some(category) = access.self_conflict() {
            return Err(EcsError::SelfConflict {
                operation: id,
                category,
            });
        }

        self.operations.push(Operation {
            id,
            access,
            transform,
        });
        Ok(())
    }

    /// Remove an operation.
    ///
    /// Returns `true` if the operation was found and removed.
    pub fn unregister(&mut self, id: &str) -> bool {
        match self.index_of(id) {
            Some(index) => {
                self.operations.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns an operation by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.id == id)
    }

    /// Returns the registration position of an operation.
    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.operations.iter().position(|op| op.id == id)
    }

    /// Returns the operation at a registration position.
    #[must_use]
    pub fn by_index(&self, index: usize) -> Option<&Operation> {
        self.operations.get(index)
    }

    /// Returns whether two registered operations conflict.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownOperation`] if either id is not registered.
    pub fn conflicts(&self, a: &str, b: &str) -> Result<bool, EcsError> {
        let lookup = |id: &str| {
            self.get(id)
                .ok_or_else(|| EcsError::UnknownOperation(id.to_string()))
        };
        Ok(lookup(a)?.access.conflicts_with(&lookup(b)?.access))
    }

    /// Returns an iterator over all operations in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    /// Returns the number of registered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use engine_component::ComponentTypeId;

    use super::*;

    fn noop() -> Transform {
        Box::new(|_: &Views<'_>| -> anyhow::Result<()> { Ok(()) })
    }

    fn access(reads: &[u64], writes: &[u64]) -> AccessDeclaration {
        let mut access = AccessDeclaration::new();
        for &r in reads {
            access = access.read(ComponentTypeId(r));
        }
        for &w in writes {
            access = access.write(ComponentTypeId(w));
        }
        access
    }

    #[test]
    fn test_register_preserves_order() {
        let mut registry = OperationRegistry::new();
        registry.register("physics", access(&[1], &[2]), noop()).unwrap();
        registry.register("ai", access(&[1], &[3]), noop()).unwrap();
        let ids: Vec<_> = registry.iter().map(Operation::id).collect();
        assert_eq!(ids, vec!["physics", "ai"]);
        assert_eq!(registry.index_of("ai"), Some(1));
        assert_eq!(registry.by_index(0).map(Operation::id), Some("physics"));
    }

    #[test]
    fn test_duplicate_operation_rejected() {
        let mut registry = OperationRegistry::new();
        registry.register("physics", access(&[1], &[2]), noop()).unwrap();
        let err = registry
            .register("physics", access(&[], &[4]), noop())
            .unwrap_err();
        assert_eq!(err, EcsError::DuplicateOperation("physics".to_string()));
        assert_eq!(registry.len(), 1);
        // The original declaration is untouched.
        assert!(registry.get("physics").unwrap().access().can_write(ComponentTypeId(2)));
    }

    #[test]
    fn test_self_conflict_rejected() {
        let mut registry = OperationRegistry::new();
        let err = registry
            .register("bad", access(&[5], &[5]), noop())
            .unwrap_err();
        assert_eq!(
            err,
            EcsError::SelfConflict {
                operation: "bad".to_string(),
                category: ComponentTypeId(5),
            }
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister() {
        let mut registry = OperationRegistry::new();
        registry.register("physics", access(&[1], &[2]), noop()).unwrap();
        assert!(registry.unregister("physics"));
        assert!(!registry.unregister("physics"));
        assert!(registry.is_empty());
        // The id is free again.
        registry.register("physics", access(&[], &[2]), noop()).unwrap();
    }

    #[test]
    fn test_conflicts_by_id() {
        let mut registry = OperationRegistry::new();
        registry.register("move", access(&[2], &[1]), noop()).unwrap();
        registry.register("teleport", access(&[], &[1]), noop()).unwrap();
        registry.register("regen", access(&[], &[3]), noop()).unwrap();

        assert_eq!(registry.conflicts("move", "teleport"), Ok(true));
        assert_eq!(registry.conflicts("teleport", "move"), Ok(true));
        assert_eq!(registry.conflicts("move", "regen"), Ok(false));
        assert_eq!(
            registry.conflicts("move", "missing"),
            Err(EcsError::UnknownOperation("missing".to_string()))
        );
    }
}
