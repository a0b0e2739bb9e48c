//! Operation scheduler: conflict detection and stage computation.
//!
//! The scheduler groups registered operations into **stages** based on their
//! read/write access declarations. Operations within a stage have no
//! conflicts and run in parallel. Stages execute sequentially, with deferred
//! structural changes applied at each stage boundary.

use engine_component::AccessDeclaration;
use serde::Serialize;

use crate::registry::OperationRegistry;

/// A group of operations that can run in parallel (no conflicts).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stage {
    /// Registration positions of the stage's operations, ascending.
    pub operation_indices: Vec<usize>,
}

/// Computes execution stages from a sequence of access declarations.
///
/// The algorithm is a greedy graph colouring in input order:
/// 1. For each declaration, find the earliest stage with no conflicting
///    member.
/// 2. If there is one, add the declaration to it.
/// 3. Otherwise, open a new stage.
///
/// For a fixed input order the result is fully deterministic. It is valid,
/// though not necessarily minimal: no two conflicting declarations ever share
/// a stage.
#[must_use]
pub fn compute_stages<'a>(
    declarations: impl IntoIterator<Item = &'a AccessDeclaration>,
) -> Vec<Stage> {
    let declarations: Vec<_> = declarations.into_iter().collect();
    let mut stages: Vec<Stage> = Vec::new();

    for (index, access) in declarations.iter().enumerate() {
        let free = stages.iter_mut().find(|stage| {
            !stage
                .operation_indices
                .iter()
                .any(|&existing| access.conflicts_with(declarations[existing]))
        });

        match free {
            Some(stage) => stage.operation_indices.push(index),
            None => stages.push(Stage {
                operation_indices: vec![index],
            }),
        }
    }

    stages
}

/// The ordered stages covering every registered operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    stages: Vec<Stage>,
}

impl Schedule {
    /// Compute the schedule for the registry's current operations.
    #[must_use]
    pub fn build(registry: &OperationRegistry) -> Self {
        Self {
            stages: compute_stages(registry.iter().map(|op| op.access())),
        }
    }

    /// The stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if there are no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the stage an operation was placed in.
    #[must_use]
    pub fn stage_of(&self, operation_index: usize) -> Option<usize> {
        self.stages
            .iter()
            .position(|stage| stage.operation_indices.contains(&operation_index))
    }

    /// Describe the schedule by operation id.
    #[must_use]
    pub fn report(&self, registry: &OperationRegistry) -> ScheduleReport {
        let id = |index: usize| {
            registry
                .by_index(index)
                .map_or_else(String::new, |op| op.id().to_string())
        };

        let stages = self
            .stages
            .iter()
            .map(|stage| stage.operation_indices.iter().map(|&i| id(i)).collect())
            .collect();

        let operations: Vec<_> = registry.iter().collect();
        let mut conflicts = Vec::new();
        for (i, a) in operations.iter().enumerate() {
            for b in &operations[i + 1..] {
                if a.access().conflicts_with(b.access()) {
                    conflicts.push((a.id().to_string(), b.id().to_string()));
                }
            }
        }

        ScheduleReport { stages, conflicts }
    }
}

/// Scheduling diagnostics, by operation id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleReport {
    /// Operation ids per stage, in execution order.
    pub stages: Vec<Vec<String>>,
    /// Every conflicting pair, in registration order.
    pub conflicts: Vec<(String, String)>,
}
