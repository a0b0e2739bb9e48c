//! Execution engine tick loop.
//!
//! One tick walks the cached schedule:
//!
//! 1. For each stage, move the stores the stage writes out of the world.
//! 2. Hand every operation its [`Views`] and run the stage's transforms on the
//!    rayon pool.
//! 3. Return the written stores to the world.
//! 4. Apply the stage's deferred commands, then purge despawned entities.
//! 5. Advance the tick counter.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use engine_component::{AccessDeclaration, EcsError};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::commands::{Command, CommandQueue};
use crate::error::TickError;
use crate::registry::{OperationRegistry, Transform};
use crate::scheduler::{Schedule, ScheduleReport, Stage};
use crate::stats::ExecutionStats;
use crate::views::Views;
use crate::world::{StoreMap, World};

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Run the operations of a stage on the rayon pool. When `false` they run
    /// one after another on the calling thread, in registration order.
    pub parallel: bool,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl TickConfig {
    /// Set whether stages run in parallel.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Whether a tick is in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineState {
    #[default]
    Idle,
    Running,
}

/// One operation's share of a stage.
struct Job {
    index: usize,
    stores: StoreMap,
}

/// What a job hands back once its transform has run.
struct Outcome {
    index: usize,
    result: anyhow::Result<()>,
    stores: StoreMap,
    commands: Vec<Command>,
}

/// The execution engine.
#[derive(Debug, Default)]
pub struct TickLoop {
    /// Number of completed ticks.
    tick_id: u64,
    config: TickConfig,
    registry: OperationRegistry,
    /// Cached stages (recomputed when the operation set changes).
    schedule: Schedule,
    schedule_dirty: bool,
    /// Number of times the schedule has been computed.
    schedule_builds: u64,
    state: EngineState,
    stats: ExecutionStats,
}

impl TickLoop {
    /// Create a new tick loop with the given configuration.
    #[must_use]
    pub fn new(config: TickConfig) -> Self {
        Self {
            config,
            schedule_dirty: true,
            ..Self::default()
        }
    }

    /// Returns the number of completed ticks.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    #[must_use]
    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    /// Returns a reference to the operation registry.
    #[must_use]
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Returns the per-operation execution statistics.
    #[must_use]
    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    /// Register an operation. It runs from the next tick on.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateOperation`] if the id is taken;
    /// [`EcsError::SelfConflict`] if a category is both read and written.
    pub fn register_operation<F>(
        &mut self,
        id: impl Into<String>,
        access: AccessDeclaration,
        transform: F,
    ) -> Result<(), EcsError>
    where
        F: Fn(&Views<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let transform: Transform = Box::new(transform);
        self.registry.register(id, access, transform)?;
        self.schedule_dirty = true;
        Ok(())
    }

    /// Remove an operation.
    ///
    /// Returns `true` if the operation was registered.
    pub fn unregister_operation(&mut self, id: &str) -> bool {
        let removed = self.registry.unregister(id);
        if removed {
            self.stats.forget(id);
            self.schedule_dirty = true;
        }
        removed
    }

    fn recompute_schedule(&mut self) {
        self.schedule = Schedule::build(&self.registry);
        self.schedule_dirty = false;
        self.schedule_builds += 1;

        info!(
            tick_id = self.tick_id,
            stage_count = self.schedule.len(),
            operation_count = self.registry.len(),
            builds = self.schedule_builds,
            "recomputed execution stages"
        );
    }

    /// Returns the current schedule, recomputing it if operations changed.
    pub fn build_schedule(&mut self) -> &Schedule {
        if self.schedule_dirty {
            self.recompute_schedule();
        }
        &self.schedule
    }

    /// Describe the current schedule by operation id.
    pub fn schedule_report(&mut self) -> ScheduleReport {
        self.build_schedule();
        self.schedule.report(&self.registry)
    }

    /// Run one tick against `world`.
    ///
    /// # Errors
    ///
    /// [`TickError::Operation`] if a transform fails. Stages before the
    /// failing one keep their effects and the tick counter does not advance.
    pub fn tick(&mut self, world: &mut World) -> Result<(), TickError> {
        if self.schedule_dirty {
            self.recompute_schedule();
        }

        let tick_id = self.tick_id + 1;
        self.state = EngineState::Running;
        debug!(tick_id, stages = self.schedule.len(), "tick start");

        let result = self
            .schedule
            .stages()
            .iter()
            .enumerate()
            .try_for_each(|(stage_idx, stage)| {
                self.run_stage(world, tick_id, stage_idx, stage)
            });

        self.state = EngineState::Idle;
        match result {
            Ok(()) => {
                self.tick_id = tick_id;
                Ok(())
            }
            Err(err) => {
                warn!(tick_id, stage = err.stage(), operation = err.operation(), "tick failed");
                Err(err)
            }
        }
    }

    /// Run `ticks` ticks back to back, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// The first [`TickError`] encountered.
    pub fn run(&mut self, world: &mut World, ticks: u64) -> Result<(), TickError> {
        info!(ticks, parallel = self.config.parallel, "starting tick loop");
        let start = Instant::now();

        for _ in 0..ticks {
            self.tick(world)?;
        }

        info!(
            ticks,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "tick loop complete"
        );
        Ok(())
    }

    fn run_stage(
        &self,
        world: &mut World,
        tick_id: u64,
        stage_idx: usize,
        stage: &Stage,
    ) -> Result<(), TickError> {
        debug!(
            tick_id,
            stage = stage_idx,
            operations = stage.operation_indices.len(),
            "executing stage"
        );

        let jobs: Vec<Job> = stage
            .operation_indices
            .iter()
            .map(|&index| {
                let stores = self
                    .registry
                    .by_index(index)
                    .into_iter()
                    .flat_map(|op| op.access().writes.iter())
                    .filter_map(|&ty| world.take_store(ty).map(|store| (ty, store)))
                    .collect();
                Job { index, stores }
            })
            .collect();

        let outcomes: Vec<Outcome> = {
            let (entities, shared) = world.parts();
            let registry = &self.registry;
            let stats = &self.stats;

            let execute = |job: Job| -> Outcome {
                let Some(operation) = registry.by_index(job.index) else {
                    return Outcome {
                        index: job.index,
                        result: Ok(()),
                        stores: job.stores,
                        commands: Vec::new(),
                    };
                };

                let views = Views::new(
                    operation.id(),
                    operation.access(),
                    tick_id,
                    entities,
                    shared,
                    job.stores,
                );
                let start = Instant::now();
                let result = catch_unwind(AssertUnwindSafe(|| operation.run(&views)))
                    .unwrap_or_else(|payload| Err(panic_error(payload.as_ref())));
                stats.record(operation.id(), start.elapsed(), result.is_ok());

                let (stores, commands) = views.into_parts();
                Outcome {
                    index: job.index,
                    result,
                    stores,
                    commands,
                }
            };

            if self.config.parallel && jobs.len() > 1 {
                jobs.into_par_iter().map(execute).collect()
            } else {
                jobs.into_iter().map(execute).collect()
            }
        };

        let mut queue = CommandQueue::default();
        let mut failure = None;
        for outcome in outcomes {
            for store in outcome.stores.into_values() {
                world.restore_store(store);
            }
            match outcome.result {
                Ok(()) => queue.extend(outcome.commands),
                Err(source) if failure.is_none() => failure = Some((outcome.index, source)),
                Err(_) => {}
            }
        }

        if let Some((index, source)) = failure {
            let operation = self
                .registry
                .by_index(index)
                .map(|op| op.id().to_string())
                .unwrap_or_default();
            return Err(TickError::Operation {
                tick: tick_id,
                stage: stage_idx,
                operation,
                source,
            });
        }

        let queued = queue.len();
        let applied = queue.apply(world);
        debug!(
            tick_id,
            stage = stage_idx,
            queued,
            spawned = applied.spawned,
            despawned = applied.despawned,
            skipped = applied.skipped,
            "applied deferred commands"
        );
        Ok(())
    }
}

/// Turns a transform's panic payload into an error so the stage can hand its
/// stores back before failing.
fn panic_error(payload: &(dyn Any + Send)) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    anyhow::anyhow!("operation panicked: {message}")
}
