//! # engine_runtime
//!
//! The staged execution runtime: world state, access-scoped views, the stage
//! scheduler, and the tick loop that drives registered operations.
//!
//! ## Lifecycle
//!
//! 1. Build a [`World`] and attach components to entities.
//! 2. Register operations on a [`TickLoop`], each with an
//!    [`AccessDeclaration`] and a transform taking [`Views`].
//! 3. Call [`TickLoop::tick`]. Stages run in order; operations inside a stage
//!    run in parallel; [`Commands`] queued by a stage are applied when it ends.

pub mod commands;
pub mod error;
mod query;
pub mod registry;
pub mod scheduler;
pub mod stats;
pub mod tick;
pub mod views;
pub mod world;

pub use commands::{Commands, EntityBuilder};
pub use engine_component::{
    AccessDeclaration, Component, ComponentStore, ComponentTypeId, EcsError, Entity, Query,
};
pub use error::TickError;
pub use registry::{Operation, OperationRegistry, Transform};
pub use scheduler::{Schedule, ScheduleReport, Stage, compute_stages};
pub use stats::{ExecutionStats, OperationStats};
pub use tick::{EngineState, TickConfig, TickLoop};
pub use views::{Read, Views, Write};
pub use world::World;
