//! # engine_app
//!
//! Builds a small particle world, registers a handful of operations, and runs
//! a bounded number of ticks.
//!
//! ## Sequence
//!
//! 1. Spawn the initial particles.
//! 2. Register the operations and log the resulting schedule.
//! 3. Run the ticks, then print the schedule report and per-operation
//!    statistics as JSON.

mod components;

use anyhow::Result;
use engine_component::Query;
use engine_runtime::{AccessDeclaration, EntityBuilder, TickConfig, TickLoop, Views, World};
use glam::Vec3;
use tracing::info;
use tracing_subscriber::EnvFilter;

use components::{Health, Lifetime, Position, Velocity};

const TICKS: u64 = 60;
const INITIAL_PARTICLES: usize = 8;
const EMIT_EVERY: u64 = 5;

fn particle(seed: usize) -> EntityBuilder {
    let angle = seed as f32 * 0.7;
    EntityBuilder::new()
        .with(Position(Vec3::ZERO))
        .with(Velocity(Vec3::new(angle.cos(), 0.5, angle.sin())))
        .with(Health {
            current: 1.0,
            ..Health::full(10.0)
        })
        .with(Lifetime(20 + (seed as u32 % 7) * 5))
}

fn movement(views: &Views<'_>) -> Result<()> {
    let velocities = views.read::<Velocity>()?;
    let mut positions = views.write::<Position>()?;
    for (entity, position) in positions.iter_mut() {
        if let Some(velocity) = velocities.get(entity) {
            position.0 += velocity.0;
        }
    }
    Ok(())
}

fn regen(views: &Views<'_>) -> Result<()> {
    let mut health = views.write::<Health>()?;
    for (_, hp) in health.iter_mut() {
        hp.heal(0.5);
    }
    Ok(())
}

fn age(views: &Views<'_>) -> Result<()> {
    let mut lifetimes = views.write::<Lifetime>()?;
    for (entity, lifetime) in lifetimes.iter_mut() {
        lifetime.0 = lifetime.0.saturating_sub(1);
        if lifetime.0 == 0 {
            views.commands().despawn(entity);
        }
    }
    Ok(())
}

fn emit(views: &Views<'_>) -> Result<()> {
    if views.tick() % EMIT_EVERY == 0 {
        views.commands().spawn(particle(views.tick() as usize));
    }
    Ok(())
}

fn drag(views: &Views<'_>) -> Result<()> {
    let mut velocities = views.write::<Velocity>()?;
    for (_, velocity) in velocities.iter_mut() {
        velocity.0 *= 0.95;
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    info!("engine demo starting");

    let mut world = World::new();
    for seed in 0..INITIAL_PARTICLES {
        world.spawn_with(particle(seed))?;
    }

    let mut tick_loop = TickLoop::new(TickConfig::default());
    tick_loop.register_operation(
        "move",
        AccessDeclaration::new().reads::<Velocity>().writes::<Position>(),
        movement,
    )?;
    tick_loop.register_operation("regen", AccessDeclaration::new().writes::<Health>(), regen)?;
    tick_loop.register_operation("age", AccessDeclaration::new().writes::<Lifetime>(), age)?;
    tick_loop.register_operation("emit", AccessDeclaration::new(), emit)?;
    tick_loop.register_operation("drag", AccessDeclaration::new().writes::<Velocity>(), drag)?;

    let report = tick_loop.schedule_report();
    info!(stages = report.stages.len(), "schedule ready");

    tick_loop.run(&mut world, TICKS)?;

    let moving = world.query(&Query::new().with_type::<Position>().with_type::<Velocity>());
    info!(
        ticks = tick_loop.tick_id(),
        entities = world.entity_count(),
        moving = moving.len(),
        "engine demo finished"
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("{}", serde_json::to_string_pretty(&tick_loop.stats().snapshot())?);
    Ok(())
}
