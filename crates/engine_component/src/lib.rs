//! # engine_component
//!
//! The "E" and "C" in ECS: entity identity, component categories, and how
//! component values are stored.
//!
//! This crate provides:
//!
//! - [`Entity`] / [`EntityAllocator`]: generational handles and slot recycling.
//! - [`Component`] trait and [`ComponentTypeId`]: category identity.
//! - [`ComponentStore`] / [`ErasedStore`]: per-category sparse-set storage.
//! - [`AccessDeclaration`]: the read/write sets an operation declares.
//! - [`Query`]: required/excluded category requirements.
//! - [`EcsError`]: errors shared by the storage and runtime layers.

pub mod access;
pub mod component;
pub mod entity;
pub mod error;
pub mod query;
pub mod storage;

pub use access::AccessDeclaration;
pub use component::{Component, ComponentTypeId};
pub use entity::{Entity, EntityAllocator};
pub use error::EcsError;
pub use query::Query;
pub use storage::{ComponentStore, ErasedStore};
