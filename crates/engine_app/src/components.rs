//! Demo components.

use engine_component::Component;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// World-space position.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position(pub Vec3);

impl Component for Position {
    fn type_name() -> &'static str {
        "engine_app::Position"
    }
}

/// Units per tick.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Velocity(pub Vec3);

impl Component for Velocity {
    fn type_name() -> &'static str {
        "engine_app::Velocity"
    }
}

/// Hit points, regenerating up to `max`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    #[must_use]
    pub fn full(max: f32) -> Self {
        Self { current: max, max }
    }

    /// Restore `amount`, clamped to `max`.
    pub fn heal(&mut self, amount: f32) {
        self.current = (self.current + amount).min(self.max);
    }
}

impl Component for Health {
    fn type_name() -> &'static str {
        "engine_app::Health"
    }
}

/// Ticks left before the entity is despawned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lifetime(pub u32);

impl Component for Lifetime {
    fn type_name() -> &'static str {
        "engine_app::Lifetime"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heal_clamps_to_max() {
        let mut health = Health { current: 8.0, max: 10.0 };
        health.heal(5.0);
        assert_eq!(health, Health::full(10.0));
    }

    #[test]
    fn test_categories_are_distinct() {
        let ids = [
            Position::component_type_id(),
            Velocity::component_type_id(),
            Health::component_type_id(),
            Lifetime::component_type_id(),
        ];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_position_serialises_as_array() {
        let json = serde_json::to_string(&Position(Vec3::new(1.0, 2.0, 3.0))).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0]");
    }
}
