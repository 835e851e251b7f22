//! Container entity types
//!
//! A chest is a persistent, uniquely-identified container holding a tier
//! reference, a world location, and an ordered item sequence. The cache in
//! [`crate::cache`] owns the authoritative set of live chests; rows in the
//! backing store trail it under write-behind.

use crate::item::Item;
use crate::tier::Tier;
use serde::{Deserialize, Serialize};

/// Identifier of a container entity.
///
/// Always positive, assigned by [`crate::alloc::next_id`], and stable for
/// the lifetime of the entity.
pub type ChestId = i64;

/// A position in a named world.
///
/// Equality is exact: identical world identifier and identical coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {}, {})", self.world, self.x, self.y, self.z)
    }
}

/// A persistent container entity.
///
/// Duplicate items and an empty item sequence are both valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chest {
    pub id: ChestId,
    pub tier: Tier,
    pub location: Location,
    pub items: Vec<Item>,
}

impl Chest {
    /// Create a chest with an empty item sequence
    pub fn new(id: ChestId, tier: Tier, location: Location) -> Self {
        Self {
            id,
            tier,
            location,
            items: Vec::new(),
        }
    }

    /// Set the item sequence
    pub fn with_items(mut self, items: Vec<Item>) -> Self {
        self.items = items;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_equality_is_exact() {
        let a = Location::new("overworld", 1.0, 64.0, -3.5);
        let b = Location::new("overworld", 1.0, 64.0, -3.5);
        let c = Location::new("overworld", 1.0, 64.0, -3.500001);
        let d = Location::new("nether", 1.0, 64.0, -3.5);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_chest_creation() {
        let chest = Chest::new(3, Tier::new(2), Location::new("overworld", 0.0, 70.0, 0.0))
            .with_items(vec![Item::new("stone", 64), Item::new("stone", 64)]);

        assert_eq!(chest.id, 3);
        assert_eq!(chest.tier.id, 2);
        assert_eq!(chest.items.len(), 2);
    }
}
