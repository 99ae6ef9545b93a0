//! Shared entity definitions.

use serde::{Deserialize, Serialize};

use crate::WeaponProfile;

/// Lowest value a rolled attribute can take
pub const STAT_MIN: i32 = 5;

/// Highest value a rolled attribute can take
pub const STAT_MAX: i32 = 18;

/// Ceiling for attributes raised by grants
pub const ATTRIBUTE_CAP: i32 = 1000;

/// Base attributes. A value of 0 means "not set yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub strength: i32,
    pub dexterity: i32,
    pub intelligence: i32,
    pub vitality: i32,
}

impl Attributes {
    pub fn new(strength: i32, dexterity: i32, intelligence: i32, vitality: i32) -> Self {
        Self {
            strength,
            dexterity,
            intelligence,
            vitality,
        }
    }

    /// All four attributes left for the server to roll
    pub fn unset() -> Self {
        Self::default()
    }

    pub fn is_fully_set(&self) -> bool {
        self.strength != 0 && self.dexterity != 0 && self.intelligence != 0 && self.vitality != 0
    }

    /// Attributes raised by `grant`, or None if any would pass `ATTRIBUTE_CAP`
    pub fn with_grant(&self, grant: &StatGrant) -> Option<Self> {
        let raise = |base: i32, delta: i32| {
            base.checked_add(delta).filter(|value| *value <= ATTRIBUTE_CAP)
        };

        Some(Self {
            strength: raise(self.strength, grant.strength)?,
            dexterity: raise(self.dexterity, grant.dexterity)?,
            intelligence: raise(self.intelligence, grant.intelligence)?,
            vitality: raise(self.vitality, grant.vitality)?,
        })
    }
}

/// Attribute increase handed out by level-ups, quests, admin commands...
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatGrant {
    pub strength: i32,
    pub dexterity: i32,
    pub intelligence: i32,
    pub vitality: i32,
}

impl StatGrant {
    pub fn new(strength: i32, dexterity: i32, intelligence: i32, vitality: i32) -> Self {
        Self {
            strength,
            dexterity,
            intelligence,
            vitality,
        }
    }

    /// Grants only ever raise attributes
    pub fn is_valid(&self) -> bool {
        self.strength >= 0 && self.dexterity >= 0 && self.intelligence >= 0 && self.vitality >= 0
    }
}

/// Stats computed from attributes and the equipped weapon. Never stored on their own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedStats {
    pub max_health: f32,
    pub evade_chance: i32,
    pub armor_rating: i32,
    pub total_damage_min: f32,
    pub total_damage_max: f32,
    pub weapon: WeaponProfile,
}

impl DerivedStats {
    /// All divisions are integer divisions: strength 7 contributes 3, not 3.5.
    /// Max health never drops below 1.
    pub fn compute(attributes: &Attributes, weapon: &WeaponProfile) -> Self {
        let strength_bonus = attributes.strength / 2;
        let evade_chance = attributes
            .dexterity
            .saturating_add(attributes.intelligence / 2);
        let max_health = attributes.vitality.saturating_add(strength_bonus).max(1);

        Self {
            max_health: max_health as f32,
            evade_chance,
            armor_rating: evade_chance,
            total_damage_min: weapon.damage_min + strength_bonus as f32,
            total_damage_max: weapon.damage_max + strength_bonus as f32,
            weapon: *weapon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UNARMED;

    #[test]
    fn test_unarmed_derived_stats() {
        let attributes = Attributes::new(10, 12, 8, 14);
        let derived = DerivedStats::compute(&attributes, &UNARMED);

        assert_eq!(derived.max_health, 19.0);
        assert_eq!(derived.evade_chance, 16);
        assert_eq!(derived.armor_rating, 16);
        assert_eq!(derived.total_damage_min, 6.0);
        assert_eq!(derived.total_damage_max, 9.0);
    }

    #[test]
    fn test_odd_attributes_floor() {
        // 7 / 2 == 3 and 9 / 2 == 4
        let attributes = Attributes::new(7, 5, 9, 10);
        let derived = DerivedStats::compute(&attributes, &UNARMED);

        assert_eq!(derived.max_health, 13.0);
        assert_eq!(derived.evade_chance, 9);
        assert_eq!(derived.total_damage_min, 4.0);
    }

    #[test]
    fn test_grant_validation() {
        assert!(StatGrant::new(1, 0, 2, 0).is_valid());
        assert!(!StatGrant::new(0, -1, 0, 0).is_valid());
    }

    #[test]
    fn test_grant_respects_attribute_cap() {
        let attributes = Attributes::new(10, 12, 8, 14);

        let raised = attributes.with_grant(&StatGrant::new(2, 0, 0, 1)).unwrap();
        assert_eq!(raised, Attributes::new(12, 12, 8, 15));

        let to_cap = StatGrant::new(ATTRIBUTE_CAP - 10, 0, 0, 0);
        assert_eq!(attributes.with_grant(&to_cap).unwrap().strength, ATTRIBUTE_CAP);

        assert_eq!(attributes.with_grant(&StatGrant::new(0, 0, 0, i32::MAX)), None);
        assert_eq!(
            attributes.with_grant(&StatGrant::new(0, ATTRIBUTE_CAP, 0, 0)),
            None
        );
    }

    #[test]
    fn test_extreme_attributes_do_not_overflow() {
        let attributes = Attributes::new(i32::MAX, i32::MAX, i32::MAX, i32::MAX);
        let derived = DerivedStats::compute(&attributes, &UNARMED);
        assert_eq!(derived.max_health, i32::MAX as f32);
        assert_eq!(derived.evade_chance, i32::MAX);

        let drained = Attributes::new(1, 1, 1, -40);
        assert_eq!(DerivedStats::compute(&drained, &UNARMED).max_health, 1.0);
    }
}
