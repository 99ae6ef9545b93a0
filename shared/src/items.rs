//! Item definitions shared between client and server.

use serde::{Deserialize, Serialize};

/// A fully resolved item as handed to the combat core by the inventory layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEntry {
    pub id: u32,
    pub name: String,
    pub damage_min: f32,
    pub damage_max: f32,
    pub weapon_range: f32,
    /// Seconds between attacks
    pub attack_delay: f32,
    pub crit_modifier: f32,
}

impl ItemEntry {
    /// An entry only counts as a weapon when both damage bounds are set
    pub fn is_weapon(&self) -> bool {
        self.damage_min != 0.0 && self.damage_max != 0.0
    }
}

/// Weapon-derived combat fields
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeaponProfile {
    pub range: f32,
    pub damage_min: f32,
    pub damage_max: f32,
    pub attack_delay: f32,
    pub crit_modifier: f32,
}

/// Fists
pub const UNARMED: WeaponProfile = WeaponProfile {
    range: 1.0,
    damage_min: 1.0,
    damage_max: 4.0,
    attack_delay: 0.75,
    crit_modifier: 1.0,
};

impl Default for WeaponProfile {
    fn default() -> Self {
        UNARMED
    }
}

impl WeaponProfile {
    /// Build the profile for whatever is equipped, falling back to unarmed
    pub fn from_item(item: Option<&ItemEntry>) -> Self {
        match item {
            Some(item) if item.is_weapon() => Self {
                range: item.weapon_range,
                damage_min: item.damage_min,
                damage_max: item.damage_max,
                attack_delay: item.attack_delay,
                crit_modifier: item.crit_modifier,
            },
            _ => UNARMED,
        }
    }
}

/// Built-in item definitions for the prototype
pub fn get_item_definitions() -> Vec<ItemEntry> {
    vec![
        ItemEntry {
            id: 1,
            name: "Rusty Sword".into(),
            damage_min: 2.0,
            damage_max: 5.0,
            weapon_range: 1.5,
            attack_delay: 0.8,
            crit_modifier: 1.5,
        },
        ItemEntry {
            id: 2,
            name: "Iron Sword".into(),
            damage_min: 4.0,
            damage_max: 8.0,
            weapon_range: 1.5,
            attack_delay: 0.9,
            crit_modifier: 1.5,
        },
        ItemEntry {
            id: 3,
            name: "Warhammer".into(),
            damage_min: 7.0,
            damage_max: 12.0,
            weapon_range: 1.8,
            attack_delay: 1.6,
            crit_modifier: 2.0,
        },
        ItemEntry {
            id: 4,
            name: "Hunting Bow".into(),
            damage_min: 3.0,
            damage_max: 6.0,
            weapon_range: 12.0,
            attack_delay: 1.2,
            crit_modifier: 1.75,
        },
        // Not a weapon: equipping it leaves the wearer unarmed
        ItemEntry {
            id: 5,
            name: "Torch".into(),
            damage_min: 0.0,
            damage_max: 0.0,
            weapon_range: 1.0,
            attack_delay: 1.0,
            crit_modifier: 1.0,
        },
    ]
}
