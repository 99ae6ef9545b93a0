//! Messages exchanged between the combat server and its host/observers.

use serde::{Deserialize, Serialize};

use crate::{Attributes, DamageOverTime, DerivedStats, StatGrant};

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Server tick rate in Hz
pub const SERVER_TICK_RATE: u32 = 20;

/// Entity identifier assigned by the world
pub type EntityId = u64;

/// Lifecycle of a combatant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifeState {
    Alive,
    Dead,
}

/// Replicated view of one combatant's mutable fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSnapshot {
    pub entity_id: EntityId,
    pub name: String,
    pub attributes: Attributes,
    pub derived: DerivedStats,
    pub equipped_item_id: Option<u32>,
    pub current_health: f32,
    pub life_state: LifeState,
    pub attack_timer: f32,
    pub active_effects: usize,
}

impl CombatSnapshot {
    pub fn is_dead(&self) -> bool {
        self.life_state == LifeState::Dead
    }
}

// =============================================================================
// Commands (host -> server)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatCommand {
    /// Attacker reports a roll and the damage it would deal
    ReportAttack {
        attacker_id: EntityId,
        target_id: EntityId,
        roll: f32,
        damage: f32,
        source: String,
    },

    /// Server rolls the attacker's damage, gated on its attack timer
    Strike {
        attacker_id: EntityId,
        target_id: EntityId,
        roll: f32,
    },

    ReportHeal {
        target_id: EntityId,
        amount: f32,
        source: String,
    },

    RequestRespawn {
        target_id: EntityId,
    },

    AddStats {
        target_id: EntityId,
        grant: StatGrant,
    },

    /// `None` unequips
    EquipItem {
        target_id: EntityId,
        item_id: Option<u32>,
    },

    ApplyDamageOverTime {
        target_id: EntityId,
        effect: DamageOverTime,
        source: String,
    },

    QueryStatus {
        target_id: EntityId,
    },
}

// =============================================================================
// Events (server -> observers)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// Hit/miss popup for the presentation layer
    AttackReported {
        attacker_id: EntityId,
        target_id: EntityId,
        hit: bool,
        damage: f32,
    },

    DamageTaken {
        target_id: EntityId,
        amount: f32,
        new_health: f32,
        killed: bool,
        source: String,
    },

    Healed {
        target_id: EntityId,
        amount: f32,
        new_health: f32,
        source: String,
    },

    Death {
        entity_id: EntityId,
        source: String,
    },

    Respawn {
        entity_id: EntityId,
        health: f32,
    },

    /// Health, life state or derived stats changed
    StateChanged(CombatSnapshot),
}

impl CombatEvent {
    /// The entity this event is about
    pub fn entity_id(&self) -> EntityId {
        match self {
            Self::AttackReported { target_id, .. }
            | Self::DamageTaken { target_id, .. }
            | Self::Healed { target_id, .. } => *target_id,
            Self::Death { entity_id, .. } | Self::Respawn { entity_id, .. } => *entity_id,
            Self::StateChanged(snapshot) => snapshot.entity_id,
        }
    }

    /// Death and respawn must reach observers; the rest can be superseded
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Death { .. } | Self::Respawn { .. })
    }
}

// =============================================================================
// Serialization helpers
// =============================================================================

impl CombatCommand {
    pub fn serialize(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

impl CombatEvent {
    pub fn serialize(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}
