//! Server-side combat entities.

pub mod combat_state;
mod combatant;
mod damage_over_time;

pub use combat_state::{CombatError, CombatState, DamageOutcome, EffectId, HealOutcome};
pub use combatant::Combatant;
