//! Shared handle to one entity's combat state.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::Mutex;

use skirmish_shared::{
    Attributes, CombatEvent, CombatSnapshot, DamageOverTime, EntityId, ItemEntry, StatGrant,
    MAX_EFFECT_DURATION,
};

use super::combat_state::{CombatError, CombatState, DamageOutcome, EffectId, HealOutcome};
use super::damage_over_time;
use crate::replication::EventSink;

/// Cloneable handle to a combatant.
///
/// The mutex makes this handle the single writer of the entity's state; every
/// mutation is followed by a `StateChanged` event on the sink.
#[derive(Clone)]
pub struct Combatant {
    id: EntityId,
    name: Arc<str>,
    state: Arc<Mutex<CombatState>>,
    sink: Arc<dyn EventSink>,
}

impl fmt::Debug for Combatant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Combatant")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Combatant {
    pub fn new(id: EntityId, name: &str, state: CombatState, sink: Arc<dyn EventSink>) -> Self {
        let combatant = Self {
            id,
            name: Arc::from(name),
            state: Arc::new(Mutex::new(state)),
            sink,
        };
        // Nothing else can hold the lock yet
        if let Ok(state) = combatant.state.try_lock() {
            combatant.publish_state(&state);
        }
        combatant
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn snapshot(&self) -> CombatSnapshot {
        self.state.lock().await.snapshot(self.id, &self.name)
    }

    pub async fn is_dead(&self) -> bool {
        self.state.lock().await.is_dead()
    }

    fn publish_state(&self, state: &CombatState) {
        self.sink
            .publish(CombatEvent::StateChanged(state.snapshot(self.id, &self.name)));
    }

    pub async fn initialize_stats(&self, explicit: Attributes) {
        let mut state = self.state.lock().await;
        state.initialize_stats(explicit);
        self.publish_state(&state);
    }

    /// Returns the previously equipped item
    pub async fn equip_weapon(&self, item: Option<ItemEntry>) -> Option<ItemEntry> {
        let mut state = self.state.lock().await;
        match &item {
            Some(item) => debug!("{} equipped {}", self.name, item.name),
            None => debug!("{} unequipped their weapon", self.name),
        }
        let previous = state.equip_weapon(item);
        self.publish_state(&state);
        previous
    }

    pub async fn grant_stats(&self, grant: StatGrant) -> Result<(), CombatError> {
        let mut state = self.state.lock().await;
        state.grant_stats(&grant)?;
        info!("Updated stats of {}: {:?}", self.name, state.attributes());
        self.publish_state(&state);
        Ok(())
    }

    pub async fn recompute_derived_stats(&self) {
        let mut state = self.state.lock().await;
        state.recompute_derived_stats();
        self.publish_state(&state);
    }

    pub async fn apply_damage(&self, amount: f32, source: &str) -> Result<DamageOutcome, CombatError> {
        let mut state = self.state.lock().await;
        let outcome = match state.apply_damage(amount, source) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("{} is trying to deal {} damage to {}: {}", source, amount, self.name, e);
                return Err(e);
            }
        };

        debug!(
            "{} took {} damage from \"{}\" ({} / {})",
            self.name,
            outcome.amount,
            source,
            outcome.new_health,
            state.max_health()
        );
        self.sink.publish(CombatEvent::DamageTaken {
            target_id: self.id,
            amount: outcome.amount,
            new_health: outcome.new_health,
            killed: outcome.killed,
            source: source.to_string(),
        });

        if outcome.killed {
            info!("{} was killed by \"{}\"", self.name, source);
            self.sink.publish(CombatEvent::Death {
                entity_id: self.id,
                source: source.to_string(),
            });
        }

        self.publish_state(&state);
        Ok(outcome)
    }

    /// `Ok(None)` means the target was dead and nothing happened
    pub async fn apply_heal(&self, amount: f32, source: &str) -> Result<Option<HealOutcome>, CombatError> {
        let mut state = self.state.lock().await;
        let outcome = match state.apply_heal(amount, source)? {
            Some(outcome) => outcome,
            None => {
                warn!("{} is trying to heal {} for {}, but they are dead", source, self.name, amount);
                return Ok(None);
            }
        };

        debug!(
            "{} has been healed for {} by {} ({} / {})",
            self.name,
            outcome.healed,
            source,
            outcome.new_health,
            state.max_health()
        );
        self.sink.publish(CombatEvent::Healed {
            target_id: self.id,
            amount: outcome.healed,
            new_health: outcome.new_health,
            source: source.to_string(),
        });
        self.publish_state(&state);
        Ok(Some(outcome))
    }

    /// Decide hit or miss against this entity's armor and emit the popup event
    pub async fn report_attack_outcome(&self, attacker_id: EntityId, roll: f32, damage: f32) -> bool {
        let hit = self.state.lock().await.report_attack_outcome(roll);
        self.sink.publish(CombatEvent::AttackReported {
            attacker_id,
            target_id: self.id,
            hit,
            damage,
        });
        hit
    }

    /// Returns the restored health
    pub async fn respawn(&self) -> Result<f32, CombatError> {
        let mut state = self.state.lock().await;
        let health = match state.respawn() {
            Ok(health) => health,
            Err(e) => {
                warn!("{} is trying to respawn: {}", self.name, e);
                return Err(e);
            }
        };

        info!("{} respawned with {} health", self.name, health);
        self.sink.publish(CombatEvent::Respawn {
            entity_id: self.id,
            health,
        });
        self.publish_state(&state);
        Ok(health)
    }

    pub async fn tick(&self, delta: f32) {
        self.state.lock().await.tick(delta);
    }

    /// Consume attack readiness and roll damage.
    /// `Ok(None)` while the attack timer is still running.
    pub async fn try_begin_attack(&self) -> Result<Option<f32>, CombatError> {
        let mut state = self.state.lock().await;
        if state.is_dead() {
            return Err(CombatError::AlreadyDead);
        }
        if !state.try_begin_attack() {
            return Ok(None);
        }
        Ok(Some(state.roll_damage()))
    }

    pub async fn start_damage_over_time(
        &self,
        effect: DamageOverTime,
        source: &str,
    ) -> Result<EffectId, CombatError> {
        if !effect.is_valid() {
            return Err(CombatError::InvalidAmount(invalid_field(&effect)));
        }
        let period = Duration::try_from_secs_f32(effect.interval)
            .map_err(|_| CombatError::InvalidAmount(effect.interval))?;

        let mut state = self.state.lock().await;
        if state.is_dead() {
            warn!("Cannot apply {} to {}: they are dead", source, self.name);
            return Err(CombatError::AlreadyDead);
        }

        let effect_id = state.next_effect_id();
        let task = tokio::spawn(damage_over_time::run(
            self.clone(),
            effect_id,
            effect,
            period,
            source.to_string(),
            state.fork_rng(),
        ));
        state.track_effect(effect_id, task.abort_handle());

        info!(
            "{} afflicted {} for {}s ({} ticks of {}-{})",
            source,
            self.name,
            effect.duration,
            effect.ticks(),
            effect.damage_min,
            effect.damage_max
        );
        self.publish_state(&state);
        Ok(effect_id)
    }

    /// Returns false if the effect already ended
    pub async fn cancel_damage_over_time(&self, effect_id: EffectId) -> bool {
        let mut state = self.state.lock().await;
        let cancelled = state.cancel_effect(effect_id);
        if cancelled {
            self.publish_state(&state);
        }
        cancelled
    }

    /// Abort every running effect (used when the entity leaves the world)
    pub async fn clear_effects(&self) -> usize {
        self.state.lock().await.clear_effects()
    }

    pub(crate) async fn forget_effect(&self, effect_id: EffectId) {
        let mut state = self.state.lock().await;
        state.forget_effect(effect_id);
        self.publish_state(&state);
    }
}

/// First out-of-range field of an invalid effect, for the error message
fn invalid_field(effect: &DamageOverTime) -> f32 {
    if !(effect.damage_min.is_finite() && effect.damage_min >= 0.0) {
        effect.damage_min
    } else if !(effect.damage_max.is_finite() && effect.damage_max >= effect.damage_min) {
        effect.damage_max
    } else if !(effect.duration > 0.0 && effect.duration <= MAX_EFFECT_DURATION) {
        effect.duration
    } else {
        effect.interval
    }
}
