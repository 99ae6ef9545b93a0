//! Authoritative combat state of a single entity.

use log::warn;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tokio::task::AbortHandle;

use skirmish_shared::{
    Attributes, CombatSnapshot, DerivedStats, EntityId, ItemEntry, LifeState, StatGrant,
    WeaponProfile, STAT_MAX, STAT_MIN, UNARMED,
};

/// Rejected state transitions
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CombatError {
    #[error("entity is already dead")]
    AlreadyDead,
    #[error("entity is not dead")]
    NotDead,
    #[error("invalid amount {0}")]
    InvalidAmount(f32),
}

/// Identifier of a running damage-over-time effect
pub type EffectId = u64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageOutcome {
    pub amount: f32,
    pub new_health: f32,
    pub killed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealOutcome {
    /// Health actually restored after the ceiling was applied
    pub healed: f32,
    pub new_health: f32,
}

#[derive(Debug)]
struct ActiveEffect {
    id: EffectId,
    handle: AbortHandle,
}

/// Resource pools, derived stats and alive/dead lifecycle of one combatant.
///
/// Derived stats are always recomputed from attributes and the equipped item;
/// every mutator ends with health clamped to `[0, max_health]`.
#[derive(Debug)]
pub struct CombatState {
    attributes: Attributes,
    equipped: Option<ItemEntry>,
    derived: DerivedStats,
    current_health: f32,
    life_state: LifeState,
    attack_timer: f32,
    initialized: bool,
    effects: Vec<ActiveEffect>,
    next_effect_id: EffectId,
    rng: StdRng,
}

impl CombatState {
    /// Blank state with unset attributes. Call `initialize_stats` before use.
    pub fn new(seed: u64) -> Self {
        let attributes = Attributes::unset();
        Self {
            attributes,
            equipped: None,
            derived: DerivedStats::compute(&attributes, &UNARMED),
            current_health: 0.0,
            life_state: LifeState::Alive,
            attack_timer: 0.0,
            initialized: false,
            effects: Vec::new(),
            next_effect_id: 1,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create an initialized, alive state at full health
    pub fn spawn(seed: u64, attributes: Attributes) -> Self {
        let mut state = Self::new(seed);
        state.initialize_stats(attributes);
        state
    }

    /// Set base attributes and compute derived stats.
    ///
    /// Non-zero values in `explicit` win, clamped to `[STAT_MIN, STAT_MAX]`;
    /// attributes that are still unset are rolled in the same range. Only the first call fills health;
    /// later calls keep current health and clamp it to the new maximum.
    pub fn initialize_stats(&mut self, explicit: Attributes) {
        let current = self.attributes;
        let rng = &mut self.rng;

        self.attributes = Attributes::new(
            pick_attribute(rng, explicit.strength, current.strength),
            pick_attribute(rng, explicit.dexterity, current.dexterity),
            pick_attribute(rng, explicit.intelligence, current.intelligence),
            pick_attribute(rng, explicit.vitality, current.vitality),
        );
        self.recompute_derived_stats();

        if !self.initialized {
            self.initialized = true;
            self.current_health = self.derived.max_health;
            self.life_state = LifeState::Alive;
        }
    }

    /// Swap the equipped item, returning the previous one.
    /// The attack timer keeps its progress, capped at the new delay.
    pub fn equip_weapon(&mut self, item: Option<ItemEntry>) -> Option<ItemEntry> {
        let previous = std::mem::replace(&mut self.equipped, item);
        self.recompute_derived_stats();
        previous
    }

    /// Raise base attributes. Derived stats follow immediately.
    pub fn grant_stats(&mut self, grant: &StatGrant) -> Result<(), CombatError> {
        let deltas = [grant.strength, grant.dexterity, grant.intelligence, grant.vitality];
        if !grant.is_valid() {
            let lowest = deltas.into_iter().min().unwrap_or_default();
            return Err(CombatError::InvalidAmount(lowest as f32));
        }

        let Some(attributes) = self.attributes.with_grant(grant) else {
            let highest = deltas.into_iter().max().unwrap_or_default();
            return Err(CombatError::InvalidAmount(highest as f32));
        };
        self.attributes = attributes;
        self.recompute_derived_stats();
        Ok(())
    }

    pub fn recompute_derived_stats(&mut self) {
        let weapon = WeaponProfile::from_item(self.equipped.as_ref());
        self.derived = DerivedStats::compute(&self.attributes, &weapon);
        self.current_health = self.current_health.clamp(0.0, self.derived.max_health.max(0.0));
        self.attack_timer = self.attack_timer.clamp(0.0, self.attack_delay());
    }

    pub fn apply_damage(&mut self, amount: f32, _source: &str) -> Result<DamageOutcome, CombatError> {
        if self.is_dead() {
            return Err(CombatError::AlreadyDead);
        }
        validate_amount(amount)?;

        self.current_health = (self.current_health - amount).max(0.0);
        let killed = self.current_health <= 0.0;
        if killed {
            self.current_health = 0.0;
            self.life_state = LifeState::Dead;
            self.clear_effects();
        }

        Ok(DamageOutcome {
            amount,
            new_health: self.current_health,
            killed,
        })
    }

    /// Returns `Ok(None)` without touching anything when the entity is dead.
    pub fn apply_heal(&mut self, amount: f32, _source: &str) -> Result<Option<HealOutcome>, CombatError> {
        validate_amount(amount)?;
        if self.is_dead() {
            return Ok(None);
        }

        let before = self.current_health;
        self.current_health = (before + amount).min(self.derived.max_health);

        Ok(Some(HealOutcome {
            healed: self.current_health - before,
            new_health: self.current_health,
        }))
    }

    /// Hit/miss for display purposes: a roll at or above the armor rating hits.
    /// Not a source of authoritative randomness.
    pub fn report_attack_outcome(&self, roll: f32) -> bool {
        roll >= self.derived.armor_rating as f32
    }

    /// Bring a dead entity back at full health. Returns the restored health.
    pub fn respawn(&mut self) -> Result<f32, CombatError> {
        if !self.is_dead() {
            return Err(CombatError::NotDead);
        }

        self.clear_effects();
        self.current_health = self.derived.max_health;
        self.life_state = LifeState::Alive;
        Ok(self.current_health)
    }

    /// Advance attack readiness by `delta` seconds
    pub fn tick(&mut self, delta: f32) {
        if !delta.is_finite() {
            return;
        }
        self.attack_timer = (self.attack_timer + delta).clamp(0.0, self.attack_delay());
    }

    pub fn is_attack_ready(&self) -> bool {
        !self.is_dead() && self.attack_timer >= self.attack_delay()
    }

    /// Consume attack readiness. Returns false if the timer has not run out.
    pub fn try_begin_attack(&mut self) -> bool {
        if !self.is_attack_ready() {
            return false;
        }
        self.attack_timer = 0.0;
        true
    }

    /// Sample this entity's total damage range, rounded to a whole number
    pub fn roll_damage(&mut self) -> f32 {
        sample_damage(
            &mut self.rng,
            self.derived.total_damage_min,
            self.derived.total_damage_max,
        )
    }

    /// Independent RNG for work that outlives a borrow of this state
    pub fn fork_rng(&mut self) -> StdRng {
        StdRng::seed_from_u64(self.rng.gen())
    }

    pub(crate) fn next_effect_id(&mut self) -> EffectId {
        let id = self.next_effect_id;
        self.next_effect_id += 1;
        id
    }

    pub(crate) fn track_effect(&mut self, id: EffectId, handle: AbortHandle) {
        self.effects.retain(|effect| !effect.handle.is_finished());
        self.effects.push(ActiveEffect { id, handle });
    }

    /// Drop bookkeeping for an effect that finished on its own
    pub(crate) fn forget_effect(&mut self, id: EffectId) {
        self.effects.retain(|effect| effect.id != id);
    }

    /// Abort one effect. Returns false if it was not running.
    pub fn cancel_effect(&mut self, id: EffectId) -> bool {
        match self.effects.iter().position(|effect| effect.id == id) {
            Some(index) => {
                let effect = self.effects.swap_remove(index);
                effect.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every pending effect, returning how many were cancelled
    pub fn clear_effects(&mut self) -> usize {
        let count = self.effects.len();
        for effect in self.effects.drain(..) {
            effect.handle.abort();
        }
        count
    }

    pub fn active_effects(&self) -> usize {
        self.effects
            .iter()
            .filter(|effect| !effect.handle.is_finished())
            .count()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn derived(&self) -> &DerivedStats {
        &self.derived
    }

    pub fn equipped(&self) -> Option<&ItemEntry> {
        self.equipped.as_ref()
    }

    pub fn current_health(&self) -> f32 {
        self.current_health
    }

    pub fn max_health(&self) -> f32 {
        self.derived.max_health
    }

    pub fn life_state(&self) -> LifeState {
        self.life_state
    }

    pub fn is_dead(&self) -> bool {
        self.life_state == LifeState::Dead
    }

    pub fn attack_timer(&self) -> f32 {
        self.attack_timer
    }

    fn attack_delay(&self) -> f32 {
        // f32::max also maps a NaN delay to 0
        self.derived.weapon.attack_delay.max(0.0)
    }

    pub fn snapshot(&self, entity_id: EntityId, name: &str) -> CombatSnapshot {
        CombatSnapshot {
            entity_id,
            name: name.to_string(),
            attributes: self.attributes,
            derived: self.derived,
            equipped_item_id: self.equipped.as_ref().map(|item| item.id),
            current_health: self.current_health,
            life_state: self.life_state,
            attack_timer: self.attack_timer,
            active_effects: self.active_effects(),
        }
    }
}

fn pick_attribute(rng: &mut StdRng, explicit: i32, current: i32) -> i32 {
    if explicit != 0 {
        let clamped = explicit.clamp(STAT_MIN, STAT_MAX);
        if clamped != explicit {
            warn!("Attribute {} out of range, using {}", explicit, clamped);
        }
        clamped
    } else if current != 0 {
        current
    } else {
        rng.gen_range(STAT_MIN..=STAT_MAX)
    }
}

fn validate_amount(amount: f32) -> Result<(), CombatError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(CombatError::InvalidAmount(amount))
    }
}

/// Uniform sample in `[min, max]` rounded to the nearest integer
pub(crate) fn sample_damage<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> f32 {
    if max <= min {
        return min.round();
    }
    rng.gen_range(min..=max).round()
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_shared::{get_item_definitions, ATTRIBUTE_CAP};

    fn fighter() -> CombatState {
        CombatState::spawn(7, Attributes::new(10, 12, 8, 14))
    }

    fn item(id: u32) -> ItemEntry {
        get_item_definitions().into_iter().find(|i| i.id == id).unwrap()
    }

    #[test]
    fn test_spawn_at_full_health() {
        let state = fighter();
        assert_eq!(state.max_health(), 19.0);
        assert_eq!(state.current_health(), 19.0);
        assert_eq!(state.derived().armor_rating, 16);
        assert_eq!(state.derived().total_damage_min, 6.0);
        assert_eq!(state.derived().total_damage_max, 9.0);
        assert_eq!(state.life_state(), LifeState::Alive);
    }

    #[test]
    fn test_unset_attributes_are_rolled_in_range() {
        for seed in 0..50 {
            let state = CombatState::spawn(seed, Attributes::unset());
            let a = state.attributes();
            for value in [a.strength, a.dexterity, a.intelligence, a.vitality] {
                assert!((STAT_MIN..=STAT_MAX).contains(&value), "rolled {}", value);
            }
            assert_eq!(state.current_health(), state.max_health());
        }
    }

    #[test]
    fn test_partial_attributes_keep_explicit_values() {
        let state = CombatState::spawn(3, Attributes::new(11, 0, 0, 9));
        assert_eq!(state.attributes().strength, 11);
        assert_eq!(state.attributes().vitality, 9);
        assert!(state.attributes().is_fully_set());
    }

    #[test]
    fn test_explicit_attributes_are_clamped_to_range() {
        let state = CombatState::spawn(1, Attributes::new(-20, 5, 40, 5));
        assert_eq!(state.attributes(), &Attributes::new(STAT_MIN, 5, STAT_MAX, 5));
        // vit 5 + str 5 / 2
        assert_eq!(state.max_health(), 7.0);
        assert_eq!(state.current_health(), 7.0);
        assert!(!state.is_dead());
    }

    #[test]
    fn test_same_seed_rolls_same_attributes() {
        let a = CombatState::spawn(99, Attributes::unset());
        let b = CombatState::spawn(99, Attributes::unset());
        assert_eq!(a.attributes(), b.attributes());
    }

    #[test]
    fn test_reinitialize_after_damage_keeps_health() {
        let mut state = fighter();
        state.apply_damage(5.0, "test").unwrap();
        state.initialize_stats(Attributes::unset());
        assert_eq!(state.current_health(), 14.0);
        assert_eq!(state.attributes(), &Attributes::new(10, 12, 8, 14));
    }

    #[test]
    fn test_damage_below_health() {
        let mut state = fighter();
        let outcome = state.apply_damage(4.0, "test").unwrap();
        assert_eq!(outcome.new_health, 15.0);
        assert!(!outcome.killed);
        assert!(!state.is_dead());
    }

    #[test]
    fn test_lethal_damage_clamps_to_zero() {
        let mut state = fighter();
        let outcome = state.apply_damage(50.0, "test").unwrap();
        assert_eq!(outcome.new_health, 0.0);
        assert!(outcome.killed);
        assert!(state.is_dead());
    }

    #[test]
    fn test_exact_lethal_damage() {
        let mut state = fighter();
        let outcome = state.apply_damage(19.0, "test").unwrap();
        assert!(outcome.killed);
        assert_eq!(state.current_health(), 0.0);
    }

    #[test]
    fn test_damage_on_dead_entity_is_rejected() {
        let mut state = fighter();
        state.apply_damage(100.0, "test").unwrap();

        assert_eq!(state.apply_damage(1.0, "test"), Err(CombatError::AlreadyDead));
        assert_eq!(state.apply_damage(-1.0, "test"), Err(CombatError::AlreadyDead));
        assert_eq!(state.current_health(), 0.0);
        assert!(state.is_dead());
    }

    #[test]
    fn test_negative_amounts_are_rejected() {
        let mut state = fighter();
        assert_eq!(state.apply_damage(-3.0, "test"), Err(CombatError::InvalidAmount(-3.0)));
        assert_eq!(state.apply_heal(-3.0, "test"), Err(CombatError::InvalidAmount(-3.0)));
        assert!(state.apply_damage(f32::NAN, "test").is_err());
        assert_eq!(state.current_health(), 19.0);
    }

    #[test]
    fn test_heal_never_exceeds_max() {
        let mut state = fighter();
        state.apply_damage(3.0, "test").unwrap();

        let outcome = state.apply_heal(10.0, "potion").unwrap().unwrap();
        assert_eq!(outcome.healed, 3.0);
        assert_eq!(outcome.new_health, 19.0);

        let outcome = state.apply_heal(10.0, "potion").unwrap().unwrap();
        assert_eq!(outcome.healed, 0.0);
        assert_eq!(state.current_health(), 19.0);
    }

    #[test]
    fn test_heal_on_dead_entity_is_ignored() {
        let mut state = fighter();
        state.apply_damage(100.0, "test").unwrap();
        assert_eq!(state.apply_heal(5.0, "potion"), Ok(None));
        assert_eq!(state.current_health(), 0.0);
        assert!(state.is_dead());
    }

    #[test]
    fn test_respawn_restores_max_health() {
        let mut state = fighter();
        state.apply_damage(100.0, "test").unwrap();
        assert_eq!(state.respawn(), Ok(19.0));
        assert_eq!(state.current_health(), 19.0);
        assert!(!state.is_dead());
    }

    #[test]
    fn test_respawn_alive_entity_is_rejected() {
        let mut state = fighter();
        state.apply_damage(2.0, "test").unwrap();
        assert_eq!(state.respawn(), Err(CombatError::NotDead));
        assert_eq!(state.current_health(), 17.0);
    }

    #[test]
    fn test_grant_recomputes_derived_stats() {
        let mut state = fighter();
        state.grant_stats(&StatGrant::new(2, 0, 2, 3)).unwrap();

        // vit 17 + str 12 / 2
        assert_eq!(state.max_health(), 23.0);
        // dex 12 + int 10 / 2
        assert_eq!(state.derived().armor_rating, 17);
        assert_eq!(state.derived().total_damage_min, 7.0);
        // Health is not refilled by a grant
        assert_eq!(state.current_health(), 19.0);
    }

    #[test]
    fn test_negative_grant_is_rejected() {
        let mut state = fighter();
        assert_eq!(
            state.grant_stats(&StatGrant::new(1, -2, 0, 0)),
            Err(CombatError::InvalidAmount(-2.0))
        );
        assert_eq!(state.attributes(), &Attributes::new(10, 12, 8, 14));
    }

    #[test]
    fn test_oversized_grant_is_rejected() {
        let mut state = fighter();
        assert_eq!(
            state.grant_stats(&StatGrant::new(0, 0, 0, i32::MAX)),
            Err(CombatError::InvalidAmount(i32::MAX as f32))
        );
        assert_eq!(state.attributes(), &Attributes::new(10, 12, 8, 14));
        assert_eq!(state.max_health(), 19.0);

        state
            .grant_stats(&StatGrant::new(ATTRIBUTE_CAP - 10, 0, 0, ATTRIBUTE_CAP - 14))
            .unwrap();
        assert_eq!(state.max_health(), (ATTRIBUTE_CAP + ATTRIBUTE_CAP / 2) as f32);
        assert_eq!(state.current_health(), 19.0);
    }

    #[test]
    fn test_health_stays_in_bounds_for_any_amount() {
        let amounts = [0.0, 0.25, 1.0, 3.5, 7.0, 18.99, 19.0, 19.01, 250.0, f32::MAX];
        for damage in amounts {
            for heal in amounts {
                let mut state = fighter();
                let max = state.max_health();

                let outcome = state.apply_damage(damage, "test").unwrap();
                assert_eq!(outcome.new_health, (19.0 - damage).max(0.0));
                assert_eq!(state.is_dead(), state.current_health() == 0.0);

                match state.apply_heal(heal, "test").unwrap() {
                    Some(outcome) => {
                        assert!(!state.is_dead());
                        assert_eq!(outcome.new_health, (19.0 - damage + heal).min(max));
                    }
                    None => assert!(state.is_dead()),
                }
                assert!((0.0..=max).contains(&state.current_health()));
            }
        }
    }

    #[test]
    fn test_equip_weapon_updates_damage() {
        let mut state = fighter();
        assert_eq!(state.equip_weapon(Some(item(3))), None);

        assert_eq!(state.derived().total_damage_min, 12.0);
        assert_eq!(state.derived().total_damage_max, 17.0);
        assert_eq!(state.derived().weapon.attack_delay, 1.6);

        let previous = state.equip_weapon(None).unwrap();
        assert_eq!(previous.id, 3);
        assert_eq!(state.derived().weapon, UNARMED);
    }

    #[test]
    fn test_equip_keeps_attack_timer_within_delay() {
        let mut state = fighter();
        state.equip_weapon(Some(item(3)));
        state.tick(1.2);
        assert_eq!(state.attack_timer(), 1.2);

        // Unarmed delay is 0.75
        state.equip_weapon(None);
        assert_eq!(state.attack_timer(), 0.75);
    }

    #[test]
    fn test_tick_never_exceeds_attack_delay() {
        let mut state = fighter();
        for _ in 0..100 {
            state.tick(0.05);
            assert!(state.attack_timer() <= 0.75);
        }
        assert_eq!(state.attack_timer(), 0.75);

        state.tick(-10.0);
        assert_eq!(state.attack_timer(), 0.0);
    }

    #[test]
    fn test_attack_readiness() {
        let mut state = fighter();
        assert!(!state.try_begin_attack());
        state.tick(1.0);
        assert!(state.try_begin_attack());
        assert_eq!(state.attack_timer(), 0.0);
        assert!(!state.is_attack_ready());
    }

    #[test]
    fn test_attack_outcome_against_armor() {
        let state = fighter();
        assert!(state.report_attack_outcome(16.0));
        assert!(state.report_attack_outcome(20.0));
        assert!(!state.report_attack_outcome(15.9));
    }

    #[test]
    fn test_rolled_damage_within_total_range() {
        let mut state = fighter();
        for _ in 0..100 {
            let damage = state.roll_damage();
            assert!((6.0..=9.0).contains(&damage));
            assert_eq!(damage, damage.round());
        }
    }

    #[test]
    fn test_snapshot_mirrors_state() {
        let mut state = fighter();
        state.equip_weapon(Some(item(1)));
        state.apply_damage(4.0, "test").unwrap();

        let snapshot = state.snapshot(12, "Aldric");
        assert_eq!(snapshot.entity_id, 12);
        assert_eq!(snapshot.name, "Aldric");
        assert_eq!(snapshot.current_health, 15.0);
        assert_eq!(snapshot.equipped_item_id, Some(1));
        assert!(!snapshot.is_dead());
        assert_eq!(snapshot.active_effects, 0);
    }
}
