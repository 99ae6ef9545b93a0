//! Game world management.
//!
//! The world resolves entity ids to combatant handles and routes
//! cross-entity actions (attacker -> target) through the target's own
//! operations.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use skirmish_shared::{
    get_item_definitions, Attributes, CombatSnapshot, DamageOverTime, EntityId, ItemEntry,
    StatGrant,
};

use crate::entities::{CombatError, CombatState, Combatant, DamageOutcome, EffectId, HealOutcome};
use crate::replication::EventSink;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("no entity with id {0}")]
    UnknownEntity(EntityId),
    #[error("no item with id {0}")]
    UnknownItem(u32),
    #[error("entity {0} is not ready to attack")]
    AttackNotReady(EntityId),
    #[error(transparent)]
    Combat(#[from] CombatError),
}

/// What happened when an attack was resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackResolution {
    /// Popup flag from the target's armor check
    pub hit: bool,
    pub damage: f32,
    pub outcome: DamageOutcome,
}

/// The game world containing all combatants
pub struct GameWorld {
    combatants: HashMap<EntityId, Combatant>,
    next_entity_id: EntityId,
    /// Item definitions used to resolve equip requests
    pub items: HashMap<u32, ItemEntry>,
    sink: Arc<dyn EventSink>,
    rng: StdRng,
}

impl GameWorld {
    pub fn new(items: HashMap<u32, ItemEntry>, sink: Arc<dyn EventSink>, seed: u64) -> Self {
        Self {
            combatants: HashMap::new(),
            next_entity_id: 1,
            items,
            sink,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// World using the built-in item table
    pub fn with_default_items(sink: Arc<dyn EventSink>, seed: u64) -> Self {
        let items = get_item_definitions()
            .into_iter()
            .map(|item| (item.id, item))
            .collect();
        Self::new(items, sink, seed)
    }

    /// Spawn a combatant. Zero attributes are rolled.
    pub fn spawn_combatant(&mut self, name: &str, attributes: Attributes) -> Combatant {
        let id = self.next_entity_id;
        self.next_entity_id += 1;

        let state = CombatState::spawn(self.rng.gen(), attributes);
        info!(
            "Spawned {} (#{}) with {:?}, {} health",
            name,
            id,
            state.attributes(),
            state.max_health()
        );

        let combatant = Combatant::new(id, name, state, self.sink.clone());
        self.combatants.insert(id, combatant.clone());
        combatant
    }

    /// Remove a combatant, cancelling anything still ticking on it
    pub async fn despawn(&mut self, id: EntityId) -> Option<Combatant> {
        let combatant = self.combatants.remove(&id)?;
        let cancelled = combatant.clear_effects().await;
        info!("Despawned {} (#{}), {} effects cancelled", combatant.name(), id, cancelled);
        Some(combatant)
    }

    pub fn get(&self, id: EntityId) -> Option<&Combatant> {
        self.combatants.get(&id)
    }

    /// Handle to the combatant with this id
    pub fn resolve(&self, id: EntityId) -> Result<Combatant, WorldError> {
        self.combatants
            .get(&id)
            .cloned()
            .ok_or(WorldError::UnknownEntity(id))
    }

    pub fn item(&self, id: u32) -> Result<ItemEntry, WorldError> {
        self.items.get(&id).cloned().ok_or(WorldError::UnknownItem(id))
    }

    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }

    /// Sorted entity ids
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.combatants.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// An attacker reports its roll and damage. The roll only decides the
    /// hit or miss popup; the reported damage is always applied.
    pub async fn report_attack(
        &self,
        attacker_id: EntityId,
        target_id: EntityId,
        roll: f32,
        damage: f32,
        source: &str,
    ) -> Result<AttackResolution, WorldError> {
        let attacker = self.resolve(attacker_id)?;
        let target = self.resolve(target_id)?;

        if attacker.is_dead().await || target.is_dead().await {
            return Err(CombatError::AlreadyDead.into());
        }
        if !(damage.is_finite() && damage >= 0.0) {
            return Err(CombatError::InvalidAmount(damage).into());
        }

        let hit = target.report_attack_outcome(attacker_id, roll, damage).await;
        debug!(
            "{} attacks {} (roll {}, {})",
            attacker.name(),
            target.name(),
            roll,
            if hit { "hit" } else { "miss" }
        );

        let outcome = target.apply_damage(damage, source).await?;
        if outcome.killed {
            info!("{} was killed by {}", target.name(), attacker.name());
        }

        Ok(AttackResolution {
            hit,
            damage,
            outcome,
        })
    }

    /// Server-side attack: the attacker's timer must be ready, and the
    /// damage comes from the attacker's own damage range.
    pub async fn strike(
        &self,
        attacker_id: EntityId,
        target_id: EntityId,
        roll: f32,
    ) -> Result<AttackResolution, WorldError> {
        let attacker = self.resolve(attacker_id)?;
        self.resolve(target_id)?;

        let damage = attacker
            .try_begin_attack()
            .await?
            .ok_or(WorldError::AttackNotReady(attacker_id))?;

        self.report_attack(attacker_id, target_id, roll, damage, attacker.name())
            .await
    }

    pub async fn report_heal(
        &self,
        target_id: EntityId,
        amount: f32,
        source: &str,
    ) -> Result<Option<HealOutcome>, WorldError> {
        let target = self.resolve(target_id)?;
        Ok(target.apply_heal(amount, source).await?)
    }

    /// Returns the restored health
    pub async fn request_respawn(&self, target_id: EntityId) -> Result<f32, WorldError> {
        let target = self.resolve(target_id)?;
        Ok(target.respawn().await?)
    }

    pub async fn add_stats(
        &self,
        target_id: EntityId,
        grant: StatGrant,
    ) -> Result<CombatSnapshot, WorldError> {
        let target = self.resolve(target_id)?;
        target.grant_stats(grant).await?;
        Ok(target.snapshot().await)
    }

    /// Equip an item by id (`None` unequips). Returns the previous item.
    pub async fn equip_item(
        &self,
        target_id: EntityId,
        item_id: Option<u32>,
    ) -> Result<Option<ItemEntry>, WorldError> {
        let target = self.resolve(target_id)?;
        let item = item_id.map(|id| self.item(id)).transpose()?;
        Ok(target.equip_weapon(item).await)
    }

    pub async fn apply_damage_over_time(
        &self,
        target_id: EntityId,
        effect: DamageOverTime,
        source: &str,
    ) -> Result<EffectId, WorldError> {
        let target = self.resolve(target_id)?;
        Ok(target.start_damage_over_time(effect, source).await?)
    }

    pub async fn cancel_damage_over_time(
        &self,
        target_id: EntityId,
        effect_id: EffectId,
    ) -> Result<bool, WorldError> {
        let target = self.resolve(target_id)?;
        Ok(target.cancel_damage_over_time(effect_id).await)
    }

    /// Update the world (called every tick)
    pub async fn update(&self, delta: f32) {
        join_all(self.combatants.values().map(|combatant| combatant.tick(delta))).await;
    }

    /// Snapshots of every combatant, ordered by id
    pub async fn snapshots(&self) -> Vec<CombatSnapshot> {
        let mut snapshots =
            join_all(self.combatants.values().map(|combatant| combatant.snapshot())).await;
        snapshots.sort_unstable_by_key(|snapshot| snapshot.entity_id);
        snapshots
    }
}
