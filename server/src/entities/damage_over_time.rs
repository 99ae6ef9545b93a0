//! Damage-over-time task.
//!
//! One tokio task per effect. The task's abort handle is tracked by the
//! target's `CombatState`, which aborts it on death and on respawn.

use std::time::Duration;

use log::debug;
use rand::rngs::StdRng;

use skirmish_shared::DamageOverTime;

use super::combat_state::{sample_damage, EffectId};
use super::Combatant;

/// Sleep `interval`, hit, repeat `ceil(duration / interval)` times
pub(crate) async fn run(
    target: Combatant,
    effect_id: EffectId,
    effect: DamageOverTime,
    period: Duration,
    source: String,
    mut rng: StdRng,
) {
    let ticks = effect.ticks();

    for tick in 1..=ticks {
        tokio::time::sleep(period).await;

        let damage = sample_damage(&mut rng, effect.damage_min, effect.damage_max);
        match target.apply_damage(damage, &source).await {
            Ok(outcome) if outcome.killed => {
                debug!("{} finished off {} on tick {}/{}", source, target.name(), tick, ticks);
                return;
            }
            Ok(_) => {}
            Err(e) => {
                debug!("{} on {} stopped on tick {}/{}: {}", source, target.name(), tick, ticks, e);
                break;
            }
        }
    }

    target.forget_effect(effect_id).await;
}
