//! Timed effect definitions shared between client and server.

use serde::{Deserialize, Serialize};

/// Slack used when turning duration / interval into a tick count, so that
/// 0.3 / 0.1 yields 3 ticks rather than 4.
const TICK_EPSILON: f64 = 1e-4;

/// Shortest allowed gap between hits (one server tick)
pub const MIN_EFFECT_INTERVAL: f32 = 0.05;

/// Longest allowed effect duration, in seconds
pub const MAX_EFFECT_DURATION: f32 = 3600.0;

/// Damage over time: every `interval` seconds for `duration` seconds,
/// a damage value sampled in [`damage_min`, `damage_max`] and rounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageOverTime {
    pub damage_min: f32,
    pub damage_max: f32,
    /// Total span in seconds
    pub duration: f32,
    /// Seconds between hits
    pub interval: f32,
}

impl DamageOverTime {
    pub fn new(damage_min: f32, damage_max: f32, duration: f32, interval: f32) -> Self {
        Self {
            damage_min,
            damage_max,
            duration,
            interval,
        }
    }

    pub fn is_valid(&self) -> bool {
        let finite = self.damage_min.is_finite()
            && self.damage_max.is_finite()
            && self.duration.is_finite()
            && self.interval.is_finite();

        finite
            && self.damage_min >= 0.0
            && self.damage_min <= self.damage_max
            && self.duration > 0.0
            && self.duration <= MAX_EFFECT_DURATION
            && self.interval >= MIN_EFFECT_INTERVAL
            && self.interval <= MAX_EFFECT_DURATION
    }

    /// Number of hits: ceil(duration / interval)
    pub fn ticks(&self) -> u32 {
        if !self.is_valid() {
            return 0;
        }
        let ratio = self.duration as f64 / self.interval as f64;
        (ratio - TICK_EPSILON).ceil().max(1.0) as u32
    }
}

/// Named damage-over-time presets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectDef {
    pub id: u32,
    pub name: String,
    pub damage: DamageOverTime,
}

/// Built-in effect definitions
pub fn get_effect_definitions() -> Vec<EffectDef> {
    vec![
        EffectDef {
            id: 1,
            name: "Poison".into(),
            damage: DamageOverTime::new(1.0, 3.0, 8.0, 2.0),
        },
        EffectDef {
            id: 2,
            name: "Burning".into(),
            damage: DamageOverTime::new(2.0, 4.0, 3.0, 0.5),
        },
        EffectDef {
            id: 3,
            name: "Bleed".into(),
            damage: DamageOverTime::new(1.0, 1.0, 10.0, 1.0),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_count_is_ceiling() {
        assert_eq!(DamageOverTime::new(2.0, 2.0, 3.0, 1.0).ticks(), 3);
        assert_eq!(DamageOverTime::new(2.0, 2.0, 3.5, 1.0).ticks(), 4);
        assert_eq!(DamageOverTime::new(2.0, 2.0, 0.3, 0.1).ticks(), 3);
        assert_eq!(DamageOverTime::new(1.0, 1.0, 0.5, 2.0).ticks(), 1);
    }

    #[test]
    fn test_invalid_definitions() {
        assert!(!DamageOverTime::new(3.0, 2.0, 3.0, 1.0).is_valid());
        assert!(!DamageOverTime::new(-1.0, 2.0, 3.0, 1.0).is_valid());
        assert!(!DamageOverTime::new(1.0, 2.0, 3.0, 0.0).is_valid());
        assert!(!DamageOverTime::new(1.0, 2.0, f32::NAN, 1.0).is_valid());
        assert_eq!(DamageOverTime::new(1.0, 2.0, 0.0, 1.0).ticks(), 0);
    }

    #[test]
    fn test_timing_bounds() {
        assert!(DamageOverTime::new(1.0, 1.0, MAX_EFFECT_DURATION, MIN_EFFECT_INTERVAL).is_valid());
        assert_eq!(
            DamageOverTime::new(1.0, 1.0, MAX_EFFECT_DURATION, MIN_EFFECT_INTERVAL).ticks(),
            72_000
        );
        assert!(!DamageOverTime::new(1.0, 1.0, 1e30, 1e30).is_valid());
        assert!(!DamageOverTime::new(1.0, 1.0, 1.0, 1e-30).is_valid());
        assert!(!DamageOverTime::new(1.0, 1.0, MAX_EFFECT_DURATION + 1.0, 1.0).is_valid());
        assert_eq!(DamageOverTime::new(1.0, 1.0, 1e30, 1e30).ticks(), 0);
    }

    #[test]
    fn test_presets_are_valid() {
        for def in get_effect_definitions() {
            assert!(def.damage.is_valid(), "{} should be valid", def.name);
        }
    }
}
