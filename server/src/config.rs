//! Server configuration read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::warn;
use serde::Serialize;

use skirmish_shared::SERVER_TICK_RATE;

const DEFAULT_TICKS: u64 = 200;
const DEFAULT_EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    /// Seed for the world RNG (attribute rolls, damage samples)
    pub seed: u64,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Number of ticks the demo runs before shutting down
    pub ticks: u64,
    /// Capacity of the replication queue
    pub event_buffer: usize,
    /// Script file replacing the builtin demo script
    pub script: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Unparseable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let tick_rate = match parse_var(&lookup, "SKIRMISH_TICK_RATE", defaults.tick_rate) {
            0 => {
                warn!("SKIRMISH_TICK_RATE must be positive, using {}", defaults.tick_rate);
                defaults.tick_rate
            }
            rate => rate,
        };

        Self {
            seed: parse_var(&lookup, "SKIRMISH_SEED", defaults.seed),
            tick_rate,
            ticks: parse_var(&lookup, "SKIRMISH_TICKS", defaults.ticks),
            event_buffer: parse_var(&lookup, "SKIRMISH_EVENT_BUFFER", defaults.event_buffer).max(1),
            script: lookup("SKIRMISH_SCRIPT")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            seed: rand::random(),
            tick_rate: SERVER_TICK_RATE,
            ticks: DEFAULT_TICKS,
            event_buffer: DEFAULT_EVENT_BUFFER,
            script: None,
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.ticks, 200);
        assert_eq!(config.event_buffer, 256);
        assert_eq!(config.script, None);
        assert_eq!(config.tick_duration(), Duration::from_millis(50));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("SKIRMISH_SEED", "42"),
            ("SKIRMISH_TICK_RATE", "10"),
            ("SKIRMISH_TICKS", " 30 "),
            ("SKIRMISH_EVENT_BUFFER", "8"),
            ("SKIRMISH_SCRIPT", "fight.txt"),
        ]);
        assert_eq!(config.seed, 42);
        assert_eq!(config.tick_rate, 10);
        assert_eq!(config.ticks, 30);
        assert_eq!(config.event_buffer, 8);
        assert_eq!(config.script, Some(PathBuf::from("fight.txt")));
    }

    #[test]
    fn test_config_serializes_for_startup_log() {
        let config = config(&[("SKIRMISH_SEED", "7"), ("SKIRMISH_SCRIPT", "fight.txt")]);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["seed"], 7);
        assert_eq!(json["tick_rate"], 20);
        assert_eq!(json["script"], "fight.txt");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config(&[
            ("SKIRMISH_TICK_RATE", "0"),
            ("SKIRMISH_TICKS", "many"),
            ("SKIRMISH_EVENT_BUFFER", "0"),
            ("SKIRMISH_SCRIPT", "  "),
        ]);
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.ticks, 200);
        assert_eq!(config.event_buffer, 1);
        assert_eq!(config.script, None);
    }
}
