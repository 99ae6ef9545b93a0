//! Skirmish combat server
//!
//! Runs the authoritative combat simulation at a fixed tick rate, driven by
//! a command script, and logs everything the replication layer sends out.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};
use tokio::sync::broadcast::{self, error::RecvError};

use skirmish_server::commands::{self, ScheduledCommand};
use skirmish_server::config::ServerConfig;
use skirmish_server::replication::{self, Replication};
use skirmish_server::world::GameWorld;
use skirmish_shared::{Attributes, CombatEvent, PROTOCOL_VERSION};

/// Script used when SKIRMISH_SCRIPT is not set
const DEMO_SCRIPT: &str = "\
# <tick> <command>
1 /equip 1 2
1 /equip 2 3
2 /stats 3 2 0 0 1
5 /attack 1 2 17 6
10 /afflict 3 1
20 /strike 1 2 19
40 /strike 2 1 12
60 /attack 2 3 25 40
80 /status 3
100 /respawn 3
120 /heal 1 5
140 /dot 2 1 2 1 0.25
160 /unequip 2
";

/// Log decoded frames until the replication task closes the channel
async fn observe(mut frames: broadcast::Receiver<Vec<u8>>) {
    loop {
        match frames.recv().await {
            Ok(frame) => match CombatEvent::deserialize(&frame) {
                Ok(event) => log_event(&event),
                Err(e) => warn!("Observer could not decode frame: {}", e),
            },
            Err(RecvError::Lagged(skipped)) => warn!("Observer lagged, {} frames skipped", skipped),
            Err(RecvError::Closed) => break,
        }
    }
    info!("Observer stopped");
}

fn log_event(event: &CombatEvent) {
    match event {
        CombatEvent::AttackReported {
            attacker_id,
            target_id,
            hit,
            damage,
        } => {
            if *hit {
                info!("[popup] #{} hits #{} for {}", attacker_id, target_id, damage);
            } else {
                info!("[popup] #{} misses #{}", attacker_id, target_id);
            }
        }
        CombatEvent::DamageTaken {
            target_id,
            amount,
            new_health,
            source,
            ..
        } => info!(
            "[popup] #{} takes {} from {} ({} left)",
            target_id, amount, source, new_health
        ),
        CombatEvent::Healed {
            target_id,
            amount,
            new_health,
            ..
        } => info!("[popup] #{} heals {} ({} now)", target_id, amount, new_health),
        CombatEvent::Death { entity_id, source } => {
            info!("[popup] #{} was slain by {}", entity_id, source)
        }
        CombatEvent::Respawn { entity_id, health } => {
            info!("[popup] #{} respawns with {} health", entity_id, health)
        }
        CombatEvent::StateChanged(snapshot) => debug!(
            "[state] {} #{}: {}/{} health",
            snapshot.name, snapshot.entity_id, snapshot.current_health, snapshot.derived.max_health
        ),
    }
}

async fn load_script(config: &ServerConfig) -> Vec<ScheduledCommand> {
    let Some(path) = &config.script else {
        return commands::parse_script(DEMO_SCRIPT);
    };

    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            let script = commands::parse_script(&text);
            info!("Loaded {} commands from {}", script.len(), path.display());
            script
        }
        Err(e) => {
            error!("Failed to read script {}: {}", path.display(), e);
            error!("Using builtin demo script");
            commands::parse_script(DEMO_SCRIPT)
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env();

    info!("Starting Skirmish Server...");
    info!("Protocol version {}", PROTOCOL_VERSION);
    info!("Tick rate: {} Hz, running {} ticks", config.tick_rate, config.ticks);
    info!("World seed: {}", config.seed);
    match serde_json::to_string(&config) {
        Ok(json) => debug!("Effective config: {}", json),
        Err(e) => warn!("Failed to encode config: {}", e),
    }

    let Replication {
        handle,
        frames,
        task,
    } = replication::init(config.event_buffer);
    let observer = tokio::spawn(observe(frames));

    let mut world = GameWorld::with_default_items(Arc::new(handle.clone()), config.seed);
    world.spawn_combatant("Aldric", Attributes::new(10, 12, 8, 14));
    world.spawn_combatant("Brenna", Attributes::unset());
    world.spawn_combatant("Corvin", Attributes::new(0, 14, 0, 10));

    let script = load_script(&config).await;
    let mut pending = script.iter().peekable();

    let tick_duration = config.tick_duration();
    let delta = tick_duration.as_secs_f32();

    info!("Server started successfully!");

    // Main game loop
    for tick in 0..config.ticks {
        let tick_start = Instant::now();

        while let Some(scheduled) = pending.next_if(|scheduled| scheduled.tick <= tick) {
            match commands::parse_and_execute(&scheduled.command, &world).await {
                Some(result) if result.success => {
                    info!("[tick {}] {} -> {}", tick, scheduled.command, result.message)
                }
                Some(result) => {
                    warn!("[tick {}] {} -> {}", tick, scheduled.command, result.message)
                }
                None => warn!("[tick {}] not a command: {}", tick, scheduled.command),
            }
        }

        world.update(delta).await;

        if tick > 0 && tick % config.tick_rate as u64 == 0 {
            handle.flush();
        }

        // Sleep for remaining tick time
        let elapsed = tick_start.elapsed();
        if elapsed < tick_duration {
            tokio::time::sleep(tick_duration - elapsed).await;
        }
    }

    if pending.peek().is_some() {
        warn!("{} scripted commands were never reached", pending.count());
    }

    match serde_json::to_string_pretty(&world.snapshots().await) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to encode final snapshots: {}", e),
    }

    for id in world.entity_ids() {
        world.despawn(id).await;
    }

    handle.shutdown().await;
    drop(world);
    drop(handle);

    if let Err(e) = task.await {
        error!("Replication task failed: {}", e);
    }
    if let Err(e) = observer.await {
        error!("Observer task failed: {}", e);
    }

    info!("Server stopped");
}
