//! Text command surface for driving combatants (admin console, scripts).

use std::str::FromStr;

use log::warn;

use skirmish_shared::{
    get_effect_definitions, CombatCommand, CombatSnapshot, DamageOverTime, EntityId, StatGrant,
};

use crate::world::GameWorld;

/// Result of executing a command
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Whether the command was successful
    pub success: bool,
    /// Message to display to the user
    pub message: String,
    /// State of the affected combatant after the command
    pub snapshot: Option<CombatSnapshot>,
}

impl CommandResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            snapshot: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            snapshot: None,
        }
    }

    pub fn with_snapshot(mut self, snapshot: CombatSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

/// Parse and execute a command line.
/// Returns None if it's not a command (doesn't start with /)
pub async fn parse_and_execute(content: &str, world: &GameWorld) -> Option<CommandResult> {
    let content = content.trim();
    let stripped = content.strip_prefix('/')?;

    let parts: Vec<&str> = stripped.split_whitespace().collect();
    if parts.is_empty() {
        return Some(CommandResult::error("Invalid command"));
    }

    let command = parts[0].to_lowercase();
    let args = &parts[1..];

    Some(match command.as_str() {
        "help" => cmd_help(),
        "items" => cmd_items(world),
        "effects" => cmd_effects(),
        _ => match parse_command(&command, args) {
            Ok(command) => execute(command, world).await,
            Err(message) => CommandResult::error(message),
        },
    })
}

/// Turn a command name and its arguments into a `CombatCommand`
pub fn parse_command(command: &str, args: &[&str]) -> Result<CombatCommand, String> {
    let usage = match usage(command) {
        Some(usage) => usage,
        None => return Err(format!("Unknown command: /{}", command)),
    };

    build_command(command, args).map_err(|e| format!("{}. Usage: {}", e, usage))
}

fn usage(command: &str) -> Option<&'static str> {
    Some(match command {
        "attack" => "/attack <attacker> <target> <roll> <damage>",
        "strike" => "/strike <attacker> <target> <roll>",
        "heal" => "/heal <target> <amount>",
        "respawn" => "/respawn <target>",
        "stats" => "/stats <target> <str> <dex> <int> <vit>",
        "equip" => "/equip <target> <item_id>",
        "unequip" => "/unequip <target>",
        "dot" => "/dot <target> <min> <max> <duration> <interval>",
        "afflict" => "/afflict <target> <effect_id>",
        "status" => "/status <target>",
        _ => return None,
    })
}

fn build_command(command: &str, args: &[&str]) -> Result<CombatCommand, String> {
    Ok(match command {
        "attack" => CombatCommand::ReportAttack {
            attacker_id: arg(args, 0, "attacker id")?,
            target_id: arg(args, 1, "target id")?,
            roll: arg(args, 2, "roll")?,
            damage: arg(args, 3, "damage")?,
            source: "console".into(),
        },
        "strike" => CombatCommand::Strike {
            attacker_id: arg(args, 0, "attacker id")?,
            target_id: arg(args, 1, "target id")?,
            roll: arg(args, 2, "roll")?,
        },
        "heal" => CombatCommand::ReportHeal {
            target_id: arg(args, 0, "target id")?,
            amount: arg(args, 1, "amount")?,
            source: "console".into(),
        },
        "respawn" => CombatCommand::RequestRespawn {
            target_id: arg(args, 0, "target id")?,
        },
        "stats" => CombatCommand::AddStats {
            target_id: arg(args, 0, "target id")?,
            grant: StatGrant::new(
                arg(args, 1, "strength")?,
                arg(args, 2, "dexterity")?,
                arg(args, 3, "intelligence")?,
                arg(args, 4, "vitality")?,
            ),
        },
        "equip" => CombatCommand::EquipItem {
            target_id: arg(args, 0, "target id")?,
            item_id: Some(arg(args, 1, "item id")?),
        },
        "unequip" => CombatCommand::EquipItem {
            target_id: arg(args, 0, "target id")?,
            item_id: None,
        },
        "dot" => CombatCommand::ApplyDamageOverTime {
            target_id: arg(args, 0, "target id")?,
            effect: DamageOverTime::new(
                arg(args, 1, "minimum damage")?,
                arg(args, 2, "maximum damage")?,
                arg(args, 3, "duration")?,
                arg(args, 4, "interval")?,
            ),
            source: "console".into(),
        },
        "afflict" => {
            let target_id = arg(args, 0, "target id")?;
            let effect_id: u32 = arg(args, 1, "effect id")?;
            let def = get_effect_definitions()
                .into_iter()
                .find(|def| def.id == effect_id)
                .ok_or_else(|| format!("Unknown effect: {}", effect_id))?;
            CombatCommand::ApplyDamageOverTime {
                target_id,
                effect: def.damage,
                source: def.name,
            }
        }
        "status" => CombatCommand::QueryStatus {
            target_id: arg(args, 0, "target id")?,
        },
        _ => return Err(format!("Unknown command: /{}", command)),
    })
}

fn arg<T: FromStr>(args: &[&str], index: usize, what: &str) -> Result<T, String> {
    let raw = args.get(index).ok_or_else(|| format!("Missing {}", what))?;
    raw.parse().map_err(|_| format!("Invalid {}: {}", what, raw))
}

/// Execute a parsed command against the world
pub async fn execute(command: CombatCommand, world: &GameWorld) -> CommandResult {
    match command {
        CombatCommand::ReportAttack {
            attacker_id,
            target_id,
            roll,
            damage,
            source,
        } => cmd_attack(world, attacker_id, target_id, roll, Some(damage), &source).await,
        CombatCommand::Strike {
            attacker_id,
            target_id,
            roll,
        } => cmd_attack(world, attacker_id, target_id, roll, None, "").await,
        CombatCommand::ReportHeal {
            target_id,
            amount,
            source,
        } => cmd_heal(world, target_id, amount, &source).await,
        CombatCommand::RequestRespawn { target_id } => cmd_respawn(world, target_id).await,
        CombatCommand::AddStats { target_id, grant } => cmd_stats(world, target_id, grant).await,
        CombatCommand::EquipItem { target_id, item_id } => cmd_equip(world, target_id, item_id).await,
        CombatCommand::ApplyDamageOverTime {
            target_id,
            effect,
            source,
        } => cmd_dot(world, target_id, effect, &source).await,
        CombatCommand::QueryStatus { target_id } => cmd_status(world, target_id).await,
    }
}

async fn with_target_snapshot(result: CommandResult, world: &GameWorld, target_id: EntityId) -> CommandResult {
    match world.get(target_id) {
        Some(target) => result.with_snapshot(target.snapshot().await),
        None => result,
    }
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_help() -> CommandResult {
    let mut help = String::from("Available commands:\n");
    help.push_str("  /help - Show this help message\n");
    help.push_str("  /items - List all items with IDs\n");
    help.push_str("  /effects - List damage over time effects with IDs\n");
    for command in [
        "attack", "strike", "heal", "respawn", "stats", "equip", "unequip", "dot", "afflict",
        "status",
    ] {
        if let Some(usage) = usage(command) {
            help.push_str(&format!("  {}\n", usage));
        }
    }
    CommandResult::success(help)
}

fn cmd_items(world: &GameWorld) -> CommandResult {
    let mut items: Vec<_> = world.items.values().collect();
    items.sort_by_key(|item| item.id);

    let mut msg = String::from("Items:\n");
    for item in items {
        msg.push_str(&format!(
            "  [{}] {} - {}-{} damage, {}s delay\n",
            item.id, item.name, item.damage_min, item.damage_max, item.attack_delay
        ));
    }
    CommandResult::success(msg)
}

fn cmd_effects() -> CommandResult {
    let mut msg = String::from("Effects:\n");
    for def in get_effect_definitions() {
        msg.push_str(&format!(
            "  [{}] {} - {}-{} damage every {}s for {}s\n",
            def.id,
            def.name,
            def.damage.damage_min,
            def.damage.damage_max,
            def.damage.interval,
            def.damage.duration
        ));
    }
    CommandResult::success(msg)
}

/// `damage` is None for a server-rolled strike
async fn cmd_attack(
    world: &GameWorld,
    attacker_id: EntityId,
    target_id: EntityId,
    roll: f32,
    damage: Option<f32>,
    source: &str,
) -> CommandResult {
    let resolution = match damage {
        Some(damage) => {
            world
                .report_attack(attacker_id, target_id, roll, damage, source)
                .await
        }
        None => world.strike(attacker_id, target_id, roll).await,
    };

    let resolution = match resolution {
        Ok(resolution) => resolution,
        Err(e) => return CommandResult::error(e.to_string()),
    };

    let verdict = if resolution.hit { "Hit" } else { "Missed" };
    let result = if resolution.outcome.killed {
        CommandResult::success(format!(
            "{} #{} (roll {}), {} damage. Target killed",
            verdict, target_id, roll, resolution.damage
        ))
    } else {
        CommandResult::success(format!(
            "{} #{} (roll {}), {} damage. Health now {}",
            verdict, target_id, roll, resolution.damage, resolution.outcome.new_health
        ))
    };
    with_target_snapshot(result, world, target_id).await
}

async fn cmd_heal(world: &GameWorld, target_id: EntityId, amount: f32, source: &str) -> CommandResult {
    let result = match world.report_heal(target_id, amount, source).await {
        Ok(Some(outcome)) => CommandResult::success(format!(
            "Healed #{} for {}. Health now {}",
            target_id, outcome.healed, outcome.new_health
        )),
        Ok(None) => CommandResult::error(format!("#{} is dead and cannot be healed", target_id)),
        Err(e) => return CommandResult::error(e.to_string()),
    };
    with_target_snapshot(result, world, target_id).await
}

async fn cmd_respawn(world: &GameWorld, target_id: EntityId) -> CommandResult {
    match world.request_respawn(target_id).await {
        Ok(health) => {
            let result = CommandResult::success(format!("#{} respawned with {} health", target_id, health));
            with_target_snapshot(result, world, target_id).await
        }
        Err(e) => CommandResult::error(e.to_string()),
    }
}

async fn cmd_stats(world: &GameWorld, target_id: EntityId, grant: StatGrant) -> CommandResult {
    match world.add_stats(target_id, grant).await {
        Ok(snapshot) => CommandResult::success(format!(
            "Stats of #{} now STR {} DEX {} INT {} VIT {} (max health {})",
            target_id,
            snapshot.attributes.strength,
            snapshot.attributes.dexterity,
            snapshot.attributes.intelligence,
            snapshot.attributes.vitality,
            snapshot.derived.max_health
        ))
        .with_snapshot(snapshot),
        Err(e) => CommandResult::error(e.to_string()),
    }
}

async fn cmd_equip(world: &GameWorld, target_id: EntityId, item_id: Option<u32>) -> CommandResult {
    let result = match world.equip_item(target_id, item_id).await {
        Ok(previous) => {
            let previous = previous
                .map(|item| format!(" (replaced {})", item.name))
                .unwrap_or_default();
            match item_id {
                Some(item_id) => CommandResult::success(format!(
                    "#{} equipped item {}{}",
                    target_id, item_id, previous
                )),
                None => CommandResult::success(format!("#{} is now unarmed{}", target_id, previous)),
            }
        }
        Err(e) => return CommandResult::error(e.to_string()),
    };
    with_target_snapshot(result, world, target_id).await
}

async fn cmd_dot(
    world: &GameWorld,
    target_id: EntityId,
    effect: DamageOverTime,
    source: &str,
) -> CommandResult {
    match world.apply_damage_over_time(target_id, effect, source).await {
        Ok(effect_id) => {
            let result = CommandResult::success(format!(
                "Effect {} applied to #{}: {} ticks every {}s",
                effect_id,
                target_id,
                effect.ticks(),
                effect.interval
            ));
            with_target_snapshot(result, world, target_id).await
        }
        Err(e) => CommandResult::error(e.to_string()),
    }
}

async fn cmd_status(world: &GameWorld, target_id: EntityId) -> CommandResult {
    let target = match world.resolve(target_id) {
        Ok(target) => target,
        Err(e) => return CommandResult::error(e.to_string()),
    };
    let snapshot = target.snapshot().await;
    let state = if snapshot.is_dead() { "dead" } else { "alive" };

    CommandResult::success(format!(
        "{} (#{}) {}: {} / {} health, armor {}, damage {}-{}",
        snapshot.name,
        target_id,
        state,
        snapshot.current_health,
        snapshot.derived.max_health,
        snapshot.derived.armor_rating,
        snapshot.derived.total_damage_min,
        snapshot.derived.total_damage_max
    ))
    .with_snapshot(snapshot)
}

// =============================================================================
// Scripts
// =============================================================================

/// A command scheduled for a given simulation tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCommand {
    pub tick: u64,
    pub command: String,
}

/// Parse `<tick> <command>` lines. Blank lines and `#` comments are skipped,
/// malformed lines are logged and skipped.
pub fn parse_script(text: &str) -> Vec<ScheduledCommand> {
    let mut script = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parsed = line
            .split_once(char::is_whitespace)
            .and_then(|(tick, command)| Some((tick.parse().ok()?, command.trim())));
        match parsed {
            Some((tick, command)) if command.starts_with('/') => script.push(ScheduledCommand {
                tick,
                command: command.to_string(),
            }),
            _ => warn!("Skipping malformed script line {}: {}", number + 1, line),
        }
    }

    script.sort_by_key(|scheduled| scheduled.tick);
    script
}
