//! Administrative chat commands.

use tracing::info;

use crate::constants::{FORCE_SPAWN_RANGE, MAX_FORCE_SPAWN};
use crate::director::SpawnDirector;
use crate::error::NpcError;
use crate::world::{GameWorld, PlayerSlot};

/// Result of executing a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the command was successful
    pub success: bool,
    /// Message to display to the issuer
    pub message: String,
}

impl CommandResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Parse and execute a chat command.
/// Returns None if the input is not one of this crate's commands.
pub fn parse_and_execute(
    input: &str,
    issuer: PlayerSlot,
    director: &mut SpawnDirector,
    world: &mut dyn GameWorld,
) -> Option<CommandResult> {
    let content = input.strip_prefix('/')?;
    let parts: Vec<&str> = content.split_whitespace().collect();
    let (command, args) = parts.split_first()?;

    Some(match command.to_lowercase().as_str() {
        "cmaxspawns" => cmd_max_spawns(args, director),
        "cspawnrate" => cmd_spawn_rate(args, director),
        "cspawnmob" | "csm" => cmd_spawn_mob(args, issuer, director, world),
        _ => return None,
    })
}

fn parse_positive(input: &str) -> Option<i32> {
    input.parse::<i32>().ok().filter(|n| *n >= 1)
}

fn cmd_max_spawns(args: &[&str], director: &mut SpawnDirector) -> CommandResult {
    let [input] = args else {
        return CommandResult::error("Syntax: /cmaxspawns <max-spawns>");
    };
    let Some(max_spawns) = parse_positive(input) else {
        return CommandResult::error(format!("Invalid maximum spawns '{input}'."));
    };
    director.config_mut().max_spawns = max_spawns;
    info!(max_spawns, "Custom max spawns changed");
    CommandResult::success(format!("Set maximum spawns to {max_spawns}."))
}

fn cmd_spawn_rate(args: &[&str], director: &mut SpawnDirector) -> CommandResult {
    let [input] = args else {
        return CommandResult::error("Syntax: /cspawnrate <spawn-rate>");
    };
    let Some(spawn_rate) = parse_positive(input) else {
        return CommandResult::error(format!("Invalid spawn rate '{input}'."));
    };
    director.config_mut().spawn_rate = spawn_rate;
    info!(spawn_rate, "Custom spawn rate changed");
    CommandResult::success(format!("Set spawn rate to {spawn_rate}."))
}

fn cmd_spawn_mob(
    args: &[&str],
    issuer: PlayerSlot,
    director: &mut SpawnDirector,
    world: &mut dyn GameWorld,
) -> CommandResult {
    let (name, amount_input) = match args {
        [name] => (*name, "1"),
        [name, amount] => (*name, *amount),
        _ => return CommandResult::error("Syntax: /cspawnmob <name> [amount]"),
    };

    if director.registry().snapshot().find_by_name(name).is_none() {
        return CommandResult::error(format!("Invalid custom NPC name '{name}'."));
    }
    let amount = match amount_input.parse::<usize>() {
        Ok(n) if n > 0 && n <= MAX_FORCE_SPAWN => n,
        _ => return CommandResult::error(format!("Invalid amount '{amount_input}'.")),
    };
    let Some(origin) = world.active_player(issuer).map(|p| p.tile()) else {
        return CommandResult::error("You must be in the world to spawn NPCs.");
    };

    match director.spawn_around(world, name, origin, FORCE_SPAWN_RANGE, amount) {
        Ok(_) => {
            info!(player = issuer, definition = name, amount, "Force-spawned custom NPCs");
            CommandResult::success(format!("Spawned {amount} {name}(s)."))
        }
        Err(NpcError::SlotsExhausted(_)) => {
            CommandResult::error(format!("Ran out of NPC slots while spawning {name}."))
        }
        Err(err) => CommandResult::error(err.to_string()),
    }
}
