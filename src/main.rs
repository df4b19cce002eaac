//! npc-sim: drives the custom NPC director against an in-memory world.
//!
//! Environment:
//! - `NPC_DEFINITIONS`: definitions file (default `npcs/npcs.json`)
//! - `NPC_CONFIG`: spawn config file (default `npcs/config.json`)
//! - `NPC_SIM_TICKS`: ticks to run (default 3600)
//! - `NPC_SIM_SEED`: fixed seed for a reproducible run
//! - `NPC_SIM_WATCH`: set to `1` to follow edits to the definitions file

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::{info, warn};

use npc_core::config::DEFAULT_CONFIG_PATH;
use npc_core::constants::TILE_SIZE;
use npc_core::definition::{BaseOverride, LootDefinition, LootEntry, SpawningDefinition};
use npc_core::hotreload::DefinitionWatcher;
use npc_core::loader::{save_definitions, DEFAULT_DEFINITIONS_PATH};
use npc_core::logging::init_tracing_default;
use npc_core::sandbox::SandboxWorld;
use npc_core::world::{Npc, Player};
use npc_core::{
    DefinitionLoader, DefinitionRegistry, HookTable, NpcDefinition, RegistryHandle,
    ScriptLibrary, SpawnConfig, SpawnDirector, TickReport, TileMap,
};

const WORLD_WIDTH: i32 = 800;
const WORLD_HEIGHT: i32 = 300;
const GROUND_ROW: i32 = 200;
const ZOMBIE: i32 = 3;
const DEMON_EYE: i32 = 2;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn main() -> anyhow::Result<()> {
    init_tracing_default();

    let definitions_path = PathBuf::from(env_or(
        "NPC_DEFINITIONS",
        DEFAULT_DEFINITIONS_PATH.to_string(),
    ));
    let config_path = PathBuf::from(env_or("NPC_CONFIG", DEFAULT_CONFIG_PATH.to_string()));
    let ticks: u32 = env_or("NPC_SIM_TICKS", 3600);
    let seed: Option<u64> = std::env::var("NPC_SIM_SEED").ok().and_then(|s| s.parse().ok());

    // ========================================================================
    // 1. Configuration and definitions
    // ========================================================================
    let config = SpawnConfig::load_or_default(&config_path);
    let loader = DefinitionLoader::new(&definitions_path).with_library(demo_library());
    let mut registry = loader
        .load()
        .with_context(|| format!("loading {}", definitions_path.display()))?;
    if registry.is_empty() {
        warn!("No custom NPC definitions found, using the built-in samples");
        registry = sample_registry(loader.library());
    }
    let handle = Arc::new(RegistryHandle::new(registry));

    let mut watcher = DefinitionWatcher::new(loader, Arc::clone(&handle));
    if env_or("NPC_SIM_WATCH", 0u8) == 1 {
        watcher.watch().context("starting definitions watcher")?;
    }

    // ========================================================================
    // 2. Sandbox world
    // ========================================================================
    let mut world = SandboxWorld::new(WORLD_WIDTH, WORLD_HEIGHT);
    world.fill_ground(GROUND_ROW);
    world.define_archetype(archetype(ZOMBIE, 45, 6, 60.0));
    world.define_archetype(archetype(DEMON_EYE, 60, 2, 75.0));

    let feet_y = (GROUND_ROW * TILE_SIZE) as f32;
    for (i, name) in ["alice", "bob"].into_iter().enumerate() {
        let x = (WORLD_WIDTH / 3 * (i as i32 + 1) * TILE_SIZE) as f32;
        world
            .add_player(Player::new(name, (x, feet_y - 42.0)))
            .context("no free player slot")?;
    }

    let mut director = SpawnDirector::new(Arc::clone(&handle), config);
    let mut host_rng = match seed {
        Some(seed) => {
            director = director.with_seed(seed);
            Xoshiro256PlusPlus::seed_from_u64(seed.wrapping_add(1))
        }
        None => Xoshiro256PlusPlus::from_entropy(),
    };

    // ========================================================================
    // 3. Tick loop
    // ========================================================================
    info!(ticks, "Running custom NPC simulation");
    let mut totals = TickReport::default();
    let mut kills = 0usize;
    for tick in 0..ticks {
        watcher.poll();

        // Vanilla spawns stand in for the host's natural spawning.
        if tick % 30 == 0 {
            let net_id = if host_rng.gen_bool(0.5) { ZOMBIE } else { DEMON_EYE };
            let x = host_rng.gen_range(0..WORLD_WIDTH * TILE_SIZE) as f32;
            if let Some(slot) = world.add_npc(net_id, (x, feet_y - 40.0)) {
                director.on_npc_spawned(slot);
            }
        }

        let report = director.tick(&mut world);
        totals.replaced += report.replaced;
        totals.spawned += report.spawned;
        totals.saturated_players += report.saturated_players;

        // Custom NPCs die off at random so the load keeps moving.
        if tick % 60 == 59 {
            let custom: Vec<usize> = director.custom_npcs(&world).map(|c| c.slot).collect();
            for slot in custom {
                if host_rng.gen_bool(0.25) {
                    director.on_npc_killed(&mut world, slot);
                    world.remove_npc(slot);
                    kills += 1;
                }
            }
        }
    }

    // ========================================================================
    // 4. Summary and shutdown
    // ========================================================================
    let registry = handle.snapshot();
    info!(
        replaced = totals.replaced,
        spawned = totals.spawned,
        saturated = totals.saturated_players,
        kills,
        live_custom = director.custom_npcs(&world).count(),
        items_dropped = world.items.len(),
        "Simulation finished"
    );
    for definition in registry.all() {
        let tally = director.kill_tally(&definition.name);
        if tally > 0 {
            info!(definition = %definition.name, tally, "Kill tally");
        }
    }

    director
        .config()
        .save(&config_path)
        .with_context(|| format!("saving {}", config_path.display()))?;
    if !watcher.loader().path().exists() {
        save_definitions(&definitions_path, &registry)
            .with_context(|| format!("saving {}", definitions_path.display()))?;
    }
    Ok(())
}

fn archetype(net_id: i32, life: i32, defense: i32, value: f32) -> Npc {
    let mut npc = Npc::new(net_id, (0.0, 0.0));
    npc.life = life;
    npc.life_max = life;
    npc.defense = defense;
    npc.def_defense = defense;
    npc.value = value;
    npc
}

/// Hooks the sample definitions link against by script path
fn demo_library() -> ScriptLibrary {
    let mut library = ScriptLibrary::new();
    library
        .register(
            "zombie-king.boo",
            HookTable::new().on_spawn(|_, npc| {
                info!(slot = npc.slot, "The zombie king rises");
                Ok(())
            }),
        )
        .register(
            "night-eye.boo",
            HookTable::new().on_check_spawn(|world, _, _, y| Ok(y < world.height() - 10)),
        );
    library
}

fn sample_registry(library: &ScriptLibrary) -> DefinitionRegistry {
    let zombie_king = NpcDefinition::new("zombie-king", ZOMBIE)
        .with_script("zombie-king.boo")
        .with_override(BaseOverride {
            name: Some("Zombie King".into()),
            max_hp: Some(400),
            defense: Some(20),
            npc_slots: Some(2.0),
            value: Some(1500.0),
            ..BaseOverride::default()
        })
        .with_loot(LootDefinition {
            tally_kills: true,
            is_override: true,
            entries: Some(vec![LootEntry::new(29, 1, 3, 0.5)]),
        })
        .with_spawning(SpawningDefinition {
            replacement_target_type: Some(ZOMBIE),
            replacement_chance: Some(0.2),
            ..SpawningDefinition::default()
        });

    let night_eye = NpcDefinition::new("night-eye", DEMON_EYE)
        .with_script("night-eye.boo")
        .with_override(BaseOverride {
            name: Some("Night Eye".into()),
            has_no_gravity: Some(true),
            ..BaseOverride::default()
        })
        .with_spawning(SpawningDefinition {
            should_spawn: true,
            spawn_rate_multiplier: Some(0.5),
            ..SpawningDefinition::default()
        });

    for definition in [&zombie_king, &night_eye] {
        library.link(definition);
    }
    let mut registry = DefinitionRegistry::new();
    registry.register_all([zombie_king, night_eye]);
    registry
}
