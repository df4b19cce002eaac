//! Per-tick spawn director.
//!
//! Drives the custom NPC lifecycle once per simulation tick:
//! - **Replacement scan**: every vanilla NPC is offered, once per (re)spawn,
//!   to the definitions targeting its archetype in registration order
//! - **Spawn scan**: every active player gets one chance per tick for a
//!   custom spawn, gated by the custom load around them
//!
//! Bookkeeping lives in slot-indexed vectors aligned with the host's NPC and
//! player arrays. The director owns all of it and is driven from the single
//! simulation thread.

mod events;

use std::collections::HashMap;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::{debug, info, trace};

use crate::attributes::AttributeApplier;
use crate::config::SpawnConfig;
use crate::constants::{MAX_NPCS, MAX_PLAYERS};
use crate::definition::NpcDefinition;
use crate::error::NpcError;
use crate::logging::TimingSpan;
use crate::registry::{DefinitionRegistry, RegistryHandle};
use crate::spawning::{find_spawn_site, random_clear_tile_in_range};
use crate::world::{overlapped_tiles, GameWorld, NpcSlot, PlayerSlot, Rect, TilePoint};

/// A live NPC governed by a custom definition.
#[derive(Debug, Clone)]
pub struct CustomNpc {
    pub slot: NpcSlot,
    pub definition: Arc<NpcDefinition>,
}

impl CustomNpc {
    pub fn new(slot: NpcSlot, definition: Arc<NpcDefinition>) -> Self {
        Self { slot, definition }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub replaced: usize,
    pub spawned: usize,
    /// Players skipped because their custom load was over the limit
    pub saturated_players: usize,
}

pub struct SpawnDirector {
    registry: Arc<RegistryHandle>,
    config: SpawnConfig,
    rng: Xoshiro256PlusPlus,
    /// Roll coin stacks down like vanilla drops
    shrink_coins: bool,
    attachments: Vec<Option<CustomNpc>>,
    evaluated: Vec<bool>,
    /// Slots the director populated since the last tick. A spawn notification
    /// for one of these is absorbed; the flags expire at the next tick.
    own_spawns: Vec<bool>,
    active_load: Vec<f32>,
    collision_debounced: Vec<bool>,
    kill_tallies: HashMap<String, u64>,
}

impl SpawnDirector {
    pub fn new(registry: Arc<RegistryHandle>, config: SpawnConfig) -> Self {
        Self {
            registry,
            config,
            rng: Xoshiro256PlusPlus::from_entropy(),
            shrink_coins: true,
            attachments: vec![None; MAX_NPCS],
            evaluated: vec![false; MAX_NPCS],
            own_spawns: vec![false; MAX_NPCS],
            active_load: vec![0.0; MAX_PLAYERS],
            collision_debounced: vec![false; MAX_PLAYERS],
            kill_tallies: HashMap::new(),
        }
    }

    /// Deterministic random stream for replays and tests
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        self
    }

    pub fn with_coin_shrink(mut self, shrink: bool) -> Self {
        self.shrink_coins = shrink;
        self
    }

    pub fn registry(&self) -> &Arc<RegistryHandle> {
        &self.registry
    }

    pub fn config(&self) -> &SpawnConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SpawnConfig {
        &mut self.config
    }

    /// The attachment for `slot`, if the slot holds a live custom NPC
    pub fn get_custom_npc(&self, world: &dyn GameWorld, slot: NpcSlot) -> Option<&CustomNpc> {
        world.active_npc(slot)?;
        self.attachments.get(slot)?.as_ref()
    }

    /// Every live custom NPC, by slot
    pub fn custom_npcs<'a>(
        &'a self,
        world: &'a dyn GameWorld,
    ) -> impl Iterator<Item = &'a CustomNpc> + 'a {
        self.attachments
            .iter()
            .enumerate()
            .filter(move |(slot, _)| world.active_npc(*slot).is_some())
            .filter_map(|(_, custom)| custom.as_ref())
    }

    /// Summed slot cost of custom NPCs around `player` as of the last tick
    pub fn active_load(&self, player: PlayerSlot) -> f32 {
        self.active_load.get(player).copied().unwrap_or(0.0)
    }

    pub fn kill_tally(&self, name: &str) -> u64 {
        self.kill_tallies.get(name).copied().unwrap_or(0)
    }

    /// Run both passes over the world.
    pub fn tick(&mut self, world: &mut dyn GameWorld) -> TickReport {
        let registry = self.registry.snapshot();
        self.fit(world);
        self.release_stale(world);
        // Notifications for our own spawns arrive before the next tick or never.
        self.own_spawns.fill(false);

        let mut report = TickReport {
            replaced: self.replacement_scan(world, &registry),
            ..TickReport::default()
        };
        let (spawned, saturated) = self.spawn_scan(world, &registry);
        report.spawned = spawned;
        report.saturated_players = saturated;

        if report.replaced > 0 || report.spawned > 0 {
            debug!(
                replaced = report.replaced,
                spawned = report.spawned,
                "Custom NPC tick"
            );
        }
        report
    }

    fn fit(&mut self, world: &dyn GameWorld) {
        let npcs = world.npc_capacity();
        if self.attachments.len() != npcs {
            self.attachments.resize(npcs, None);
            self.evaluated.resize(npcs, false);
            self.own_spawns.resize(npcs, false);
        }
        let players = world.player_capacity();
        if self.active_load.len() != players {
            self.active_load.resize(players, 0.0);
            self.collision_debounced.resize(players, false);
        }
    }

    /// Forget everything about slots the host has emptied
    fn release_stale(&mut self, world: &dyn GameWorld) {
        for slot in 0..self.attachments.len() {
            if world.active_npc(slot).is_none() {
                self.attachments[slot] = None;
                self.evaluated[slot] = false;
            }
        }
    }

    fn replacement_scan(&mut self, world: &mut dyn GameWorld, registry: &DefinitionRegistry) -> usize {
        let _span = TimingSpan::new("replacement_scan");
        let mut replaced = 0;

        for slot in 0..self.attachments.len() {
            let Some(npc) = world.active_npc(slot) else {
                continue;
            };
            let net_id = npc.net_id;
            let hitbox = npc.hitbox();

            if let Some(custom) = self.attachments[slot].clone() {
                self.update_custom(world, &custom, hitbox);
                continue;
            }

            if self.evaluated[slot] {
                continue;
            }
            self.evaluated[slot] = true;

            for definition in registry
                .all()
                .iter()
                .filter(|d| d.replacement_target() == Some(net_id))
            {
                let chance = definition.hooks().fire_check_replace(
                    &definition.name,
                    world,
                    slot,
                    definition.replacement_chance(),
                );
                if self.rng.gen::<f64>() >= chance {
                    continue;
                }
                match self.replace(world, slot, definition) {
                    Ok(_) => replaced += 1,
                    Err(err) => debug!(slot, error = %err, "Replacement skipped"),
                }
                break;
            }
        }
        replaced
    }

    fn update_custom(&mut self, world: &mut dyn GameWorld, custom: &CustomNpc, hitbox: Rect) {
        if custom.definition.should_aggressively_update() {
            if let Some(npc) = world.npc_mut(custom.slot) {
                npc.net_update = true;
            }
        }
        let hooks = custom.definition.hooks();
        if hooks.has_tile_collision() {
            let tiles = overlapped_tiles(&*world, hitbox);
            if !tiles.is_empty() {
                hooks.fire_tile_collision(world, custom, &tiles);
            }
        }
    }

    fn replace(
        &mut self,
        world: &mut dyn GameWorld,
        slot: NpcSlot,
        definition: &Arc<NpcDefinition>,
    ) -> Result<(), NpcError> {
        world.set_defaults(slot, definition.base_type);
        let custom = self.attach(world, slot, Arc::clone(definition))?;
        world.broadcast_npc_resync(slot);
        info!(slot, definition = %definition.name, "Replaced vanilla NPC");
        definition.hooks().fire_spawn(world, &custom);
        Ok(())
    }

    /// Apply `definition` to the NPC in `slot` and record it as custom.
    pub fn attach(
        &mut self,
        world: &mut dyn GameWorld,
        slot: NpcSlot,
        definition: Arc<NpcDefinition>,
    ) -> Result<CustomNpc, NpcError> {
        AttributeApplier::apply(&definition, world, slot)?;
        if slot >= self.attachments.len() {
            self.fit(world);
        }
        let entry = self
            .attachments
            .get_mut(slot)
            .ok_or_else(|| NpcError::InvalidArgument(format!("slot {slot} out of range")))?;
        let custom = CustomNpc::new(slot, definition);
        *entry = Some(custom.clone());
        Ok(custom)
    }

    fn spawn_scan(&mut self, world: &mut dyn GameWorld, registry: &DefinitionRegistry) -> (usize, usize) {
        let _span = TimingSpan::new("spawn_scan");
        let max_spawns = self.config.max_spawns as f32;
        let mut spawned = 0;
        let mut saturated = 0;

        for player_slot in 0..self.active_load.len() {
            let Some(player) = world.active_player(player_slot) else {
                continue;
            };
            let player_box = player.hitbox();
            let active_rect = player.active_rect();
            let anchor = player.tile();
            if !player.immune {
                self.collision_debounced[player_slot] = false;
            }

            let load = self.measure_load(world, player_slot, player_box, active_rect);
            self.active_load[player_slot] = load;
            if load > max_spawns {
                trace!(player = player_slot, load, "Custom load over limit");
                saturated += 1;
                continue;
            }

            let Some(site) = find_spawn_site(&*world, anchor, &mut self.rng) else {
                continue;
            };

            for definition in registry.all().iter().filter(|d| d.should_spawn()) {
                let bound = (f64::from(self.config.spawn_rate) * definition.spawn_rate_multiplier())
                    .max(1.0) as u64;
                if self.rng.gen_range(0..bound) != 0 {
                    continue;
                }
                if !definition
                    .hooks()
                    .fire_check_spawn(&definition.name, world, player_slot, site.x, site.y)
                {
                    continue;
                }
                let (x, y) = site.spawn_position();
                match self.spawn_definition(world, definition, x, y) {
                    Ok(slot) => {
                        spawned += 1;
                        info!(slot, player = player_slot, definition = %definition.name, "Spawned custom NPC");
                    }
                    Err(err) => debug!(error = %err, "Custom spawn skipped"),
                }
                break;
            }
        }
        (spawned, saturated)
    }

    /// Sum custom slot costs near the player and fire at most one collision.
    fn measure_load(
        &mut self,
        world: &mut dyn GameWorld,
        player_slot: PlayerSlot,
        player_box: Rect,
        active_rect: Rect,
    ) -> f32 {
        let mut load = 0.0;
        for slot in 0..self.attachments.len() {
            let Some(custom) = self.attachments[slot].clone() else {
                continue;
            };
            let Some(npc) = world.active_npc(slot) else {
                continue;
            };
            let hitbox = npc.hitbox();
            if hitbox.intersects(&active_rect) {
                load += npc.npc_slots;
            }
            if hitbox.intersects(&player_box) && !self.collision_debounced[player_slot] {
                custom.definition.hooks().fire_collision(world, &custom, player_slot);
                self.collision_debounced[player_slot] = true;
            }
        }
        load
    }

    /// Spawn a custom NPC by name at world-pixel coordinates.
    pub fn spawn_custom_npc(
        &mut self,
        world: &mut dyn GameWorld,
        name: &str,
        x: i32,
        y: i32,
    ) -> Result<NpcSlot, NpcError> {
        let definition = self
            .registry
            .snapshot()
            .find_by_name(name)
            .cloned()
            .ok_or_else(|| NpcError::UnknownDefinition(name.to_string()))?;
        self.spawn_definition(world, &definition, x, y)
    }

    /// Spawn `amount` custom NPCs at random clear tiles within `range` tiles
    /// of `origin`. Stops at the first failure; slots spawned so far stay.
    pub fn spawn_around(
        &mut self,
        world: &mut dyn GameWorld,
        name: &str,
        origin: TilePoint,
        range: i32,
        amount: usize,
    ) -> Result<Vec<NpcSlot>, NpcError> {
        let definition = self
            .registry
            .snapshot()
            .find_by_name(name)
            .cloned()
            .ok_or_else(|| NpcError::UnknownDefinition(name.to_string()))?;

        let mut slots = Vec::with_capacity(amount);
        for _ in 0..amount {
            let tile = random_clear_tile_in_range(&*world, origin, range, range, &mut self.rng);
            let (x, y) = tile.spawn_position();
            slots.push(self.spawn_definition(world, &definition, x, y)?);
        }
        Ok(slots)
    }

    fn spawn_definition(
        &mut self,
        world: &mut dyn GameWorld,
        definition: &Arc<NpcDefinition>,
        x: i32,
        y: i32,
    ) -> Result<NpcSlot, NpcError> {
        let slot = world
            .spawn_npc(x, y, definition.base_type)
            .ok_or_else(|| NpcError::SlotsExhausted(definition.name.clone()))?;
        let custom = self.attach(world, slot, Arc::clone(definition))?;
        self.own_spawns[slot] = true;
        self.evaluated[slot] = true;
        world.broadcast_npc_resync(slot);
        definition.hooks().fire_spawn(world, &custom);
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{BaseOverride, SpawningDefinition};
    use crate::sandbox::SandboxWorld;
    use crate::scripting::HookTable;
    use crate::world::Player;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn replacing(name: &str, target: i32, chance: f64) -> NpcDefinition {
        NpcDefinition::new(name, target).with_spawning(SpawningDefinition {
            replacement_target_type: Some(target),
            replacement_chance: Some(chance),
            ..SpawningDefinition::default()
        })
    }

    fn director(definitions: Vec<NpcDefinition>) -> SpawnDirector {
        let mut registry = DefinitionRegistry::new();
        for definition in definitions {
            registry.register(definition).unwrap();
        }
        SpawnDirector::new(Arc::new(RegistryHandle::new(registry)), SpawnConfig::default())
            .with_seed(42)
    }

    #[test]
    fn test_certain_replacement() {
        let mut world = SandboxWorld::new(100, 100);
        let slot = world.add_npc(5, (80.0, 80.0)).unwrap();
        let mut director = director(vec![replacing("zombie-king", 5, 1.0)]);

        let report = director.tick(&mut world);
        assert_eq!(report.replaced, 1);
        assert_eq!(director.get_custom_npc(&world, slot).unwrap().name(), "zombie-king");
        assert_eq!(world.resyncs, vec![slot]);
    }

    #[test]
    fn test_zero_chance_never_replaces() {
        let mut world = SandboxWorld::new(100, 100);
        for i in 0..20 {
            world.add_npc(5, (i as f32 * 16.0, 0.0));
        }
        let mut director = director(vec![replacing("never", 5, 0.0)]);
        for _ in 0..10 {
            assert_eq!(director.tick(&mut world).replaced, 0);
        }
        assert_eq!(director.custom_npcs(&world).count(), 0);
    }

    #[test]
    fn test_other_archetypes_ignored() {
        let mut world = SandboxWorld::new(100, 100);
        let slot = world.add_npc(6, (0.0, 0.0)).unwrap();
        let mut director = director(vec![replacing("fives-only", 5, 1.0)]);
        director.tick(&mut world);
        assert!(director.get_custom_npc(&world, slot).is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let mut world = SandboxWorld::new(100, 100);
        let slot = world.add_npc(5, (0.0, 0.0)).unwrap();
        let mut director = director(vec![replacing("first", 5, 1.0), replacing("second", 5, 1.0)]);
        director.tick(&mut world);
        assert_eq!(director.get_custom_npc(&world, slot).unwrap().name(), "first");
    }

    #[test]
    fn test_evaluated_once_until_respawn() {
        let mut world = SandboxWorld::new(100, 100);
        let slot = world.add_npc(5, (0.0, 0.0)).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let def = replacing("picky", 5, 0.0).with_hooks(HookTable::new().on_check_replace(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(0.0)
        }));
        let mut director = director(vec![def]);

        director.tick(&mut world);
        director.tick(&mut world);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        director.on_npc_spawned(slot);
        director.tick(&mut world);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_check_replace_overrides_chance() {
        let mut world = SandboxWorld::new(100, 100);
        let slot = world.add_npc(5, (0.0, 0.0)).unwrap();
        let def = replacing("forced", 5, 0.0)
            .with_hooks(HookTable::new().on_check_replace(|_, _| Ok(1.0)));
        let mut director = director(vec![def]);
        director.tick(&mut world);
        assert!(director.get_custom_npc(&world, slot).is_some());
    }

    #[test]
    fn test_aggressive_update_flags_every_tick() {
        let mut world = SandboxWorld::new(100, 100);
        let slot = world.add_npc(5, (0.0, 0.0)).unwrap();
        let def = replacing("floaty", 5, 1.0).with_override(BaseOverride {
            has_no_gravity: Some(true),
            ..BaseOverride::default()
        });
        let mut director = director(vec![def]);
        director.tick(&mut world);
        world.npc_mut(slot).unwrap().net_update = false;
        director.tick(&mut world);
        assert!(world.npc(slot).unwrap().net_update);
    }

    #[test]
    fn test_stale_attachment_released() {
        let mut world = SandboxWorld::new(100, 100);
        let slot = world.add_npc(5, (0.0, 0.0)).unwrap();
        let mut director = director(vec![replacing("brief", 5, 1.0)]);
        director.tick(&mut world);
        world.remove_npc(slot);
        director.tick(&mut world);
        world.add_npc(6, (0.0, 0.0));
        assert!(director.get_custom_npc(&world, slot).is_none());
    }

    #[test]
    fn test_recycled_slot_after_kill_is_vanilla() {
        let mut world = SandboxWorld::new(100, 100);
        let mut director = director(vec![NpcDefinition::new("summoned", 3)]);
        let slot = director.spawn_custom_npc(&mut world, "summoned", 400, 400).unwrap();
        director.tick(&mut world);

        director.on_npc_killed(&mut world, slot);
        world.remove_npc(slot);
        assert_eq!(world.add_npc(7, (0.0, 0.0)), Some(slot));
        director.on_npc_spawned(slot);
        director.tick(&mut world);

        assert_eq!(world.npc(slot).unwrap().net_id, 7);
        assert!(director.get_custom_npc(&world, slot).is_none());
    }

    #[test]
    fn test_unreported_own_spawn_expires_at_tick() {
        let mut world = SandboxWorld::new(100, 100);
        let mut director = director(vec![NpcDefinition::new("summoned", 3)]);
        let slot = director.spawn_custom_npc(&mut world, "summoned", 400, 400).unwrap();
        director.tick(&mut world);
        assert!(!director.own_spawns[slot]);

        // Despawned without a kill and refilled before the next tick.
        world.remove_npc(slot);
        assert_eq!(world.add_npc(7, (0.0, 0.0)), Some(slot));
        director.on_npc_spawned(slot);
        assert!(director.get_custom_npc(&world, slot).is_none());
    }

    #[test]
    fn test_load_over_limit_skips_player() {
        let mut world = SandboxWorld::new(300, 200);
        world.fill_ground(150);
        world.add_player(Player::new("alice", (3200.0, 2000.0))).unwrap();
        let mut director = director(vec![replacing("heavy", 5, 1.0).with_override(BaseOverride {
            npc_slots: Some(10.0),
            ..BaseOverride::default()
        })]);
        world.add_npc(5, (3300.0, 2000.0));

        director.tick(&mut world);
        let report = director.tick(&mut world);
        assert_eq!(report.saturated_players, 1);
        assert_eq!(director.active_load(0), 10.0);
    }

    #[test]
    fn test_collision_fires_once_while_immune() {
        let mut world = SandboxWorld::new(300, 200);
        let player = world.add_player(Player::new("bob", (160.0, 160.0))).unwrap();
        world.player_mut(player).unwrap().immune = true;
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let def = replacing("spiky", 5, 1.0).with_hooks(HookTable::new().on_collision(move |_, _, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        let mut director = director(vec![def]);
        world.add_npc(5, (165.0, 165.0));
        world.add_npc(5, (170.0, 165.0));

        director.tick(&mut world);
        director.tick(&mut world);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        world.player_mut(player).unwrap().immune = false;
        director.tick(&mut world);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_spawn_custom_npc_by_name() {
        let mut world = SandboxWorld::new(100, 100);
        let mut director = director(vec![NpcDefinition::new("summoned", 3)]);
        let slot = director.spawn_custom_npc(&mut world, "summoned", 400, 400).unwrap();
        assert_eq!(world.npc(slot).unwrap().net_id, 3);
        assert_eq!(director.get_custom_npc(&world, slot).unwrap().name(), "summoned");

        let err = director.spawn_custom_npc(&mut world, "missing", 0, 0).unwrap_err();
        assert!(matches!(err, NpcError::UnknownDefinition(_)));
    }

    #[test]
    fn test_spawn_around_uses_clear_tiles() {
        let mut world = SandboxWorld::new(200, 200);
        world.fill_ground(120);
        let mut director = director(vec![NpcDefinition::new("swarm", 3)]);
        let slots = director
            .spawn_around(&mut world, "swarm", TilePoint::new(100, 100), 50, 4)
            .unwrap();
        assert_eq!(slots.len(), 4);
        assert_eq!(director.custom_npcs(&world).count(), 4);
        assert_eq!(world.resyncs.len(), 4);
    }

    #[test]
    fn test_spawn_fails_when_slots_exhausted() {
        let mut world = SandboxWorld::with_capacity(100, 100, 1, 1);
        world.add_npc(1, (0.0, 0.0));
        let mut director = director(vec![NpcDefinition::new("crowded", 3)]);
        let err = director.spawn_custom_npc(&mut world, "crowded", 0, 0).unwrap_err();
        assert!(matches!(err, NpcError::SlotsExhausted(_)));
    }
}
