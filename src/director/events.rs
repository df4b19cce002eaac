//! Host lifecycle notifications.
//!
//! The host forwards these from its own event hooks. Callbacks returning
//! `bool` report whether the event was handled and the vanilla behaviour
//! should be skipped.

use tracing::debug;

use super::SpawnDirector;
use crate::loot::{drop_loot, LootReport};
use crate::scripting::Strike;
use crate::world::{GameWorld, NpcSlot};

impl SpawnDirector {
    /// The host populated `slot` with a fresh NPC.
    pub fn on_npc_spawned(&mut self, slot: NpcSlot) {
        let Some(own) = self.own_spawns.get_mut(slot) else {
            return;
        };
        // Our own spawn reporting back: the attachment is already current.
        if std::mem::take(own) {
            return;
        }
        self.evaluated[slot] = false;
        self.attachments[slot] = None;
    }

    /// The NPC in `slot` changed archetype in place.
    pub fn on_npc_transformed(&mut self, world: &mut dyn GameWorld, slot: NpcSlot) {
        let Some(evaluated) = self.evaluated.get_mut(slot) else {
            return;
        };
        *evaluated = false;
        if let Some(custom) = self.get_custom_npc(world, slot).cloned() {
            custom.definition.hooks().fire_transformed(world, &custom);
        }
    }

    /// Returns true when a script took over this AI update.
    pub fn on_npc_ai_update(&mut self, world: &mut dyn GameWorld, slot: NpcSlot) -> bool {
        match self.get_custom_npc(world, slot).cloned() {
            Some(custom) => custom.definition.hooks().fire_ai_update(world, &custom),
            None => false,
        }
    }

    /// Returns true when a script handled the strike.
    pub fn on_npc_strike(&mut self, world: &mut dyn GameWorld, slot: NpcSlot, strike: Strike) -> bool {
        let Some(custom) = self.get_custom_npc(world, slot).cloned() else {
            return false;
        };
        if custom.definition.should_update_on_hit() {
            if let Some(npc) = world.npc_mut(slot) {
                npc.net_update = true;
            }
        }
        custom.definition.hooks().fire_strike(world, &custom, strike)
    }

    /// A custom NPC died: run its death hook, tally it and drop its loot.
    ///
    /// The attachment survives until the slot goes inactive so that the
    /// loot-drop notifications that follow still see it. The next spawn
    /// notification for the slot always starts fresh.
    pub fn on_npc_killed(&mut self, world: &mut dyn GameWorld, slot: NpcSlot) -> Option<LootReport> {
        if let Some(own) = self.own_spawns.get_mut(slot) {
            *own = false;
        }
        let custom = self.get_custom_npc(world, slot).cloned()?;
        let definition = &custom.definition;
        definition.hooks().fire_killed(world, &custom);

        if definition.should_tally_kills() {
            *self.kill_tallies.entry(definition.name.clone()).or_insert(0) += 1;
        }

        match drop_loot(definition, world, slot, &mut self.rng, self.shrink_coins) {
            Ok(report) => Some(report),
            Err(err) => {
                debug!(slot, error = %err, "Custom loot skipped");
                None
            }
        }
    }

    /// Returns true when vanilla loot for `slot` must be suppressed.
    pub fn on_npc_loot_drop(&self, world: &dyn GameWorld, slot: NpcSlot) -> bool {
        self.get_custom_npc(world, slot)
            .is_some_and(|custom| custom.definition.should_override_loot())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::config::SpawnConfig;
    use crate::definition::{BaseOverride, LootDefinition, LootEntry, NpcDefinition};
    use crate::director::SpawnDirector;
    use crate::error::ScriptError;
    use crate::registry::{DefinitionRegistry, RegistryHandle};
    use crate::sandbox::SandboxWorld;
    use crate::scripting::{HookTable, Strike};
    use crate::world::GameWorld;

    fn setup(definition: NpcDefinition) -> (SpawnDirector, SandboxWorld, usize) {
        let name = definition.name.clone();
        let mut registry = DefinitionRegistry::new();
        registry.register(definition).unwrap();
        let mut director =
            SpawnDirector::new(Arc::new(RegistryHandle::new(registry)), SpawnConfig::default())
                .with_seed(5);
        let mut world = SandboxWorld::new(100, 100);
        let slot = director.spawn_custom_npc(&mut world, &name, 200, 200).unwrap();
        (director, world, slot)
    }

    fn strike() -> Strike {
        Strike {
            player: 0,
            damage: 12,
            knockback: 4.0,
            critical: false,
        }
    }

    #[test]
    fn test_own_spawn_notification_keeps_attachment() {
        let (mut director, world, slot) = setup(NpcDefinition::new("kept", 1));
        director.on_npc_spawned(slot);
        assert!(director.get_custom_npc(&world, slot).is_some());

        director.on_npc_spawned(slot);
        assert!(director.get_custom_npc(&world, slot).is_none());
    }

    #[test]
    fn test_kill_clears_pending_own_spawn() {
        let (mut director, mut world, slot) = setup(NpcDefinition::new("doomed", 1));
        director.on_npc_killed(&mut world, slot);
        world.remove_npc(slot);
        assert_eq!(world.add_npc(7, (0.0, 0.0)), Some(slot));

        director.on_npc_spawned(slot);
        assert!(director.get_custom_npc(&world, slot).is_none());
    }

    #[test]
    fn test_strike_flags_update_and_reports_handled() {
        let def = NpcDefinition::new("armored", 1)
            .with_override(BaseOverride {
                defense: Some(50),
                ..BaseOverride::default()
            })
            .with_hooks(HookTable::new().on_strike(|_, _, strike| Ok(strike.damage > 10)));
        let (mut director, mut world, slot) = setup(def);

        assert!(director.on_npc_strike(&mut world, slot, strike()));
        assert!(world.npc(slot).unwrap().net_update);
        assert!(!director.on_npc_strike(&mut world, 150, strike()));
    }

    #[test]
    fn test_faulting_strike_is_not_handled() {
        let def = NpcDefinition::new("brittle", 1).with_hooks(
            HookTable::new().on_strike(|_, _, _| Err(ScriptError::Runtime("bad".into()))),
        );
        let (mut director, mut world, slot) = setup(def);
        assert!(!director.on_npc_strike(&mut world, slot, strike()));
    }

    #[test]
    fn test_ai_update_hook() {
        let def = NpcDefinition::new("puppet", 1)
            .with_hooks(HookTable::new().on_ai_update(|_, _| Ok(true)));
        let (mut director, mut world, slot) = setup(def);
        assert!(director.on_npc_ai_update(&mut world, slot));
    }

    #[test]
    fn test_transform_fires_hook_and_resets() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let def = NpcDefinition::new("shifter", 1).with_hooks(HookTable::new().on_transformed(
            move |_, _| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        ));
        let (mut director, mut world, slot) = setup(def);
        director.on_npc_transformed(&mut world, slot);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!director.evaluated[slot]);
    }

    #[test]
    fn test_kill_drops_loot_and_tallies() {
        let def = NpcDefinition::new("pinata", 1).with_loot(LootDefinition {
            tally_kills: true,
            is_override: true,
            entries: Some(vec![LootEntry::new(29, 1, 1, 1.0)]),
        });
        let (mut director, mut world, slot) = setup(def);
        world.npc_mut(slot).unwrap().value = 300.0;

        let report = director.on_npc_killed(&mut world, slot).unwrap();
        assert_eq!(report.extra.len(), 1);
        assert!(report.coin_value.is_some());
        assert_eq!(director.kill_tally("pinata"), 1);
        assert!(director.on_npc_loot_drop(&world, slot));
        assert_eq!(director.kill_tally("nobody"), 0);
    }

    #[test]
    fn test_vanilla_npc_events_are_ignored() {
        let (mut director, mut world, _) = setup(NpcDefinition::new("lonely", 1));
        let vanilla = world.add_npc(2, (0.0, 0.0)).unwrap();
        assert!(director.on_npc_killed(&mut world, vanilla).is_none());
        assert!(!director.on_npc_loot_drop(&world, vanilla));
        assert!(!director.on_npc_ai_update(&mut world, vanilla));
        assert!(world.items.is_empty());
    }
}
