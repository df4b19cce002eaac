//! Attribute applier.
//!
//! Projects a definition's `BaseOverride` onto a live host NPC. Every field is
//! optional and applied independently, so applying twice is the same as
//! applying once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use crate::constants::{MAX_NPC_TYPES, MIN_NPC_TYPE};
use crate::definition::NpcDefinition;
use crate::error::NpcError;
use crate::world::{GameWorld, NpcSlot};

/// Archetypes whose life must travel as four bytes on the wire.
///
/// Flags are only ever set, never cleared, and are shared by every world in
/// the process.
#[derive(Debug)]
pub struct LifeEncodingTable {
    wide: Vec<AtomicBool>,
}

impl LifeEncodingTable {
    fn new() -> Self {
        let len = (MAX_NPC_TYPES - MIN_NPC_TYPE) as usize;
        Self {
            wide: (0..len).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    fn index(net_id: i32) -> Option<usize> {
        (MIN_NPC_TYPE..MAX_NPC_TYPES)
            .contains(&net_id)
            .then(|| (net_id - MIN_NPC_TYPE) as usize)
    }

    pub fn mark_wide(&self, net_id: i32) {
        if let Some(i) = Self::index(net_id) {
            self.wide[i].store(true, Ordering::Relaxed);
        }
    }

    pub fn is_wide(&self, net_id: i32) -> bool {
        Self::index(net_id).is_some_and(|i| self.wide[i].load(Ordering::Relaxed))
    }
}

static LIFE_ENCODING: OnceLock<LifeEncodingTable> = OnceLock::new();

pub struct AttributeApplier;

impl AttributeApplier {
    /// The process-wide life-encoding table
    pub fn life_encoding() -> &'static LifeEncodingTable {
        LIFE_ENCODING.get_or_init(LifeEncodingTable::new)
    }

    /// Apply `definition` to the NPC in `slot`.
    ///
    /// Fails with `InvalidArgument` when the slot is empty or inactive.
    pub fn apply(
        definition: &NpcDefinition,
        world: &mut dyn GameWorld,
        slot: NpcSlot,
    ) -> Result<(), NpcError> {
        let net_id = match world.active_npc(slot) {
            Some(npc) => npc.net_id,
            None => {
                return Err(NpcError::InvalidArgument(format!(
                    "no active NPC in slot {slot}"
                )))
            }
        };

        Self::life_encoding().mark_wide(definition.base_type);

        if net_id != definition.base_type {
            world.set_defaults(slot, definition.base_type);
        }

        let npc = world
            .npc_mut(slot)
            .ok_or_else(|| NpcError::InvalidArgument(format!("slot {slot} vanished")))?;
        let o = &definition.base_override;

        if let Some(ai_style) = o.ai_style {
            npc.ai_style = ai_style;
        }
        if let Some(ids) = &o.buff_immunities {
            npc.buff_immune.iter_mut().for_each(|immune| *immune = false);
            for &id in ids {
                if let Some(immune) = usize::try_from(id).ok().and_then(|i| npc.buff_immune.get_mut(i)) {
                    *immune = true;
                }
            }
        }
        if let Some(defense) = o.defense {
            npc.defense = defense;
            npc.def_defense = defense;
        }
        if let Some(v) = o.has_no_gravity {
            npc.no_gravity = v;
        }
        if let Some(v) = o.has_no_collision {
            npc.no_tile_collide = v;
        }
        if let Some(v) = o.behind_tiles {
            npc.behind_tiles = v;
        }
        if let Some(v) = o.is_boss {
            npc.boss = v;
        }
        if let Some(v) = o.is_immortal {
            npc.immortal = v;
        }
        if let Some(v) = o.is_immune_to_lava {
            npc.lava_immune = v;
        }
        if let Some(v) = o.is_trap_immune {
            npc.trap_immune = v;
        }
        if let Some(v) = o.dont_take_damage_from_hostiles {
            npc.dont_take_damage_from_hostiles = v;
        }
        if let Some(v) = o.knockback_multiplier {
            npc.knockback_resist = v;
        }
        // Life only; the cap stays at the archetype's so clients see real life.
        if let Some(max_hp) = o.max_hp {
            npc.life = max_hp;
        }
        if let Some(name) = &o.name {
            npc.given_name = name.clone();
        }
        if let Some(v) = o.npc_slots {
            npc.npc_slots = v;
        }
        if let Some(v) = o.value {
            npc.value = v;
        }
        Ok(())
    }
}
