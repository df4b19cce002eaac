//! Loot economy for custom NPCs.
//!
//! On death a custom NPC drops, in order:
//! - every extra entry of its loot table that wins its independent roll
//! - if the table overrides vanilla loot, its money as coin stacks
//!
//! The two are additive. Vanilla loot is suppressed separately through the
//! loot-drop event when the table is an override.

mod coins;

pub use coins::{coin_value, decompose_coins, CoinStack};

use rand::Rng;
use tracing::debug;

use crate::definition::{LootEntry, NpcDefinition};
use crate::error::NpcError;
use crate::world::{GameWorld, NpcSlot};

/// An item stack rolled from a loot table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemStack {
    pub item_id: i32,
    pub stack: i32,
    pub prefix: u8,
}

/// Everything one death dropped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LootReport {
    pub extra: Vec<ItemStack>,
    pub coins: Vec<CoinStack>,
    /// Rolled money value before decomposition, when the table overrides
    pub coin_value: Option<f64>,
}

/// Roll every entry once; winners get a stack in `[min, max)`
pub fn roll_extra_drops<R: Rng + ?Sized>(entries: &[LootEntry], rng: &mut R) -> Vec<ItemStack> {
    entries
        .iter()
        .filter_map(|entry| {
            if rng.gen::<f64>() >= entry.chance {
                return None;
            }
            let stack = if entry.max_stack_size > entry.min_stack_size {
                rng.gen_range(entry.min_stack_size..entry.max_stack_size)
            } else {
                entry.min_stack_size
            };
            Some(ItemStack {
                item_id: entry.item_id,
                stack,
                prefix: entry.prefix,
            })
        })
        .collect()
}

/// Drop a dead custom NPC's loot into the world.
pub fn drop_loot<R: Rng + ?Sized>(
    definition: &NpcDefinition,
    world: &mut dyn GameWorld,
    slot: NpcSlot,
    rng: &mut R,
    shrink_coins: bool,
) -> Result<LootReport, NpcError> {
    let npc = world
        .npc(slot)
        .ok_or_else(|| NpcError::InvalidArgument(format!("no NPC in slot {slot}")))?;
    let area = npc.hitbox();

    let mut report = LootReport {
        extra: roll_extra_drops(definition.loot_entries(), rng),
        ..LootReport::default()
    };
    if definition.should_override_loot() {
        let value = coin_value(npc, rng);
        report.coins = decompose_coins(value, rng, shrink_coins);
        report.coin_value = Some(value);
    }

    for item in &report.extra {
        world.spawn_item(area, item.item_id, item.stack, item.prefix);
    }
    for coin in &report.coins {
        let stack = i32::try_from(coin.stack).unwrap_or(i32::MAX);
        world.spawn_item(area, coin.item_id, stack, 0);
    }

    debug!(
        slot,
        definition = %definition.name,
        extra = report.extra.len(),
        coins = report.coins.len(),
        "Dropped custom loot"
    );
    Ok(report)
}
