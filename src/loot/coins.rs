//! Currency decomposition.

use rand::Rng;

use crate::constants::{COIN_DENOMINATIONS, PLATINUM_COIN_ID};
use crate::world::Npc;

/// Stacks above this size may be broken up
const LARGE_STACK: u64 = 50;

/// One-in-N chance of shrinking a stack
const SHRINK_ODDS: u32 = 5;

/// Denominators of the independent bonus rolls
const BONUS_ROLLS: [i32; 4] = [5, 10, 15, 20];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinStack {
    pub item_id: i32,
    pub stack: u64,
}

impl CoinStack {
    /// Copper value of the whole stack
    pub fn value(&self) -> u64 {
        let index = (PLATINUM_COIN_ID - self.item_id) as usize;
        COIN_DENOMINATIONS.get(index).copied().unwrap_or(0) * self.stack
    }
}

/// Money an NPC is worth at death, in copper, with all random bonuses rolled.
pub fn coin_value<R: Rng + ?Sized>(npc: &Npc, rng: &mut R) -> f64 {
    let mut value = npc.value as f64;
    if npc.midas {
        value *= 1.0 + rng.gen_range(10..50) as f64 * 0.01;
    }
    value *= 1.0 + rng.gen_range(-20..21) as f64 * 0.01;
    for w in BONUS_ROLLS {
        if rng.gen_range(0..w) == 0 {
            value *= 1.0 + rng.gen_range(w..2 * w + 1) as f64 * 0.01;
        }
    }
    value + npc.extra_value as f64
}

/// Break `value` into coin stacks, platinum first.
///
/// With `shrink` set, stacks are randomly divided down the way vanilla coin
/// drops are, so the total may fall short of `value`; it never exceeds it.
/// Fractions of a copper are dropped.
pub fn decompose_coins<R: Rng + ?Sized>(value: f64, rng: &mut R, shrink: bool) -> Vec<CoinStack> {
    let mut remaining = if value.is_finite() && value > 0.0 {
        value.floor() as u64
    } else {
        0
    };

    let mut stacks = Vec::new();
    for (i, &size) in COIN_DENOMINATIONS.iter().enumerate() {
        if remaining == 0 {
            break;
        }
        let mut stack = remaining / size;
        if shrink {
            stack = shrink_stack(stack, size == 1, rng);
        }
        if stack == 0 {
            continue;
        }
        remaining -= stack * size;
        stacks.push(CoinStack {
            item_id: PLATINUM_COIN_ID - i as i32,
            stack,
        });
    }
    stacks
}

fn shrink_stack<R: Rng + ?Sized>(mut stack: u64, lowest: bool, rng: &mut R) -> u64 {
    if stack > LARGE_STACK && rng.gen_range(0..SHRINK_ODDS) == 0 {
        stack /= rng.gen_range(1..=3);
    }
    if lowest {
        if rng.gen_range(0..SHRINK_ODDS) == 0 {
            stack /= rng.gen_range(1..=4);
        }
        // Only reached with at least one copper left
        stack.max(1)
    } else {
        if rng.gen_range(0..SHRINK_ODDS) == 0 {
            stack /= rng.gen_range(1..=3);
        }
        stack
    }
}
