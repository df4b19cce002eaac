//! Centralized host-engine constants for the custom NPC core.
//!
//! Mirrors the limits of the host game engine so the bookkeeping arrays and
//! the spawn geometry line up with what the server actually simulates.
//! Per-module tuning (loot rolls, trial caps) stays in the owning module.

// =====================================================
// Slots
// =====================================================

/// Maximum concurrent NPC slots in the host engine
pub const MAX_NPCS: usize = 200;

/// Maximum concurrent player slots in the host engine
pub const MAX_PLAYERS: usize = 255;

// =====================================================
// Archetypes & Buffs
// =====================================================

/// Lowest valid NPC archetype id (negative ids are net-id variants)
pub const MIN_NPC_TYPE: i32 = -65;

/// One past the highest valid NPC archetype id
pub const MAX_NPC_TYPES: i32 = 580;

/// One past the highest valid buff id (buff id 0 is "none")
pub const MAX_BUFF_TYPES: usize = 206;

// =====================================================
// Geometry
// =====================================================

/// Tile edge length in world pixels
pub const TILE_SIZE: i32 = 16;

/// Visible region width in pixels
pub const SCREEN_WIDTH: i32 = 1920;

/// Visible region height in pixels
pub const SCREEN_HEIGHT: i32 = 1080;

/// Half-width of the active-simulation rectangle in pixels (2.1 screens)
pub const ACTIVE_RANGE_X: i32 = (SCREEN_WIDTH as f64 * 2.1) as i32;

/// Half-height of the active-simulation rectangle in pixels (2.1 screens)
pub const ACTIVE_RANGE_Y: i32 = (SCREEN_HEIGHT as f64 * 2.1) as i32;

/// Clearance footprint width in tiles required above a spawn floor
pub const SPAWN_SPACE_X: i32 = 3;

/// Clearance footprint height in tiles required above a spawn floor
pub const SPAWN_SPACE_Y: i32 = 3;

/// Safe rectangle half-extent as a fraction of the visible region
pub const SAFE_RANGE_FACTOR: f64 = 0.52;

/// Candidate rectangle half-extent as a fraction of the visible region
pub const SPAWN_RANGE_FACTOR: f64 = 0.7;

// =====================================================
// Currency
// =====================================================

/// Copper coin item id; silver, gold and platinum follow consecutively
pub const COPPER_COIN_ID: i32 = 71;

/// Platinum coin item id
pub const PLATINUM_COIN_ID: i32 = 74;

/// Coin denominations in copper units, highest first
pub const COIN_DENOMINATIONS: [u64; 4] = [1_000_000, 10_000, 100, 1];

// =====================================================
// Administration
// =====================================================

/// Upper bound for a single force-spawn command
pub const MAX_FORCE_SPAWN: usize = 200;

/// Tile radius searched for clear tiles around a force-spawn issuer
pub const FORCE_SPAWN_RANGE: i32 = 50;
