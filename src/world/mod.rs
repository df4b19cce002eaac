//! Host engine interface.
//!
//! The core only consumes a narrow slice of the game engine: entity and
//! player slots, tile queries and world bounds. It calls back into the engine
//! to reset entities, spawn entities and items, and broadcast resyncs.

use crate::constants::{ACTIVE_RANGE_X, ACTIVE_RANGE_Y, MAX_BUFF_TYPES, TILE_SIZE};

pub mod tiles;

pub use tiles::overlapped_tiles;

/// Index into the host's fixed-capacity NPC array
pub type NpcSlot = usize;

/// Index into the host's fixed-capacity player array
pub type PlayerSlot = usize;

/// Tile grid coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TilePoint {
    pub x: i32,
    pub y: i32,
}

impl TilePoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// World-pixel spawn position for an entity standing on this floor tile
    pub fn spawn_position(&self) -> (i32, i32) {
        (self.x * TILE_SIZE + TILE_SIZE / 2, self.y * TILE_SIZE)
    }
}

/// Axis-aligned integer rectangle, half-open on the far edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        other.x < self.right()
            && self.x < other.right()
            && other.y < self.bottom()
            && self.y < other.bottom()
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// Mutable attributes of a host NPC slot that the core reads or overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Npc {
    pub active: bool,
    /// Current archetype (net id)
    pub net_id: i32,
    pub position: (f32, f32),
    pub width: i32,
    pub height: i32,
    pub ai_style: i32,
    pub defense: i32,
    pub def_defense: i32,
    pub life: i32,
    pub life_max: i32,
    pub knockback_resist: f32,
    pub no_gravity: bool,
    pub no_tile_collide: bool,
    pub behind_tiles: bool,
    pub boss: bool,
    pub immortal: bool,
    pub lava_immune: bool,
    pub trap_immune: bool,
    pub dont_take_damage_from_hostiles: bool,
    pub npc_slots: f32,
    pub value: f32,
    pub extra_value: f32,
    /// Carries the Midas debuff (bonus coin drop)
    pub midas: bool,
    pub given_name: String,
    pub buff_immune: Vec<bool>,
    /// Requests a state resync to clients on the next network flush
    pub net_update: bool,
}

impl Npc {
    /// A fresh active NPC of the given archetype with neutral attributes
    pub fn new(net_id: i32, position: (f32, f32)) -> Self {
        Self {
            active: true,
            net_id,
            position,
            width: 18,
            height: 40,
            ai_style: 0,
            defense: 0,
            def_defense: 0,
            life: 1,
            life_max: 1,
            knockback_resist: 1.0,
            no_gravity: false,
            no_tile_collide: false,
            behind_tiles: false,
            boss: false,
            immortal: false,
            lava_immune: false,
            trap_immune: false,
            dont_take_damage_from_hostiles: false,
            npc_slots: 1.0,
            value: 0.0,
            extra_value: 0.0,
            midas: false,
            given_name: String::new(),
            buff_immune: vec![false; MAX_BUFF_TYPES],
            net_update: false,
        }
    }

    pub fn hitbox(&self) -> Rect {
        Rect::new(
            self.position.0 as i32,
            self.position.1 as i32,
            self.width,
            self.height,
        )
    }

    /// Ids of every buff this NPC is currently immune to
    pub fn immunities(&self) -> Vec<usize> {
        self.buff_immune
            .iter()
            .enumerate()
            .filter_map(|(id, immune)| immune.then_some(id))
            .collect()
    }
}

/// Host player slot state.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub active: bool,
    pub name: String,
    pub position: (f32, f32),
    pub width: i32,
    pub height: i32,
    /// Inside the post-hit damage-immunity window
    pub immune: bool,
}

impl Player {
    pub fn new(name: impl Into<String>, position: (f32, f32)) -> Self {
        Self {
            active: true,
            name: name.into(),
            position,
            width: 20,
            height: 42,
            immune: false,
        }
    }

    pub fn hitbox(&self) -> Rect {
        Rect::new(
            self.position.0 as i32,
            self.position.1 as i32,
            self.width,
            self.height,
        )
    }

    /// Column of the player's center
    pub fn tile_x(&self) -> i32 {
        ((self.position.0 + self.width as f32 / 2.0) / TILE_SIZE as f32) as i32
    }

    /// Row of the player's feet
    pub fn tile_y(&self) -> i32 {
        ((self.position.1 + self.height as f32) / TILE_SIZE as f32) as i32
    }

    pub fn tile(&self) -> TilePoint {
        TilePoint::new(self.tile_x(), self.tile_y())
    }

    /// Player-centered rectangle inside which NPCs are actively simulated
    pub fn active_rect(&self) -> Rect {
        let center_x = (self.position.0 + self.width as f32 / 2.0) as i32;
        let center_y = (self.position.1 + self.height as f32 / 2.0) as i32;
        Rect::new(
            center_x - ACTIVE_RANGE_X,
            center_y - ACTIVE_RANGE_Y,
            ACTIVE_RANGE_X * 2,
            ACTIVE_RANGE_Y * 2,
        )
    }
}

/// Read-only tile queries used by the spawn-site search.
pub trait TileMap {
    /// World width in tiles
    fn width(&self) -> i32;

    /// World height in tiles
    fn height(&self) -> i32;

    /// Active tile whose type blocks movement
    fn is_solid(&self, x: i32, y: i32) -> bool;

    /// Tile backed by a house wall (no natural spawns)
    fn is_house_wall(&self, x: i32, y: i32) -> bool;

    fn is_lava(&self, x: i32, y: i32) -> bool;

    /// Active tile carrying a block, a wall or liquid
    fn is_occupied(&self, x: i32, y: i32) -> bool;

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width() && y < self.height()
    }

    /// Tile fully free of blocks and liquid, suitable for a forced spawn
    fn is_clear(&self, x: i32, y: i32) -> bool {
        self.in_bounds(x, y) && !self.is_solid(x, y) && !self.is_lava(x, y)
    }
}

/// The slice of the host engine driven by the tick orchestrator.
pub trait GameWorld: TileMap {
    fn npc_capacity(&self) -> usize;

    fn player_capacity(&self) -> usize;

    fn npc(&self, slot: NpcSlot) -> Option<&Npc>;

    fn npc_mut(&mut self, slot: NpcSlot) -> Option<&mut Npc>;

    fn player(&self, slot: PlayerSlot) -> Option<&Player>;

    /// Reset the slot to the archetype's vanilla defaults
    fn set_defaults(&mut self, slot: NpcSlot, net_id: i32);

    /// Spawn a vanilla NPC at world-pixel coordinates
    fn spawn_npc(&mut self, x: i32, y: i32, net_id: i32) -> Option<NpcSlot>;

    /// Drop an item stack inside the given area
    fn spawn_item(&mut self, area: Rect, item_id: i32, stack: i32, prefix: u8);

    /// Send the slot's full state and display name to every client
    fn broadcast_npc_resync(&mut self, slot: NpcSlot);

    /// Slot of an active NPC, if any
    fn active_npc(&self, slot: NpcSlot) -> Option<&Npc> {
        self.npc(slot).filter(|npc| npc.active)
    }

    fn active_player(&self, slot: PlayerSlot) -> Option<&Player> {
        self.player(slot).filter(|player| player.active)
    }
}
