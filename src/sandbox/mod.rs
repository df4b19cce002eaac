//! In-memory host world.
//!
//! Implements the engine traits over plain vectors and records every call
//! the core makes back into the host (spawns, item drops, resyncs). Used by
//! the test suites, the bench and the `npc-sim` binary.

use std::collections::HashMap;

use crate::constants::{MAX_NPCS, MAX_PLAYERS};
use crate::world::{GameWorld, Npc, NpcSlot, Player, PlayerSlot, Rect, TileMap};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tile {
    pub solid: bool,
    pub wall: bool,
    pub house_wall: bool,
    pub lava: bool,
}

/// An item stack the core asked the host to drop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemDrop {
    pub area: Rect,
    pub item_id: i32,
    pub stack: i32,
    pub prefix: u8,
}

#[derive(Debug, Clone)]
pub struct SandboxWorld {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    npcs: Vec<Option<Npc>>,
    players: Vec<Option<Player>>,
    archetypes: HashMap<i32, Npc>,
    pub items: Vec<ItemDrop>,
    pub resyncs: Vec<NpcSlot>,
    pub spawned: Vec<NpcSlot>,
    pub resets: usize,
}

impl SandboxWorld {
    pub fn new(width: i32, height: i32) -> Self {
        Self::with_capacity(width, height, MAX_NPCS, MAX_PLAYERS)
    }

    pub fn with_capacity(width: i32, height: i32, npcs: usize, players: usize) -> Self {
        let cells = (width.max(0) as usize) * (height.max(0) as usize);
        Self {
            width,
            height,
            tiles: vec![Tile::default(); cells],
            npcs: vec![None; npcs],
            players: vec![None; players],
            archetypes: HashMap::new(),
            items: Vec::new(),
            resyncs: Vec::new(),
            spawned: Vec::new(),
            resets: 0,
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        self.in_bounds(x, y)
            .then(|| (y as usize) * (self.width as usize) + x as usize)
    }

    pub fn tile(&self, x: i32, y: i32) -> Tile {
        self.index(x, y).map(|i| self.tiles[i]).unwrap_or_default()
    }

    pub fn tile_mut(&mut self, x: i32, y: i32) -> Option<&mut Tile> {
        self.index(x, y).map(move |i| &mut self.tiles[i])
    }

    pub fn set_solid(&mut self, x: i32, y: i32, solid: bool) {
        if let Some(tile) = self.tile_mut(x, y) {
            tile.solid = solid;
        }
    }

    pub fn set_house_wall(&mut self, x: i32, y: i32, house_wall: bool) {
        if let Some(tile) = self.tile_mut(x, y) {
            tile.house_wall = house_wall;
            tile.wall = house_wall;
        }
    }

    pub fn set_lava(&mut self, x: i32, y: i32, lava: bool) {
        if let Some(tile) = self.tile_mut(x, y) {
            tile.lava = lava;
        }
    }

    /// Solid rows from `row` down to the bottom of the world
    pub fn fill_ground(&mut self, row: i32) {
        for y in row.max(0)..self.height {
            for x in 0..self.width {
                self.set_solid(x, y, true);
            }
        }
    }

    pub fn fill_solid(&mut self) {
        for tile in &mut self.tiles {
            tile.solid = true;
        }
    }

    /// Template used by `set_defaults` for this archetype
    pub fn define_archetype(&mut self, template: Npc) {
        self.archetypes.insert(template.net_id, template);
    }

    pub fn add_player(&mut self, player: Player) -> Option<PlayerSlot> {
        let slot = self.players.iter().position(Option::is_none)?;
        self.players[slot] = Some(player);
        Some(slot)
    }

    pub fn player_mut(&mut self, slot: PlayerSlot) -> Option<&mut Player> {
        self.players.get_mut(slot)?.as_mut()
    }

    /// Place a vanilla NPC with its top-left corner at `position`
    pub fn add_npc(&mut self, net_id: i32, position: (f32, f32)) -> Option<NpcSlot> {
        let slot = self.free_npc_slot()?;
        let mut npc = self.template(net_id);
        npc.position = position;
        self.npcs[slot] = Some(npc);
        Some(slot)
    }

    pub fn remove_npc(&mut self, slot: NpcSlot) {
        if let Some(npc) = self.npcs.get_mut(slot).and_then(Option::as_mut) {
            npc.active = false;
        }
    }

    pub fn active_npc_count(&self) -> usize {
        self.npcs.iter().flatten().filter(|npc| npc.active).count()
    }

    fn free_npc_slot(&self) -> Option<NpcSlot> {
        self.npcs
            .iter()
            .position(|npc| npc.as_ref().map_or(true, |npc| !npc.active))
    }

    fn template(&self, net_id: i32) -> Npc {
        self.archetypes
            .get(&net_id)
            .cloned()
            .unwrap_or_else(|| Npc::new(net_id, (0.0, 0.0)))
    }
}

impl TileMap for SandboxWorld {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn is_solid(&self, x: i32, y: i32) -> bool {
        self.tile(x, y).solid
    }

    fn is_house_wall(&self, x: i32, y: i32) -> bool {
        self.tile(x, y).house_wall
    }

    fn is_lava(&self, x: i32, y: i32) -> bool {
        self.tile(x, y).lava
    }

    fn is_occupied(&self, x: i32, y: i32) -> bool {
        let tile = self.tile(x, y);
        tile.solid || tile.wall || tile.lava
    }
}

impl GameWorld for SandboxWorld {
    fn npc_capacity(&self) -> usize {
        self.npcs.len()
    }

    fn player_capacity(&self) -> usize {
        self.players.len()
    }

    fn npc(&self, slot: NpcSlot) -> Option<&Npc> {
        self.npcs.get(slot)?.as_ref()
    }

    fn npc_mut(&mut self, slot: NpcSlot) -> Option<&mut Npc> {
        self.npcs.get_mut(slot)?.as_mut()
    }

    fn player(&self, slot: PlayerSlot) -> Option<&Player> {
        self.players.get(slot)?.as_ref()
    }

    fn set_defaults(&mut self, slot: NpcSlot, net_id: i32) {
        let mut fresh = self.template(net_id);
        if let Some(npc) = self.npcs.get_mut(slot).and_then(Option::as_mut) {
            fresh.position = npc.position;
            *npc = fresh;
            self.resets += 1;
        }
    }

    fn spawn_npc(&mut self, x: i32, y: i32, net_id: i32) -> Option<NpcSlot> {
        let slot = self.free_npc_slot()?;
        let mut npc = self.template(net_id);
        npc.position = ((x - npc.width / 2) as f32, (y - npc.height) as f32);
        self.npcs[slot] = Some(npc);
        self.spawned.push(slot);
        Some(slot)
    }

    fn spawn_item(&mut self, area: Rect, item_id: i32, stack: i32, prefix: u8) {
        self.items.push(ItemDrop {
            area,
            item_id,
            stack,
            prefix,
        });
    }

    fn broadcast_npc_resync(&mut self, slot: NpcSlot) {
        self.resyncs.push(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiles_out_of_bounds_are_empty() {
        let world = SandboxWorld::new(4, 4);
        assert!(!world.is_solid(-1, 0));
        assert!(!world.is_occupied(4, 4));
        assert!(!world.is_clear(10, 10));
    }

    #[test]
    fn test_fill_ground() {
        let mut world = SandboxWorld::new(5, 10);
        world.fill_ground(8);
        assert!(!world.is_solid(2, 7));
        assert!(world.is_solid(2, 8));
        assert!(world.is_solid(4, 9));
    }

    #[test]
    fn test_spawn_npc_reuses_inactive_slots() {
        let mut world = SandboxWorld::with_capacity(10, 10, 2, 1);
        let a = world.spawn_npc(100, 100, 3).unwrap();
        let b = world.spawn_npc(100, 100, 3).unwrap();
        assert_eq!((a, b), (0, 1));
        assert!(world.spawn_npc(100, 100, 3).is_none());

        world.remove_npc(a);
        assert_eq!(world.spawn_npc(50, 50, 4), Some(0));
        assert_eq!(world.spawned, vec![0, 1, 0]);
    }

    #[test]
    fn test_spawn_npc_stands_on_point() {
        let mut world = SandboxWorld::new(10, 10);
        let slot = world.spawn_npc(168, 320, 1).unwrap();
        let npc = world.npc(slot).unwrap();
        assert_eq!(npc.position, (159.0, 280.0));
    }

    #[test]
    fn test_set_defaults_uses_template() {
        let mut world = SandboxWorld::new(10, 10);
        let mut slime = Npc::new(1, (0.0, 0.0));
        slime.life = 14;
        slime.life_max = 14;
        world.define_archetype(slime);

        let slot = world.add_npc(2, (32.0, 48.0)).unwrap();
        world.set_defaults(slot, 1);
        let npc = world.npc(slot).unwrap();
        assert_eq!(npc.net_id, 1);
        assert_eq!(npc.life_max, 14);
        assert_eq!(npc.position, (32.0, 48.0));
        assert_eq!(world.resets, 1);
    }
}
