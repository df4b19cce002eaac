//! Spawn-site search.
//!
//! Picks a tile near a player that an NPC can stand on without being visible
//! from the player's screen: outside the safe rectangle, with a solid floor
//! and a clear band of air above it. Sampling is rejection-based with a hard
//! trial cap; a failed trial is dropped, never refined.

use rand::Rng;
use tracing::trace;

use crate::constants::{
    SAFE_RANGE_FACTOR, SCREEN_HEIGHT, SCREEN_WIDTH, SPAWN_RANGE_FACTOR, SPAWN_SPACE_X,
    SPAWN_SPACE_Y, TILE_SIZE,
};
use crate::world::{Rect, TileMap, TilePoint};

/// Trials per search before giving up for this tick
pub const MAX_SPAWN_TRIALS: usize = 50;

/// Trials when looking for any clear tile around a point
pub const MAX_CLEAR_TILE_TRIALS: usize = 50;

/// Tile-space rectangles around a search anchor, clamped to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnRegions {
    /// Visible to the player; no part of a spawn may land here
    pub safe: Rect,
    /// Where trial tiles are drawn from
    pub candidates: Rect,
}

impl SpawnRegions {
    pub fn around(anchor: TilePoint, world_width: i32, world_height: i32) -> Self {
        Self {
            safe: clamped_region(anchor, SAFE_RANGE_FACTOR, world_width, world_height),
            candidates: clamped_region(anchor, SPAWN_RANGE_FACTOR, world_width, world_height),
        }
    }
}

fn visible_tiles(factor: f64) -> (i32, i32) {
    let tile = TILE_SIZE as f64;
    (
        (SCREEN_WIDTH as f64 / tile * factor) as i32,
        (SCREEN_HEIGHT as f64 / tile * factor) as i32,
    )
}

fn clamped_region(anchor: TilePoint, factor: f64, width: i32, height: i32) -> Rect {
    let (range_x, range_y) = visible_tiles(factor);
    let min_x = (anchor.x - range_x).max(0);
    let max_x = (anchor.x + range_x).min(width);
    let min_y = (anchor.y - range_y).max(0);
    let max_y = (anchor.y + range_y).min(height);
    Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
}

/// Find a floor tile around `anchor`, or `None` after `MAX_SPAWN_TRIALS`.
///
/// The returned point is the floor tile itself; the NPC stands on top of it.
pub fn find_spawn_site<W, R>(
    world: &W,
    anchor: TilePoint,
    rng: &mut R,
) -> Option<TilePoint>
where
    W: TileMap + ?Sized,
    R: Rng + ?Sized,
{
    let regions = SpawnRegions::around(anchor, world.width(), world.height());
    let candidates = regions.candidates;
    if candidates.width <= 0 || candidates.height <= 0 {
        return None;
    }

    for trial in 0..MAX_SPAWN_TRIALS {
        let x = rng.gen_range(candidates.x..candidates.right());
        let y = rng.gen_range(candidates.y..candidates.bottom());

        if let Some(site) = try_site(world, &regions, x, y) {
            trace!(trial, x = site.x, y = site.y, "Found spawn site");
            return Some(site);
        }
    }
    None
}

fn try_site<W: TileMap + ?Sized>(world: &W, regions: &SpawnRegions, x: i32, y: i32) -> Option<TilePoint> {
    if world.is_solid(x, y) || world.is_house_wall(x, y) {
        return None;
    }
    let floor_y = (y..world.height()).find(|&row| world.is_solid(x, row))?;
    let floor = TilePoint::new(x, floor_y);
    has_clearance(world, &regions.safe, floor).then_some(floor)
}

/// The band `SPAWN_SPACE_X` wide and `SPAWN_SPACE_Y` tall directly above the
/// floor must be inside the world, outside the safe rectangle and free of
/// solid tiles and lava.
pub fn has_clearance<W: TileMap + ?Sized>(world: &W, safe: &Rect, floor: TilePoint) -> bool {
    if floor.y < SPAWN_SPACE_Y || safe.contains(floor.x, floor.y) {
        return false;
    }
    clearance_band(floor).all(|(x, y)| {
        world.in_bounds(x, y) && !safe.contains(x, y) && !world.is_solid(x, y) && !world.is_lava(x, y)
    })
}

/// Cells of the clearance band above `floor`
pub fn clearance_band(floor: TilePoint) -> impl Iterator<Item = (i32, i32)> {
    let half = SPAWN_SPACE_X / 2;
    let columns = (floor.x - half)..=(floor.x + half);
    columns.flat_map(move |x| ((floor.y - SPAWN_SPACE_Y)..floor.y).map(move |y| (x, y)))
}

/// Random clear tile within `range_x`/`range_y` tiles of `origin`.
/// Falls back to `origin` when no clear tile turns up.
pub fn random_clear_tile_in_range<W, R>(
    world: &W,
    origin: TilePoint,
    range_x: i32,
    range_y: i32,
    rng: &mut R,
) -> TilePoint
where
    W: TileMap + ?Sized,
    R: Rng + ?Sized,
{
    for _ in 0..MAX_CLEAR_TILE_TRIALS {
        let x = origin.x + rng.gen_range(-range_x..=range_x);
        let y = origin.y + rng.gen_range(-range_y..=range_y);
        if world.is_clear(x, y) {
            return TilePoint::new(x, y);
        }
    }
    origin
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxWorld;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn rng() -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(7)
    }

    #[test]
    fn test_regions_clamped_to_world() {
        let regions = SpawnRegions::around(TilePoint::new(5, 5), 400, 300);
        assert_eq!(regions.safe.x, 0);
        assert_eq!(regions.safe.y, 0);
        assert_eq!(regions.safe.right(), 5 + 62);
        assert_eq!(regions.safe.bottom(), 5 + 35);
        assert_eq!(regions.candidates.right(), 5 + 84);
        assert_eq!(regions.candidates.bottom(), 5 + 47);
    }

    #[test]
    fn test_clearance_band_shape() {
        let cells: Vec<_> = clearance_band(TilePoint::new(10, 20)).collect();
        assert_eq!(cells.len(), (SPAWN_SPACE_X * SPAWN_SPACE_Y) as usize);
        assert!(cells.contains(&(9, 17)));
        assert!(cells.contains(&(11, 19)));
        assert!(!cells.contains(&(10, 20)));
    }

    #[test]
    fn test_all_solid_world_has_no_site() {
        let mut world = SandboxWorld::new(300, 200);
        world.fill_solid();
        assert!(find_spawn_site(&world, TilePoint::new(150, 100), &mut rng()).is_none());
    }

    #[test]
    fn test_open_air_without_floor_fails() {
        let world = SandboxWorld::new(300, 200);
        assert!(find_spawn_site(&world, TilePoint::new(150, 100), &mut rng()).is_none());
    }

    #[test]
    fn test_site_found_outside_safe_rect() {
        let mut world = SandboxWorld::new(400, 200);
        world.fill_ground(150);
        let anchor = TilePoint::new(200, 120);
        let regions = SpawnRegions::around(anchor, 400, 200);

        for seed in 0..20 {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            let site = find_spawn_site(&world, anchor, &mut rng).unwrap();
            assert_eq!(site.y, 150);
            assert!(!regions.safe.contains(site.x, site.y));
            assert!(has_clearance(&world, &regions.safe, site));
        }
    }

    #[test]
    fn test_lava_blocks_clearance() {
        let mut world = SandboxWorld::new(40, 40);
        world.fill_ground(30);
        let safe = Rect::new(0, 0, 0, 0);
        assert!(has_clearance(&world, &safe, TilePoint::new(10, 30)));
        world.set_lava(11, 28, true);
        assert!(!has_clearance(&world, &safe, TilePoint::new(10, 30)));
    }

    #[test]
    fn test_band_overlapping_safe_rect_rejected() {
        let mut world = SandboxWorld::new(40, 40);
        world.fill_ground(30);
        let safe = Rect::new(0, 0, 10, 40);
        assert!(!has_clearance(&world, &safe, TilePoint::new(10, 30)));
        assert!(has_clearance(&world, &safe, TilePoint::new(11, 30)));
    }

    #[test]
    fn test_floor_near_top_rejected() {
        let mut world = SandboxWorld::new(40, 40);
        world.fill_ground(2);
        let safe = Rect::new(0, 0, 0, 0);
        assert!(!has_clearance(&world, &safe, TilePoint::new(10, 2)));
    }

    #[test]
    fn test_house_wall_trial_rejected() {
        let mut world = SandboxWorld::new(40, 40);
        world.fill_ground(30);
        world.set_house_wall(10, 20, true);
        let regions = SpawnRegions {
            safe: Rect::new(0, 0, 0, 0),
            candidates: Rect::new(0, 0, 40, 40),
        };
        assert!(try_site(&world, &regions, 10, 20).is_none());
        assert_eq!(try_site(&world, &regions, 12, 20), Some(TilePoint::new(12, 30)));
    }

    #[test]
    fn test_random_clear_tile_falls_back_to_origin() {
        let mut world = SandboxWorld::new(20, 20);
        world.fill_solid();
        let origin = TilePoint::new(5, 5);
        assert_eq!(random_clear_tile_in_range(&world, origin, 3, 3, &mut rng()), origin);

        let open = SandboxWorld::new(20, 20);
        let tile = random_clear_tile_in_range(&open, origin, 3, 3, &mut rng());
        assert!((tile.x - 5).abs() <= 3 && (tile.y - 5).abs() <= 3);
        assert!(open.is_clear(tile.x, tile.y));
    }
}
