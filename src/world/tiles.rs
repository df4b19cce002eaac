//! Tile-grid helpers shared by collision dispatch and scripts.

use super::{Rect, TileMap, TilePoint};
use crate::constants::TILE_SIZE;

/// Tile column/row containing a world-pixel coordinate
pub fn to_tile(pixel: i32) -> i32 {
    pixel.div_euclid(TILE_SIZE)
}

/// Occupied tiles (block, wall or liquid) under a world-pixel rectangle,
/// row-major, clipped to the world.
pub fn overlapped_tiles<W: TileMap + ?Sized>(world: &W, bounds: Rect) -> Vec<TilePoint> {
    let min_col = to_tile(bounds.x).max(0);
    let min_row = to_tile(bounds.y).max(0);
    let max_col = to_tile(bounds.right()).min(world.width() - 1);
    let max_row = to_tile(bounds.bottom()).min(world.height() - 1);

    let mut hits = Vec::new();
    for row in min_row..=max_row {
        for col in min_col..=max_col {
            if world.is_occupied(col, row) {
                hits.push(TilePoint::new(col, row));
            }
        }
    }
    hits
}
