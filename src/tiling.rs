//! Tile layout for the AV1 encoder
//!
//! Automatic tiling is left to libavif; these are the bounds for explicit
//! layouts.

/// Largest tile log2 libavif accepts per dimension
pub const MAX_TILE_LOG2: i32 = 6;

/// Clamp a caller-supplied tile log2 into `0..=MAX_TILE_LOG2`
pub fn clamp_tile_log2(value: i32) -> i32 {
    value.clamp(0, MAX_TILE_LOG2)
}
