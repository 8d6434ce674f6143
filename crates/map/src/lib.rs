//! Tile data: descriptors keyed by grid coordinate and the flat instance
//! buffer mirroring their positions.
//!
//! # Invariants
//! - A grid of edge `N` holds exactly `N * N` descriptors and `N * N` instances.
//! - Instance `j + i * N` is the cell at `(j - N/2, i - N/2)`.
//! - Grids are immutable once built.

mod config;
mod grid;

pub use config::{ConfigError, TilemapConfig};
pub use grid::{
    DEFAULT_TILE_TYPE, DEFAULT_VARIANT, MAX_GRID_SIZE, MapError, TileDescriptor, TileGrid,
    TileInstance,
};
