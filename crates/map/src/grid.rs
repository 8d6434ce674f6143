use bytemuck::{Pod, Zeroable};
use std::collections::BTreeMap;
use std::sync::Arc;
use tilegrid_common::GridCoord;

/// Tile type used when filling a fresh grid.
pub const DEFAULT_TILE_TYPE: &str = "grass";
/// Variant used when filling a fresh grid.
pub const DEFAULT_VARIANT: u32 = 1;

/// Largest grid edge whose cell count still fits a `u32` instance count.
///
/// This only bounds the instance count. It is not a memory budget: a full
/// 65535-edge grid needs about 51 GB of instance data, and backends reject
/// buffers beyond their own allocation limit.
pub const MAX_GRID_SIZE: u32 = u16::MAX as u32;

/// Metadata for one grid cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileDescriptor {
    /// Tileset tag, e.g. `"grass"`. Shared between all tiles of the same type.
    pub tile_type: Arc<str>,
    pub variant: u32,
    pub position: GridCoord,
}

/// Per-instance vertex data uploaded to the GPU: the cell offset in grid units.
///
/// Only the position is carried. Tile type and variant stay on the CPU side.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct TileInstance {
    pub offset: [f32; 3],
}

impl TileInstance {
    pub const STRIDE: u64 = std::mem::size_of::<TileInstance>() as u64;

    fn at(coord: GridCoord) -> Self {
        Self {
            offset: [coord.x as f32, coord.y as f32, 0.0],
        }
    }
}

/// Errors from building a tile grid.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("grid size must be at least 1")]
    EmptyGrid,
    #[error("grid size {size} exceeds the maximum of {max}", max = MAX_GRID_SIZE)]
    TooLarge { size: u32 },
}

/// A square grid of tiles centered on the origin.
///
/// Holds two views of the same cells: a descriptor map keyed by coordinate
/// (BTreeMap for deterministic iteration) and a flat row-major instance buffer
/// ready for upload. Both are built once and never mutated afterward.
#[derive(Debug, Clone)]
pub struct TileGrid {
    size: u32,
    tiles: BTreeMap<GridCoord, TileDescriptor>,
    instances: Vec<TileInstance>,
}

impl TileGrid {
    /// Fill a `size x size` grid with one tile type.
    ///
    /// Cell `(row i, column j)` sits at `(j - size/2, i - size/2)` and its
    /// instance lives at linear index `j + i * size`.
    pub fn with_default_tiles(size: u32, tile_type: &str, variant: u32) -> Result<Self, MapError> {
        if size == 0 {
            return Err(MapError::EmptyGrid);
        }
        if size > MAX_GRID_SIZE {
            return Err(MapError::TooLarge { size });
        }

        let half = (size / 2) as i32;
        let edge = size as i32;
        let tile_type: Arc<str> = Arc::from(tile_type);

        let mut tiles = BTreeMap::new();
        let mut instances = Vec::with_capacity(size as usize * size as usize);

        for i in 0..edge {
            for j in 0..edge {
                let position = GridCoord::new(j - half, i - half);
                tiles.insert(
                    position,
                    TileDescriptor {
                        tile_type: Arc::clone(&tile_type),
                        variant,
                        position,
                    },
                );
                instances.push(TileInstance::at(position));
            }
        }

        tracing::debug!(
            size,
            first = ?instances.first().map(|t| t.offset),
            last = ?instances.last().map(|t| t.offset),
            "filled tile grid"
        );

        Ok(Self {
            size,
            tiles,
            instances,
        })
    }

    /// Grid edge length in cells.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of cells, `size * size`.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Number of instances to draw. Cannot overflow: size is capped at [`MAX_GRID_SIZE`].
    pub fn instance_count(&self) -> u32 {
        self.size * self.size
    }

    /// Inclusive lower and exclusive upper coordinate on both axes.
    pub fn bounds(&self) -> (i32, i32) {
        let min = -((self.size / 2) as i32);
        (min, min + self.size as i32)
    }

    pub fn tile_at(&self, coord: GridCoord) -> Option<&TileDescriptor> {
        self.tiles.get(&coord)
    }

    /// Descriptors in coordinate order.
    pub fn tiles(&self) -> impl Iterator<Item = &TileDescriptor> {
        self.tiles.values()
    }

    pub fn instances(&self) -> &[TileInstance] {
        &self.instances
    }

    /// The instance buffer as raw bytes for upload.
    pub fn instance_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_every_cell() {
        let grid = TileGrid::with_default_tiles(8, DEFAULT_TILE_TYPE, DEFAULT_VARIANT).unwrap();
        assert_eq!(grid.len(), 64);
        assert_eq!(grid.instances().len(), 64);
        assert_eq!(grid.instance_count(), 64);
        assert!(!grid.is_empty());
    }

    #[test]
    fn coordinates_span_half_open_range() {
        let n = 10;
        let grid = TileGrid::with_default_tiles(n, DEFAULT_TILE_TYPE, DEFAULT_VARIANT).unwrap();
        assert_eq!(grid.bounds(), (-5, 5));

        for tile in grid.tiles() {
            assert!((-5..5).contains(&tile.position.x));
            assert!((-5..5).contains(&tile.position.y));
        }
        assert!(grid.tile_at(GridCoord::new(-5, -5)).is_some());
        assert!(grid.tile_at(GridCoord::new(4, 4)).is_some());
        assert!(grid.tile_at(GridCoord::new(5, 0)).is_none());
        assert!(grid.tile_at(GridCoord::new(0, -6)).is_none());
    }

    #[test]
    fn instance_layout_is_row_major() {
        let n = 6u32;
        let grid = TileGrid::with_default_tiles(n, DEFAULT_TILE_TYPE, DEFAULT_VARIANT).unwrap();
        let half = (n / 2) as i32;
        for i in 0..n as i32 {
            for j in 0..n as i32 {
                let idx = (j + i * n as i32) as usize;
                assert_eq!(
                    grid.instances()[idx].offset,
                    [(j - half) as f32, (i - half) as f32, 0.0]
                );
            }
        }
    }

    #[test]
    fn descriptors_match_instances() {
        let grid = TileGrid::with_default_tiles(4, "grass", 1).unwrap();
        for inst in grid.instances() {
            let coord = GridCoord::new(inst.offset[0] as i32, inst.offset[1] as i32);
            let tile = grid.tile_at(coord).unwrap();
            assert_eq!(tile.position, coord);
            assert_eq!(&*tile.tile_type, "grass");
            assert_eq!(tile.variant, 1);
        }
    }

    #[test]
    fn odd_size_uses_floor_half() {
        let grid = TileGrid::with_default_tiles(5, DEFAULT_TILE_TYPE, DEFAULT_VARIANT).unwrap();
        assert_eq!(grid.bounds(), (-2, 3));
        assert_eq!(grid.instances()[0].offset, [-2.0, -2.0, 0.0]);
        assert_eq!(grid.instances()[24].offset, [2.0, 2.0, 0.0]);
    }

    #[test]
    fn instance_bytes_have_twelve_byte_stride() {
        let grid = TileGrid::with_default_tiles(3, DEFAULT_TILE_TYPE, DEFAULT_VARIANT).unwrap();
        assert_eq!(TileInstance::STRIDE, 12);
        assert_eq!(grid.instance_bytes().len(), 9 * 12);
    }

    #[test]
    fn rejects_empty_and_oversized_grids() {
        assert!(matches!(
            TileGrid::with_default_tiles(0, DEFAULT_TILE_TYPE, DEFAULT_VARIANT),
            Err(MapError::EmptyGrid)
        ));
        assert!(matches!(
            TileGrid::with_default_tiles(MAX_GRID_SIZE + 1, DEFAULT_TILE_TYPE, DEFAULT_VARIANT),
            Err(MapError::TooLarge { .. })
        ));
    }
}
