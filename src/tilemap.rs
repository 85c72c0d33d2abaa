//! Grid storage and grid-to-raster geometry
//!
//! Tile maps are stored with row 0 at the bottom of the world, while rasters
//! put row 0 at the top. `ScreenLayout` owns that vertical flip so every pass
//! maps coordinates to pixels the same way.

/// A dense 2D grid. Lookups outside the grid yield `None` instead of panicking.
#[derive(Clone, Debug, PartialEq)]
pub struct Tilemap<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Tilemap<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }
}

impl<T> Tilemap<T> {
    /// Wrap row-major data (row 0 first). Returns `None` if the length
    /// does not match `width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Option<Self> {
        if data.len() != width * height {
            return None;
        }
        Some(Self { width, height, data })
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y * self.width + x)
        } else {
            None
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        self.index(x, y).map(|idx| &self.data[idx])
    }

    /// Lookup by tile coordinate; negative components are out of range.
    pub fn at(&self, coord: TileCoord) -> Option<&T> {
        if coord.x < 0 || coord.y < 0 {
            return None;
        }
        self.get(coord.x as usize, coord.y as usize)
    }
}

/// Integer tile-grid coordinate. Signed so neighbor offsets can step outside the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Visit every coordinate of a `width` x `height` grid, column-major
/// (`x` outer, `y` inner). All passes and the manifest share this order.
pub fn column_major(width: usize, height: usize) -> impl Iterator<Item = TileCoord> {
    (0..width).flat_map(move |x| (0..height).map(move |y| TileCoord::new(x as i32, y as i32)))
}

/// Pixel rectangle inside a raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Maps tile coordinates to raster pixels for one map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenLayout {
    pub map_width: u32,
    pub map_height: u32,
    /// Side of one tile in the output raster, in pixels
    pub cell_pixels: u32,
}

impl ScreenLayout {
    pub fn new(map_width: u32, map_height: u32, cell_pixels: u32) -> Self {
        Self {
            map_width,
            map_height,
            cell_pixels,
        }
    }

    pub fn raster_size(&self) -> (u32, u32) {
        (
            self.map_width * self.cell_pixels,
            self.map_height * self.cell_pixels,
        )
    }

    /// Screen row of a grid row: row 0 is the bottom of the raster.
    pub fn flipped_row(&self, y: u32) -> Option<u32> {
        (y < self.map_height).then(|| self.map_height - 1 - y)
    }

    /// Raster rectangle covered by a tile, or `None` outside the map.
    pub fn screen_rect(&self, coord: TileCoord) -> Option<PixelRect> {
        if coord.x < 0 || coord.y < 0 || coord.x as u32 >= self.map_width {
            return None;
        }
        let row = self.flipped_row(coord.y as u32)?;
        Some(PixelRect {
            x: coord.x as u32 * self.cell_pixels,
            y: row * self.cell_pixels,
            width: self.cell_pixels,
            height: self.cell_pixels,
        })
    }

    /// Center pixel of a tile's screen rectangle.
    pub fn pixel_center(&self, coord: TileCoord) -> Option<(u32, u32)> {
        let rect = self.screen_rect(coord)?;
        Some((rect.x + rect.width / 2, rect.y + rect.height / 2))
    }
}
