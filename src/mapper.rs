//! Coordinate Mapper - grid space to canvas pixels.

use crate::catalog::{Catalog, GridPoint, SegmentDefinition, SegmentId, GRID_CELLS};

/// Integer pixel position. May fall outside the canvas for strong corrections.
pub type PixelPoint = (i64, i64);

/// Canvas size plus the derived grid unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    size: u32,
}

impl CoordinateMapper {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn grid_unit(&self) -> f64 {
        f64::from(self.size) / f64::from(GRID_CELLS)
    }

    /// Uncorrected mapping, `grid * size / 4`.
    pub fn base(&self, x: f64, y: f64) -> PixelPoint {
        let unit = self.grid_unit();
        ((x * unit).floor() as i64, (y * unit).floor() as i64)
    }

    /// Maps a grid point into pixels for `segment`.
    ///
    /// Every segment but the big diamond is scaled about the canvas center by
    /// its scale factor and shifted by `size * offset`. Truncation happens
    /// once, after the correction.
    pub fn grid_to_pixel(&self, x: f64, y: f64, segment: &SegmentDefinition) -> PixelPoint {
        if segment.id.is_big_diamond() {
            return self.base(x, y);
        }
        let unit = self.grid_unit();
        let size = f64::from(self.size);
        let center = size / 2.0;
        let corrected = |grid: f64, offset: f64| {
            let base = grid * unit;
            let scaled = center + (base - center) * segment.scale;
            (scaled + size * offset).floor() as i64
        };
        (corrected(x, segment.offset.0), corrected(y, segment.offset.1))
    }

    pub fn grid_point_to_pixel(&self, point: GridPoint, segment: &SegmentDefinition) -> PixelPoint {
        self.grid_to_pixel(f64::from(point.0), f64::from(point.1), segment)
    }

    /// Expected pixel size of a placed segment: its grid bounding box times
    /// the grid unit, times the scale factor unless it is the big diamond.
    pub fn placement_size(&self, segment: &SegmentDefinition) -> (u32, u32) {
        let bounds = segment.bounds();
        let scale = if segment.id.is_big_diamond() { 1.0 } else { segment.scale };
        let extent = |cells: u32| (f64::from(cells) * self.grid_unit() * scale).floor() as u32;
        (extent(bounds.width()), extent(bounds.height()))
    }

    /// Pixel polygon used to cut `id` out of a source image.
    pub fn extraction_polygon(&self, catalog: &Catalog, id: SegmentId) -> Vec<PixelPoint> {
        catalog
            .segment(id)
            .points
            .iter()
            .map(|&(x, y)| self.base(f64::from(x), f64::from(y)))
            .collect()
    }
}
