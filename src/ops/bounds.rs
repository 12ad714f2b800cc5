// ============================================================================
// PAINTED BOUNDS: minimal rectangle enclosing every pixel with alpha > 0
// ============================================================================

use rayon::prelude::*;

use crate::canvas::PixelSurface;

/// Inclusive axis-aligned pixel rectangle. Always non-degenerate:
/// `min_x <= max_x` and `min_y <= max_y`. "Nothing painted" is expressed
/// as `None` by [`painted_bounds`], never as an inverted box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    /// Box covering a single pixel.
    pub fn from_point(x: u32, y: u32) -> Self {
        Self { min_x: x, min_y: y, max_x: x, max_y: y }
    }

    /// Grow to include `(x, y)`.
    pub fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn union(self, other: BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Overlay anchor: `((min_x + max_x) / 2, (min_y + max_y) / 2)`.
    pub fn centroid(&self) -> (f32, f32) {
        (
            (self.min_x as f32 + self.max_x as f32) / 2.0,
            (self.min_y as f32 + self.max_y as f32) / 2.0,
        )
    }
}

/// Scan the whole surface once and return the box around all painted pixels,
/// or `None` when the surface is blank.
///
/// Rows are scanned in parallel; each row contributes its first and last
/// painted column and the per-row boxes are merged.
pub fn painted_bounds(surface: &PixelSurface) -> Option<BoundingBox> {
    let stride = surface.width() as usize * 4;
    surface
        .as_raw()
        .par_chunks_exact(stride)
        .enumerate()
        .filter_map(|(y, row)| {
            let first = row.chunks_exact(4).position(|p| p[3] > 0)?;
            let last = row.chunks_exact(4).rposition(|p| p[3] > 0)?;
            Some(BoundingBox {
                min_x: first as u32,
                min_y: y as u32,
                max_x: last as u32,
                max_y: y as u32,
            })
        })
        .reduce_with(BoundingBox::union)
}
