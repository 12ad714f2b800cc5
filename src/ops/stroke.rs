// ============================================================================
// STROKE RENDERER: connected round-capped segments between pointer samples
// ============================================================================

use image::Rgba;

use crate::canvas::PixelSurface;
use crate::ops::bounds::BoundingBox;

pub const MIN_STROKE_WIDTH: u32 = 1;
pub const MAX_STROKE_WIDTH: u32 = 50;

/// Clamp a requested brush width into `MIN_STROKE_WIDTH..=MAX_STROKE_WIDTH`.
/// Out-of-range values are clamped, never rejected.
pub fn clamp_stroke_width(width: i64) -> u32 {
    width.clamp(MIN_STROKE_WIDTH as i64, MAX_STROKE_WIDTH as i64) as u32
}

/// Per-stroke state: where the previous segment ended.
///
/// Holds no reference to the surface; every call that paints receives it.
#[derive(Clone, Debug, Default)]
pub struct StrokeRenderer {
    last_point: Option<(f32, f32)>,
}

impl StrokeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the stroke origin. Paints nothing: a zero-length path has no ink.
    pub fn begin(&mut self, start: (f32, f32)) {
        self.last_point = Some(start);
    }

    /// Draw from the previous point to `next` and move the origin there.
    /// Returns the touched rectangle, or `None` when not drawing or when the
    /// segment lies entirely off the surface.
    pub fn extend(
        &mut self,
        surface: &mut PixelSurface,
        next: (f32, f32),
        color: Rgba<u8>,
        width: u32,
    ) -> Option<BoundingBox> {
        let start = self.last_point?;
        self.last_point = Some(next);
        paint_segment(surface, start, next, color, width)
    }

    /// Forget the origin; later `extend` calls do nothing until `begin`.
    pub fn end(&mut self) {
        self.last_point = None;
    }

    pub fn is_active(&self) -> bool {
        self.last_point.is_some()
    }
}

/// Rasterize a capsule (segment with round caps) of the given width.
///
/// Pixel `(x, y)` is painted when its sample point lies within `width / 2` of
/// the segment. A zero-length segment degenerates to a single disc.
pub fn paint_segment(
    surface: &mut PixelSurface,
    start: (f32, f32),
    end: (f32, f32),
    color: Rgba<u8>,
    width: u32,
) -> Option<BoundingBox> {
    let width = width.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH);
    let radius = width as f32 / 2.0;
    let radius_sq = radius * radius;
    let pad = radius.ceil() + 1.0;

    let (sw, sh) = surface.dimensions();
    let min_x = (start.0.min(end.0) - pad).floor().max(0.0);
    let min_y = (start.1.min(end.1) - pad).floor().max(0.0);
    let max_x = (start.0.max(end.0) + pad).ceil().min(sw as f32 - 1.0);
    let max_y = (start.1.max(end.1) + pad).ceil().min(sh as f32 - 1.0);
    if min_x > max_x || min_y > max_y {
        return None;
    }
    let (min_x, min_y, max_x, max_y) = (min_x as u32, min_y as u32, max_x as u32, max_y as u32);

    // Strokes always write opaque color.
    let px = [color[0], color[1], color[2], 255];
    // Even widths straddle a pixel boundary: sample half a pixel over so a
    // width-w line covers exactly w rows.
    let offset = if width % 2 == 0 { 0.5 } else { 0.0 };
    let stride = sw as usize * 4;
    let raw = surface.raw_mut();
    let mut touched: Option<BoundingBox> = None;

    for y in min_y..=max_y {
        let row = y as usize * stride;
        for x in min_x..=max_x {
            if point_segment_distance_sq((x as f32 + offset, y as f32 + offset), start, end) <= radius_sq {
                let o = row + x as usize * 4;
                raw[o..o + 4].copy_from_slice(&px);
                match touched.as_mut() {
                    Some(b) => b.include(x, y),
                    None => touched = Some(BoundingBox::from_point(x, y)),
                }
            }
        }
    }
    touched
}

fn point_segment_distance_sq(point: (f32, f32), start: (f32, f32), end: (f32, f32)) -> f32 {
    let (px, py) = point;
    let (x0, y0) = start;
    let vx = end.0 - x0;
    let vy = end.1 - y0;
    let len_sq = vx * vx + vy * vy;
    if len_sq <= f32::EPSILON {
        let dx = px - x0;
        let dy = py - y0;
        return dx * dx + dy * dy;
    }
    let t = (((px - x0) * vx + (py - y0) * vy) / len_sq).clamp(0.0, 1.0);
    let dx = px - (x0 + vx * t);
    let dy = py - (y0 + vy * t);
    dx * dx + dy * dy
}
