// ============================================================================
// FLOOD FILL: 4-connected region grow bounded by per-channel tolerance
// ============================================================================

use std::collections::VecDeque;

use image::Rgba;

use crate::canvas::PixelSurface;
use crate::error::CanvasError;
use crate::ops::bounds::BoundingBox;

/// Maximum per-channel absolute difference still considered "same color".
pub const FILL_TOLERANCE: u8 = 10;

/// Traversal shape of the frontier. Either order paints the same region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Frontier {
    /// LIFO stack (depth-first).
    #[default]
    Stack,
    /// FIFO queue (breadth-first).
    Queue,
}

/// One-shot fill request, consumed by [`flood_fill`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FillRequest {
    pub seed: (i32, i32),
    pub color: Rgba<u8>,
    pub frontier: Frontier,
}

impl FillRequest {
    pub fn new(x: i32, y: i32, color: Rgba<u8>) -> Self {
        Self {
            seed: (x, y),
            color,
            frontier: Frontier::default(),
        }
    }

    pub fn with_frontier(mut self, frontier: Frontier) -> Self {
        self.frontier = frontier;
        self
    }
}

/// What a fill changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FillOutcome {
    /// Number of pixels visited and overwritten with the fill color.
    pub painted: usize,
    /// Rectangle around the filled region.
    pub bounds: BoundingBox,
}

#[inline(always)]
fn pix(flat: &[u8], idx: usize) -> [u8; 4] {
    let o = idx * 4;
    [flat[o], flat[o + 1], flat[o + 2], flat[o + 3]]
}

/// Every channel (alpha included) within `tol` of the reference.
#[inline(always)]
fn matches(p: [u8; 4], reference: [u8; 4], tol: u8) -> bool {
    p.iter().zip(reference.iter()).all(|(a, b)| a.abs_diff(*b) <= tol)
}

/// Repaint the 4-connected region around `request.seed` whose colors match
/// the seed's *original* color within tolerance.
///
/// The reference color is sampled once, before any pixel changes, and the
/// visited mask is consulted before the color test, so a fill color that
/// itself lies within tolerance of the reference cannot loop. Each pixel is
/// visited at most once: O(width × height) worst case.
///
/// A seed that already holds the fill color is left alone, which makes a
/// repeated fill a no-op even when the fill color sits within tolerance of a
/// neighbouring region.
///
/// Fails with `OutOfBounds` (and touches nothing) when the seed is off the
/// surface.
pub fn flood_fill(surface: &mut PixelSurface, request: FillRequest) -> Result<FillOutcome, CanvasError> {
    let (sx, sy) = request.seed;
    let reference = surface.get_pixel(sx, sy)?.0;
    let fill = [request.color[0], request.color[1], request.color[2], 255];
    let mut bounds = BoundingBox::from_point(sx as u32, sy as u32);
    if reference == fill {
        tracing::debug!("flood fill at ({}, {}) skipped: already the fill color", sx, sy);
        return Ok(FillOutcome { painted: 0, bounds });
    }

    let (w, h) = surface.dimensions();
    let wu = w as usize;

    let flat = surface.raw_mut();
    // Doubles as the visited set: 1 once a pixel has been claimed.
    let mut visited = vec![0u8; wu * h as usize];

    // Flat indices instead of (x, y) tuples; y * w + x fits u32 for any
    // surface under the allocation cap.
    let mut frontier: VecDeque<u32> = VecDeque::with_capacity(4096);
    let seed_idx = sy as usize * wu + sx as usize;
    visited[seed_idx] = 1;
    frontier.push_back(seed_idx as u32);

    let mut painted = 0usize;

    loop {
        let next = match request.frontier {
            Frontier::Stack => frontier.pop_back(),
            Frontier::Queue => frontier.pop_front(),
        };
        let Some(idx) = next else {
            break;
        };
        let idx = idx as usize;
        let x = (idx % wu) as u32;
        let y = (idx / wu) as u32;

        let o = idx * 4;
        flat[o..o + 4].copy_from_slice(&fill);
        painted += 1;
        bounds.include(x, y);

        let mut visit = |ni: usize| {
            if visited[ni] == 0 && matches(pix(flat, ni), reference, FILL_TOLERANCE) {
                visited[ni] = 1;
                frontier.push_back(ni as u32);
            }
        };
        // Left
        if x > 0 {
            visit(idx - 1);
        }
        // Right
        if x + 1 < w {
            visit(idx + 1);
        }
        // Up
        if y > 0 {
            visit(idx - wu);
        }
        // Down
        if y + 1 < h {
            visit(idx + wu);
        }
    }

    tracing::debug!(
        "flood fill at ({}, {}) painted {} px in {}x{}",
        sx,
        sy,
        painted,
        bounds.width(),
        bounds.height()
    );
    Ok(FillOutcome { painted, bounds })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::TRANSPARENT;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const WALL: Rgba<u8> = Rgba([255, 255, 255, 255]);

    /// 10×10 surface split by a vertical wall at x = 4.
    fn walled_surface() -> PixelSurface {
        let mut surface = PixelSurface::new(10, 10);
        for y in 0..10 {
            surface.set_pixel(4, y, WALL).unwrap();
        }
        surface
    }

    #[test]
    fn fills_only_the_seed_side_of_a_wall() {
        let mut surface = walled_surface();
        let outcome = flood_fill(&mut surface, FillRequest::new(1, 1, RED)).unwrap();
        assert_eq!(outcome.painted, 40);
        assert_eq!(outcome.bounds, BoundingBox { min_x: 0, min_y: 0, max_x: 3, max_y: 9 });
        assert_eq!(surface.get_pixel(3, 9).unwrap(), RED);
        assert_eq!(surface.get_pixel(4, 5).unwrap(), WALL);
        assert_eq!(surface.get_pixel(5, 5).unwrap(), TRANSPARENT);
    }

    #[test]
    fn seed_out_of_bounds_fails_without_mutation() {
        let mut surface = walled_surface();
        let before = surface.as_raw().to_vec();
        let revision = surface.revision();
        let err = flood_fill(&mut surface, FillRequest::new(10, 0, RED)).unwrap_err();
        assert!(matches!(err, CanvasError::OutOfBounds { .. }));
        assert_eq!(surface.as_raw(), &before[..]);
        assert_eq!(surface.revision(), revision);
    }

    #[test]
    fn fill_color_near_reference_does_not_loop() {
        let mut surface = PixelSurface::new(6, 6);
        for y in 0..6 {
            for x in 0..6 {
                surface.set_pixel(x, y, Rgba([0, 0, 0, 255])).unwrap();
            }
        }
        // Fill color is within tolerance of the opaque black reference.
        let near = Rgba([3, 3, 3, 255]);
        let outcome = flood_fill(&mut surface, FillRequest::new(0, 0, near)).unwrap();
        assert_eq!(outcome.painted, 36);
        assert_eq!(surface.get_pixel(5, 5).unwrap(), near);
    }

    #[test]
    fn seed_already_fill_colored_is_a_no_op() {
        let mut surface = walled_surface();
        let revision = surface.revision();
        let outcome = flood_fill(&mut surface, FillRequest::new(4, 0, WALL)).unwrap();
        assert_eq!(outcome.painted, 0);
        assert_eq!(surface.revision(), revision);
    }

    #[test]
    fn matches_checks_every_channel() {
        assert!(matches([10, 20, 30, 255], [20, 10, 40, 245], 10));
        assert!(!matches([10, 20, 30, 255], [21, 20, 30, 255], 10));
        assert!(!matches([0, 0, 0, 0], [0, 0, 0, 11], 10));
    }
}
