use image::{Rgba, RgbaImage};

use crate::error::CanvasError;
use crate::ops::bounds::BoundingBox;

/// Untouched background: all channels zero.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Upper bound on allocated pixels (~256 megapixels).
const MAX_PIXELS: u64 = 256_000_000;

// ============================================================================
// PIXEL SURFACE: flat RGBA buffer, fixed size for its whole lifetime
// ============================================================================

/// The single raster drawing surface.
///
/// Alpha doubles as the "painted" flag: `0` means untouched background,
/// anything above means a stroke or fill wrote there. Paint operations
/// always write opaque color, nothing is ever blended.
///
/// Width and height never change in place; [`PixelSurface::resized`]
/// allocates a new surface and migrates the overlapping content.
#[derive(Clone, Debug)]
pub struct PixelSurface {
    pixels: RgbaImage,
    /// Bumped by every mutation so views can skip texture re-uploads.
    revision: u64,
}

impl PixelSurface {
    // ---- construction -------------------------------------------------------

    /// Create a fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = {
            let total = (width as u64) * (height as u64);
            if total > MAX_PIXELS || width == 0 || height == 0 {
                tracing::warn!(
                    "PixelSurface::new: dimensions {}×{} are unusable, clamped to 1×1",
                    width,
                    height
                );
                (1, 1)
            } else {
                (width, height)
            }
        };
        Self {
            pixels: RgbaImage::from_pixel(width, height, TRANSPARENT),
            revision: 0,
        }
    }

    /// Adopt an existing image verbatim (transparent pixels stay background).
    pub fn from_rgba_image(image: RgbaImage) -> Self {
        if image.width() == 0 || image.height() == 0 {
            return Self::new(image.width(), image.height());
        }
        Self {
            pixels: image,
            revision: 0,
        }
    }

    // ---- geometry -----------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height()
    }

    fn check_bounds(&self, x: i32, y: i32) -> Result<(u32, u32), CanvasError> {
        if self.contains(x, y) {
            Ok((x as u32, y as u32))
        } else {
            Err(CanvasError::OutOfBounds {
                x: x as i64,
                y: y as i64,
                width: self.width(),
                height: self.height(),
            })
        }
    }

    // ---- pixel access -------------------------------------------------------

    pub fn get_pixel(&self, x: i32, y: i32) -> Result<Rgba<u8>, CanvasError> {
        let (x, y) = self.check_bounds(x, y)?;
        Ok(*self.pixels.get_pixel(x, y))
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgba<u8>) -> Result<(), CanvasError> {
        let (x, y) = self.check_bounds(x, y)?;
        self.pixels.put_pixel(x, y, color);
        self.touch();
        Ok(())
    }

    /// Reset every pixel to transparent black.
    pub fn clear(&mut self) {
        let raw: &mut [u8] = &mut self.pixels;
        raw.fill(0);
        self.touch();
    }

    /// True when no pixel has been painted.
    pub fn is_blank(&self) -> bool {
        self.pixels.as_raw().chunks_exact(4).all(|p| p[3] == 0)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Flat RGBA bytes, row-major, `width * 4` bytes per row.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    /// Mutable flat bytes for the paint algorithms. Counts as a mutation.
    pub(crate) fn raw_mut(&mut self) -> &mut [u8] {
        self.touch();
        &mut self.pixels
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    // ---- export -------------------------------------------------------------

    /// Encode the full surface as a self-contained PNG byte stream.
    pub fn to_encoded_image(&self) -> Result<Vec<u8>, CanvasError> {
        crate::io::encode_png(&self.pixels)
    }

    /// Copy the pixels inside `bbox` (inclusive) into a new image.
    /// The box is clipped to the surface first.
    pub fn extract_region(&self, bbox: &BoundingBox) -> RgbaImage {
        let max_x = bbox.max_x.min(self.width().saturating_sub(1));
        let max_y = bbox.max_y.min(self.height().saturating_sub(1));
        if bbox.min_x > max_x || bbox.min_y > max_y {
            return RgbaImage::new(0, 0);
        }
        let w = max_x - bbox.min_x + 1;
        let h = max_y - bbox.min_y + 1;
        image::imageops::crop_imm(&self.pixels, bbox.min_x, bbox.min_y, w, h).to_image()
    }

    /// Allocate a surface of the new size, carrying over the overlapping
    /// top-left region of this one.
    pub fn resized(&self, width: u32, height: u32) -> PixelSurface {
        let mut next = PixelSurface::new(width, height);
        let copy_w = self.width().min(next.width()) as usize;
        let copy_h = self.height().min(next.height()) as usize;
        let src_stride = self.width() as usize * 4;
        let dst_stride = next.width() as usize * 4;
        let src = self.pixels.as_raw();
        let dst: &mut [u8] = &mut next.pixels;
        for y in 0..copy_h {
            let s = y * src_stride;
            let d = y * dst_stride;
            dst[d..d + copy_w * 4].copy_from_slice(&src[s..s + copy_w * 4]);
        }
        next.revision = self.revision.wrapping_add(1);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_surface_is_transparent_black() {
        let surface = PixelSurface::new(8, 4);
        assert_eq!(surface.dimensions(), (8, 4));
        assert!(surface.as_raw().iter().all(|&b| b == 0));
        assert!(surface.is_blank());
    }

    #[test]
    fn zero_sized_surface_is_clamped() {
        let surface = PixelSurface::new(0, 10);
        assert_eq!(surface.dimensions(), (1, 1));
    }

    #[test]
    fn out_of_bounds_access_is_rejected() {
        let mut surface = PixelSurface::new(4, 4);
        assert!(matches!(
            surface.get_pixel(4, 0),
            Err(CanvasError::OutOfBounds { x: 4, y: 0, width: 4, height: 4 })
        ));
        assert!(surface.get_pixel(0, -1).is_err());
        assert!(surface.set_pixel(-1, 2, Rgba([1, 2, 3, 255])).is_err());
        assert!(surface.is_blank());
    }

    #[test]
    fn clear_resets_painted_pixels_and_bumps_revision() {
        let mut surface = PixelSurface::new(3, 3);
        surface.set_pixel(1, 1, Rgba([9, 9, 9, 255])).unwrap();
        let before = surface.revision();
        surface.clear();
        assert!(surface.is_blank());
        assert!(surface.revision() > before);
    }

    #[test]
    fn resized_keeps_overlap_and_drops_the_rest() {
        let mut surface = PixelSurface::new(4, 4);
        let red = Rgba([255, 0, 0, 255]);
        surface.set_pixel(1, 1, red).unwrap();
        surface.set_pixel(3, 3, red).unwrap();

        let smaller = surface.resized(2, 2);
        assert_eq!(smaller.get_pixel(1, 1).unwrap(), red);
        assert_eq!(smaller.dimensions(), (2, 2));

        let larger = surface.resized(6, 5);
        assert_eq!(larger.get_pixel(3, 3).unwrap(), red);
        assert_eq!(larger.get_pixel(5, 4).unwrap(), TRANSPARENT);
    }

    #[test]
    fn extract_region_crops_inclusive_box() {
        let mut surface = PixelSurface::new(10, 10);
        let blue = Rgba([0, 0, 255, 255]);
        surface.set_pixel(2, 3, blue).unwrap();
        surface.set_pixel(4, 6, blue).unwrap();
        let crop = surface.extract_region(&BoundingBox { min_x: 2, min_y: 3, max_x: 4, max_y: 6 });
        assert_eq!(crop.dimensions(), (3, 4));
        assert_eq!(*crop.get_pixel(0, 0), blue);
        assert_eq!(*crop.get_pixel(2, 3), blue);
    }
}
