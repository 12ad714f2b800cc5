//! Paint algorithms that mutate a [`PixelSurface`](crate::canvas::PixelSurface)
//! in place. None of them keeps a reference to the surface between calls.

pub mod bounds;
pub mod fill;
pub mod stroke;
