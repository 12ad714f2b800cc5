//! MathCanvas: a raster drawing surface whose content is sent to an external
//! recognition service, with the solved results overlaid back on the canvas.
//!
//! The engine lives in [`canvas`] and [`ops`]; [`session`] wires pointer
//! input, tools, exports and overlays together.

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod config;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod service;
pub mod session;

pub use canvas::PixelSurface;
pub use error::CanvasError;
pub use session::CanvasSession;
