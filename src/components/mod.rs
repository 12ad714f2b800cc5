pub mod overlays;
pub mod tools;

pub use overlays::*;
pub use tools::*;
