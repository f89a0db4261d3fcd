pub mod base;
pub mod bezier;
mod canvas;
pub mod curve;
pub mod ellipse;
mod linearize;
pub mod path;

pub use self::canvas::*;
pub use self::path::*;
