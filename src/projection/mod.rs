//! Coordinate reference systems and reprojection.
//!
//! Every position is tagged with its system so that distance and
//! containment tests can refuse to mix degrees with meters.

mod crs;
mod position;
pub mod utm;

pub use crs::{Crs, Hemisphere};
pub use position::Position;
