//! Anchor generation and multi-scale output assembly of SSD-style detectors.

mod common;
pub mod detection;
pub mod error;
pub mod feature;
pub mod model;
pub mod utils;

pub use detection::*;
pub use error::*;
pub use feature::*;
pub use model::*;
