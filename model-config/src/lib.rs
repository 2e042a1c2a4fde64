//! Anchor and scale configuration of SSD-style detection models.

mod common;
pub mod config;
pub mod error;
pub mod misc;
pub mod scale;
pub mod zoo;

pub use config::*;
pub use error::*;
pub use misc::*;
pub use scale::*;
pub use zoo::*;
