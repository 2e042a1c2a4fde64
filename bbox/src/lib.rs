//! Box geometry used to lay out anchor boxes.

mod common;

pub mod cycxhw;
pub mod hw;
pub mod rect;
pub mod tlbr;

pub use cycxhw::*;
pub use hw::*;
pub use rect::*;
pub use tlbr::*;

pub mod prelude {
    pub use crate::rect::Rect;
}
