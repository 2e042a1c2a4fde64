mod detect_head;
mod l2_normalize;
mod merge_detect;
mod prior_box;

pub use detect_head::*;
pub use l2_normalize::*;
pub use merge_detect::*;
pub use prior_box::*;
