mod model;
mod module;

pub use model::*;
pub use module::*;
