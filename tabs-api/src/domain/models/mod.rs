mod ids;
mod tab;

pub use ids::*;
pub use tab::*;
