pub mod normalize;
pub mod volume;

pub use normalize::{is_submittable, normalize};
