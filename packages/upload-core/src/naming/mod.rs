pub mod allocate;
pub mod sanitize;

pub use allocate::{Candidates, allocate, candidates};
pub use sanitize::sanitize;
