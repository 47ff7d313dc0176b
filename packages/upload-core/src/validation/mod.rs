pub mod key;

pub use key::{validate_key, validate_segment};
