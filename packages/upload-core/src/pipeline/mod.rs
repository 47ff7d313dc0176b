pub mod builder;
pub mod geometry;
pub mod operation;
pub mod presets;

pub use builder::Pipeline;
pub use geometry::Region;
pub use operation::{Operation, ParamValue};
pub use presets::{OutputFormat, ThumbnailOptions};
