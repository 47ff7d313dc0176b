mod types;

pub use types::{StorageError, UploadError};
