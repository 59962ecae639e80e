//! Data models for the evaluation backend.
//!
//! - `Version`, `Tag`, `SelectOption`: dataset labels and their picker form
//! - `ListParams`: query parameters for list endpoints
//! - `UploadFile`: multipart payload for the import endpoints

pub mod dataset;
pub mod query;
pub mod upload;

pub use dataset::{SelectOption, Tag, Version, DEFAULT_SOURCE_PLATFORM};
pub use query::ListParams;
pub use upload::UploadFile;
