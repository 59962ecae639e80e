//! Client-side state shared across screens.

pub mod common;

pub use common::{CommonStore, DatasetSource, LoadingState};
