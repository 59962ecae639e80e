//! Core library for llmeval.
//!
//! Provides the pieces the console is built from:
//! - `api`: REST client and typed resource handles for the evaluation backend
//! - `cache`: read-through `TimedCache` over a pluggable key-value store
//! - `stores`: client-side state shared between views (versions, tags)
//! - `models`: request/response types
//! - `config`: on-disk configuration with environment overrides

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod stores;

pub use api::{ApiClient, ApiError, Envelope};
pub use cache::{FileStore, MemoryStore, TimedCache};
pub use config::Config;
