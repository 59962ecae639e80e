//! REST API client module for the evaluation backend.
//!
//! This module provides the `ApiClient` transport and one typed handle per
//! backend resource (raw questions, standard datasets, evaluation results,
//! statistics, ...).
//!
//! Most endpoints wrap their payload as `{ "success": bool, "data": ... }`;
//! `Envelope` turns that into a success/failure value at the boundary so
//! callers only ever see the payload or an `ApiError::Rejected`.

pub mod client;
pub mod endpoints;
pub mod envelope;
pub mod error;

pub use client::{ApiClient, RawResponse, RequestOptions};
pub use endpoints::{STATISTICS_CACHE_KEY, STATISTICS_CACHE_TTL};
pub use envelope::Envelope;
pub use error::ApiError;
