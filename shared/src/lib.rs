//! Data model and shared utilities for the crawling engine and request queue
//!
//! This crate contains the types that cross the boundary between the
//! `engine` crate (the autoscaled pool and the request lifecycle
//! coordinator) and the `queue` crate (the request queue and request
//! list), plus the small set of utilities both sides need: unique-key
//! canonicalization, deterministic id derivation, and typed errors.

pub mod defaults;
pub mod error;
pub mod ids;
pub mod queue_record;
pub mod request;
pub mod request_source;
pub mod utils;

pub use error::CrawlerError;
pub use queue_record::QueueOperationInfo;
pub use request::Request;
pub use request_source::RequestSource;

/// Result type alias used throughout the shared crate.
pub type Result<T> = std::result::Result<T, CrawlerError>;

#[cfg(test)]
mod tests;
