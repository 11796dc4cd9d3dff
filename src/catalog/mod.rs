//! Versioned policy catalog
//!
//! Stores policy versions, keeps exactly one version per policy flagged as latest, and
//! resolves versions by strategy, one at a time or in batches.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Service   │────▶│   Latest    │────▶│    Store    │
//! │  (facade)   │     │ (on insert) │     │  (SQLite)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │                                       ▲
//!        ▼                                       │
//! ┌─────────────┐     ┌─────────────┐            │
//! │    Bulk     │────▶│  Resolver   │────────────┘
//! │  (batches)  │     │ (strategy)  │
//! └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`service`]: Async facade running store work on the blocking pool
//! - [`latest`]: Transactional latest-version determination with retry
//! - [`resolver`]: Single resolution by strategy
//! - [`bulk`]: Concurrent batch resolution grouped by strategy
//! - [`store`]: Storage traits the engine depends on
//! - [`sqlite`]: SQLite implementation of the storage traits
//! - [`validation`]: Field format checks for incoming versions
//! - [`error`]: Store and engine error types
//! - [`semver`]: Version normalization and comparison
//! - [`types`]: Records, requests and results

pub mod bulk;
pub mod error;
pub mod latest;
pub mod resolver;
pub mod semver;
pub mod service;
pub mod sqlite;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod fixtures;
