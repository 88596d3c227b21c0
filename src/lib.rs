//! Cache Table - An in-process key/value cache
//!
//! Stores arbitrary values under arbitrary keys, expires items that stay idle
//! longer than their life span, and exposes add/delete hooks for integration.

pub mod cache;
pub mod config;
pub mod error;
pub mod registry;
mod tasks;

pub use cache::{CacheItem, CacheStats, CacheTable};
pub use config::Config;
pub use error::{CacheError, Result};
pub use registry::CacheRegistry;
