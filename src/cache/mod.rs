//! Cache Module
//!
//! Provides in-memory cache tables with per-item idle expiration.

mod callbacks;
mod item;
mod stats;
mod table;


// Re-export public types
pub use callbacks::CallbackList;
pub use item::{CacheItem, ExpireCallback};
pub use stats::CacheStats;
pub use table::{CacheTable, DataLoader, ItemCallback};
